//! Mailbox channel: named shared regions paired with manual-reset signals
//!
//! A [`Mailbox`] is one region holding one [`QueryRecord`] plus one binary
//! event. The protocol code only sees the traits in this module; the OS
//! primitives live in the platform backends.

mod local;
#[cfg(unix)]
mod shm_unix;
#[cfg(windows)]
mod shm_windows;

use std::time::Duration;

use tracing::{debug, instrument};

use crate::protocol::{QueryRecord, Result};

pub use local::{LocalBackend, LocalMailbox};
#[cfg(unix)]
pub use shm_unix::{ShmBackend, ShmMailbox};
#[cfg(windows)]
pub use shm_windows::{ShmBackend, ShmMailbox};

/// Well-known name of the command region
pub const COMMAND_REGION: &str = "SHAREDMEM_COMMAND";
/// Well-known name of the reply region
pub const REPLY_REGION: &str = "SHAREDMEM_RESPONSE";
/// Well-known name of the command event
pub const COMMAND_EVENT: &str = "SHAREDMEM_COMMAND_EVENT";
/// Well-known name of the reply event
pub const REPLY_EVENT: &str = "SHAREDMEM_RESPONSE_EVENT";

/// Result of a bounded wait on a mailbox signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The signal was set before the timeout
    Signaled,
    /// The timeout elapsed with the signal clear
    TimedOut,
}

/// One direction of the bridge: a record slot plus its signal.
///
/// Nothing here locks the slot. A writer must finish
/// [`Mailbox::write_record`] before calling [`Mailbox::signal`], and a
/// reader must observe the signal before calling [`Mailbox::read_record`].
pub trait Mailbox: Send + Sync {
    /// Region name this mailbox was opened under.
    fn name(&self) -> &str;

    /// Copy a record into the region.
    fn write_record(&self, record: &QueryRecord) -> Result<()>;

    /// Copy the region out by value.
    fn read_record(&self) -> Result<QueryRecord>;

    /// Set the event.
    fn signal(&self) -> Result<()>;

    /// Wait until the event is set or `timeout` elapses.
    fn wait_signaled(&self, timeout: Duration) -> Result<WaitOutcome>;

    /// Clear the event.
    fn reset_signal(&self) -> Result<()>;

    /// Check the event without blocking.
    fn is_signaled(&self) -> Result<bool> {
        Ok(self.wait_signaled(Duration::ZERO)? == WaitOutcome::Signaled)
    }
}

/// Factory for mailboxes of one platform flavor.
pub trait MailboxBackend {
    /// Mailbox type produced by this backend
    type Mailbox: Mailbox + 'static;

    /// Create (or take over) a mailbox, zeroing its region and clearing its
    /// event. Used by the listener side.
    fn create(&self, region: &str, event: &str) -> Result<Self::Mailbox>;

    /// Open a mailbox without touching its content. Used by the client side.
    fn attach(&self, region: &str, event: &str) -> Result<Self::Mailbox>;
}

/// Names under which the two mailboxes are published.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelNames {
    /// Command region name
    pub command_region: String,
    /// Command event name
    pub command_event: String,
    /// Reply region name
    pub reply_region: String,
    /// Reply event name
    pub reply_event: String,
}

impl ChannelNames {
    /// Well-known names with a suffix appended, for running several bridges
    /// (or tests) side by side.
    #[must_use]
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            command_region: format!("{COMMAND_REGION}{suffix}"),
            command_event: format!("{COMMAND_EVENT}{suffix}"),
            reply_region: format!("{REPLY_REGION}{suffix}"),
            reply_event: format!("{REPLY_EVENT}{suffix}"),
        }
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self::with_suffix("")
    }
}

/// The command/reply mailbox pair.
#[derive(Debug)]
pub struct Channel<M> {
    command: M,
    reply: M,
}

impl<M: Mailbox + 'static> Channel<M> {
    /// Create both mailboxes for the listener side.
    ///
    /// All or nothing: if the reply mailbox fails, the command mailbox is
    /// released before the error is returned.
    #[instrument(level = "info", skip(backend))]
    pub fn create<B>(backend: &B, names: &ChannelNames) -> Result<Self>
    where
        B: MailboxBackend<Mailbox = M>,
    {
        let command = backend.create(&names.command_region, &names.command_event)?;
        let reply = backend.create(&names.reply_region, &names.reply_event)?;
        debug!("mailboxes created");
        Ok(Self { command, reply })
    }

    /// Attach to both mailboxes for the client side.
    #[instrument(level = "info", skip(backend))]
    pub fn attach<B>(backend: &B, names: &ChannelNames) -> Result<Self>
    where
        B: MailboxBackend<Mailbox = M>,
    {
        let command = backend.attach(&names.command_region, &names.command_event)?;
        let reply = backend.attach(&names.reply_region, &names.reply_event)?;
        debug!("mailboxes attached");
        Ok(Self { command, reply })
    }

    /// Mailbox carrying requests to the listener.
    #[must_use]
    pub const fn command(&self) -> &M {
        &self.command
    }

    /// Mailbox carrying replies from the listener.
    #[must_use]
    pub const fn reply(&self) -> &M {
        &self.reply
    }
}
