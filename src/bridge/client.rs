//! Requester side of the mailbox protocol.
//!
//! The protocol supports exactly one requester at a time. `Client` methods
//! take `&mut self`, so a client shared between threads has to be wrapped in
//! a lock by the caller.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::channel::{Channel, Mailbox, MailboxBackend, WaitOutcome};
use crate::config::ClientConfig;
use crate::protocol::{DataKind, Error, QueryRecord, Result, Status};

/// Re-check interval while waiting for the listener to consume a write
const SLOT_POLL: Duration = Duration::from_millis(1);

/// Connection to a running bridge.
#[derive(Debug)]
pub struct Client<M> {
    channel: Channel<M>,
    config: ClientConfig,
    pending_write: bool,
    /// Read that timed out; its reply may still arrive
    outstanding: Option<QueryRecord>,
}

impl<M: Mailbox + 'static> Client<M> {
    /// Attach to the mailboxes of a running bridge.
    pub fn attach<B>(backend: &B, config: ClientConfig) -> Result<Self>
    where
        B: MailboxBackend<Mailbox = M>,
    {
        let channel = Channel::attach(backend, &config.names)?;
        Ok(Self {
            channel,
            config,
            pending_write: false,
            outstanding: None,
        })
    }

    /// Send a read request and wait for its reply.
    ///
    /// A reply with a non-`Ok` status becomes [`Error::Rejected`]; no reply
    /// within `reply_timeout` becomes [`Error::ReplyTimeout`]. After a
    /// timeout the request stays outstanding: the next call first waits for
    /// its late reply and discards it, so it is never taken as the answer to
    /// a later request.
    #[instrument(level = "debug", skip_all, fields(name = record.name().unwrap_or("<invalid>")))]
    pub fn request(&mut self, record: &QueryRecord) -> Result<QueryRecord> {
        self.drain_outstanding()?;
        self.await_command_slot()?;
        let reply = self.channel.reply();
        let command = self.channel.command();

        reply.reset_signal()?;
        command.write_record(record)?;
        command.signal()?;

        let Some(response) = self.await_reply(record)? else {
            self.outstanding = Some(*record);
            return Err(Error::ReplyTimeout {
                waited: self.config.reply_timeout,
            });
        };
        self.channel.reply().reset_signal()?;

        match response.status() {
            Some(Status::Ok) => Ok(response),
            Some(status) => Err(Error::Rejected { status }),
            None => Err(Error::Rejected {
                status: Status::InvalidArgument,
            }),
        }
    }

    /// Send a write. Writes are fire-and-forget: no reply is produced, and
    /// errors are only visible in the bridge's log.
    #[instrument(level = "debug", skip_all, fields(name = record.name().unwrap_or("<invalid>")))]
    pub fn send(&mut self, record: &QueryRecord) -> Result<()> {
        self.drain_outstanding()?;
        self.await_command_slot()?;
        let command = self.channel.command();
        command.write_record(record)?;
        command.signal()?;
        self.pending_write = true;
        Ok(())
    }

    /// Read a scalar int.
    pub fn read_int(&mut self, name: &str) -> Result<i32> {
        let reply = self.request(&QueryRecord::read(name, DataKind::Int, 1)?)?;
        Ok(reply.int_values()[0])
    }

    /// Read a scalar float.
    pub fn read_float(&mut self, name: &str) -> Result<f32> {
        let reply = self.request(&QueryRecord::read(name, DataKind::Float, 1)?)?;
        Ok(reply.float_values()[0])
    }

    /// Read a scalar double.
    pub fn read_double(&mut self, name: &str) -> Result<f64> {
        let reply = self.request(&QueryRecord::read(name, DataKind::Double, 1)?)?;
        Ok(reply.double_values()[0])
    }

    /// Read `count` ints from the start of an array variable.
    pub fn read_ints(&mut self, name: &str, count: usize) -> Result<Vec<i32>> {
        let reply = self.request(&QueryRecord::read_array(name, DataKind::Int, count)?)?;
        Ok(reply.int_values()[..count].to_vec())
    }

    /// Read `count` floats from the start of an array variable.
    pub fn read_floats(&mut self, name: &str, count: usize) -> Result<Vec<f32>> {
        let reply = self.request(&QueryRecord::read_array(name, DataKind::Float, count)?)?;
        Ok(reply.float_values()[..count].to_vec())
    }

    /// Read `count` doubles from the start of an array variable.
    pub fn read_doubles(&mut self, name: &str, count: usize) -> Result<Vec<f64>> {
        let reply = self.request(&QueryRecord::read_array(name, DataKind::Double, count)?)?;
        Ok(reply.double_values()[..count].to_vec())
    }

    /// Read `count` bytes from the start of a byte buffer.
    pub fn read_bytes(&mut self, name: &str, count: usize) -> Result<Vec<u8>> {
        let reply = self.request(&QueryRecord::read(name, DataKind::Byte, count)?)?;
        Ok(reply.byte_values()[..count].to_vec())
    }

    /// Write a scalar int.
    pub fn write_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.send(&QueryRecord::write_int(name, value)?)
    }

    /// Write a scalar float.
    pub fn write_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.send(&QueryRecord::write_float(name, value)?)
    }

    /// Write a scalar double.
    pub fn write_double(&mut self, name: &str, value: f64) -> Result<()> {
        self.send(&QueryRecord::write_double(name, value)?)
    }

    /// Write ints to the start of an array variable.
    pub fn write_ints(&mut self, name: &str, values: &[i32]) -> Result<()> {
        self.send(&QueryRecord::write_ints(name, values)?)
    }

    /// Write floats to the start of an array variable.
    pub fn write_floats(&mut self, name: &str, values: &[f32]) -> Result<()> {
        self.send(&QueryRecord::write_floats(name, values)?)
    }

    /// Write doubles to the start of an array variable.
    pub fn write_doubles(&mut self, name: &str, values: &[f64]) -> Result<()> {
        self.send(&QueryRecord::write_doubles(name, values)?)
    }

    /// Write bytes to the start of a byte buffer.
    pub fn write_bytes(&mut self, name: &str, values: &[u8]) -> Result<()> {
        self.send(&QueryRecord::write_bytes(name, values)?)
    }

    /// Wait for the reply to `request`, skipping any record in the reply
    /// region that answers something else.
    ///
    /// The reply signal is not reset while skipping: the listener raises it
    /// again when the real reply lands, and a reset here could swallow that.
    fn await_reply(&self, request: &QueryRecord) -> Result<Option<QueryRecord>> {
        let reply = self.channel.reply();
        let deadline = Instant::now() + self.config.reply_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if reply.wait_signaled(remaining)? == WaitOutcome::TimedOut {
                return Ok(None);
            }
            let response = reply.read_record()?;
            if response.answers(request) {
                return Ok(Some(response));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            debug!("skipping reply to an earlier request");
            thread::sleep(SLOT_POLL);
        }
    }

    /// Consume the late reply of a timed-out request, if one is pending.
    ///
    /// Gives up after `reply_timeout`. If the listener never took the old
    /// command it is simply superseded; otherwise the old request stays
    /// outstanding and the call fails with [`Error::ReplyTimeout`].
    fn drain_outstanding(&mut self) -> Result<()> {
        let Some(stale) = self.outstanding.take() else {
            return Ok(());
        };
        if self.await_reply(&stale)?.is_some() {
            self.channel.reply().reset_signal()?;
            debug!(name = stale.name().unwrap_or("<invalid>"), "discarded late reply");
            return Ok(());
        }
        if self.channel.command().is_signaled()? {
            debug!("previous request never taken; superseding it");
            return Ok(());
        }
        self.outstanding = Some(stale);
        Err(Error::ReplyTimeout {
            waited: self.config.reply_timeout,
        })
    }

    /// Block until the listener has taken the previous write.
    ///
    /// The listener clears the command signal just before it copies the
    /// region out, so after the signal clears we give it `settle` to finish
    /// the copy before the region is overwritten.
    fn await_command_slot(&mut self) -> Result<()> {
        if !self.pending_write {
            return Ok(());
        }
        let command = self.channel.command();
        let deadline = Instant::now() + self.config.reply_timeout;
        while command.is_signaled()? {
            if Instant::now() >= deadline {
                return Err(Error::ReplyTimeout {
                    waited: self.config.reply_timeout,
                });
            }
            thread::sleep(SLOT_POLL);
        }
        thread::sleep(self.config.settle);
        debug!("previous write consumed");
        self.pending_write = false;
        Ok(())
    }
}
