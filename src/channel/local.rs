//! In-process mailboxes, published by name in a shared table.
//!
//! Mirrors the named-object semantics of the OS backends so a listener and a
//! client in the same process find each other by name: `create` publishes new
//! objects under a name, `attach` only opens what is published. Names stay
//! published after their creator is dropped. Tests and demos use it on every
//! platform.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{Mailbox, MailboxBackend, WaitOutcome};
use crate::protocol::{Error, QueryRecord, RECORD_SIZE, Result};

#[derive(Debug)]
struct Region {
    bytes: Mutex<Box<[u8; RECORD_SIZE]>>,
}

#[derive(Debug, Default)]
struct Event {
    set: Mutex<bool>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct Namespace {
    regions: HashMap<String, Arc<Region>>,
    events: HashMap<String, Arc<Event>>,
    rejected: HashSet<String>,
}

/// Shared table of in-process regions and events.
///
/// Clones share the same namespace.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    namespace: Arc<Mutex<Namespace>>,
}

impl LocalBackend {
    /// Create an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later create/attach of `name` fail, as if the OS refused
    /// to map it.
    pub fn reject(&self, name: &str) {
        self.namespace.lock().rejected.insert(name.to_owned());
    }

    /// Publish fresh objects under both names, replacing any earlier ones.
    ///
    /// Holders of the replaced objects keep them, detached from the names.
    fn create_pair(&self, region: &str, event: &str) -> Result<LocalMailbox> {
        let mut namespace = self.namespace.lock();
        namespace.check(region, event)?;

        let region_slot = Arc::new(Region {
            bytes: Mutex::new(Box::new([0; RECORD_SIZE])),
        });
        let event_slot = Arc::new(Event::default());
        namespace
            .regions
            .insert(region.to_owned(), Arc::clone(&region_slot));
        namespace
            .events
            .insert(event.to_owned(), Arc::clone(&event_slot));

        Ok(LocalMailbox {
            name: region.to_owned(),
            region: region_slot,
            event: event_slot,
        })
    }

    /// Open the objects currently published under both names.
    fn attach_pair(&self, region: &str, event: &str) -> Result<LocalMailbox> {
        let namespace = self.namespace.lock();
        namespace.check(region, event)?;

        let region_slot = namespace
            .regions
            .get(region)
            .cloned()
            .ok_or_else(|| not_found(region))?;
        let event_slot = namespace
            .events
            .get(event)
            .cloned()
            .ok_or_else(|| not_found(event))?;

        Ok(LocalMailbox {
            name: region.to_owned(),
            region: region_slot,
            event: event_slot,
        })
    }
}

impl Namespace {
    fn check(&self, region: &str, event: &str) -> Result<()> {
        for name in [region, event] {
            if self.rejected.contains(name) {
                return Err(Error::unavailable(
                    name,
                    io::Error::new(io::ErrorKind::PermissionDenied, "name rejected"),
                ));
            }
        }
        Ok(())
    }
}

fn not_found(name: &str) -> Error {
    Error::unavailable(
        name,
        io::Error::new(io::ErrorKind::NotFound, "no such mailbox"),
    )
}

impl MailboxBackend for LocalBackend {
    type Mailbox = LocalMailbox;

    fn create(&self, region: &str, event: &str) -> Result<LocalMailbox> {
        self.create_pair(region, event)
    }

    fn attach(&self, region: &str, event: &str) -> Result<LocalMailbox> {
        self.attach_pair(region, event)
    }
}

/// Mailbox living in the current process.
#[derive(Debug, Clone)]
pub struct LocalMailbox {
    name: String,
    region: Arc<Region>,
    event: Arc<Event>,
}

impl Mailbox for LocalMailbox {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_record(&self, record: &QueryRecord) -> Result<()> {
        **self.region.bytes.lock() = record.to_bytes();
        Ok(())
    }

    fn read_record(&self) -> Result<QueryRecord> {
        let snapshot = **self.region.bytes.lock();
        QueryRecord::from_bytes(&snapshot)
    }

    fn signal(&self) -> Result<()> {
        *self.event.set.lock() = true;
        self.event.cond.notify_all();
        Ok(())
    }

    fn wait_signaled(&self, timeout: Duration) -> Result<WaitOutcome> {
        let deadline = Instant::now() + timeout;
        let mut set = self.event.set.lock();
        while !*set {
            if self.event.cond.wait_until(&mut set, deadline).timed_out() {
                break;
            }
        }
        Ok(if *set {
            WaitOutcome::Signaled
        } else {
            WaitOutcome::TimedOut
        })
    }

    fn reset_signal(&self) -> Result<()> {
        *self.event.set.lock() = false;
        Ok(())
    }
}
