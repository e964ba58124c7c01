//! Command listener: waits on the command mailbox and answers requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use super::dispatch;
use crate::channel::{Channel, Mailbox, WaitOutcome};
use crate::engine::DataAccess;
use crate::protocol::{Error, Metrics, Operation, Query, QueryRecord, Result, Status};

/// State shared between the lifecycle manager and its listener thread.
#[derive(Debug)]
pub struct BridgeContext<M> {
    /// Command/reply mailbox pair
    pub channel: Arc<Channel<M>>,
    /// Set to ask the listener to exit after its current wait cycle
    pub shutdown: Arc<AtomicBool>,
    /// Request counters
    pub metrics: Arc<Metrics>,
}

impl<M> Clone for BridgeContext<M> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            shutdown: Arc::clone(&self.shutdown),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Owner of the command mailbox's wait/reset/consume cycle and sole writer of
/// the reply mailbox.
#[derive(Debug)]
pub struct Listener<M, D> {
    context: BridgeContext<M>,
    engine: Arc<D>,
    poll_interval: Duration,
}

impl<M, D> Listener<M, D>
where
    M: Mailbox + 'static,
    D: DataAccess,
{
    /// Create a listener over `context`.
    pub const fn new(context: BridgeContext<M>, engine: Arc<D>, poll_interval: Duration) -> Self {
        Self {
            context,
            engine,
            poll_interval,
        }
    }

    /// Loop until the shutdown flag is observed.
    ///
    /// The flag is checked once per wait cycle, so exit happens at most one
    /// poll interval after it is set. Per-request and mailbox errors are
    /// logged and never end the loop.
    pub fn run(&self) {
        info!(
            command = self.context.channel.command().name(),
            "listener started"
        );
        while !self.context.shutdown.load(Ordering::Acquire) {
            if let Err(err) = self.poll_once() {
                warn!(error = %err, "listener cycle failed");
                thread::sleep(self.poll_interval);
            }
        }
        info!("listener stopped");
    }

    /// One wait cycle. Returns whether a command was consumed.
    pub fn poll_once(&self) -> Result<bool> {
        let command = self.context.channel.command();
        if command.wait_signaled(self.poll_interval)? == WaitOutcome::TimedOut {
            return Ok(false);
        }

        // Reset before the snapshot so the writer may signal the next
        // command; the writer must not touch the region until we have copied it.
        command.reset_signal()?;
        let record = command.read_record()?;

        if let Some(reply) = self.handle(&record) {
            let mailbox = self.context.channel.reply();
            mailbox.write_record(&reply)?;
            mailbox.signal()?;
            self.context.metrics.record_reply();
        }
        Ok(true)
    }

    /// Decode and dispatch one record, returning the reply to publish, if any.
    #[instrument(level = "debug", skip_all, fields(op = record.operation_byte()))]
    pub fn handle(&self, record: &QueryRecord) -> Option<QueryRecord> {
        let started = Instant::now();
        let reply = match record.query() {
            Ok(query) => self.dispatch(&query, record),
            Err(err) => self.reject(&err, record),
        };
        self.context.metrics.record_dispatch_time(started.elapsed());
        reply
    }

    fn dispatch(&self, query: &Query<'_>, record: &QueryRecord) -> Option<QueryRecord> {
        let metrics = &self.context.metrics;
        metrics.record_request(query.operation);

        match query.operation {
            Operation::Read => {
                let Some(handle) = self.engine.find(query.name) else {
                    debug!(name = query.name, "read of unknown variable");
                    metrics.record_failure(Status::VariableNotFound);
                    return Some(record.to_response(Status::VariableNotFound));
                };
                let mut response = record.to_response(Status::Ok);
                dispatch::read(self.engine.as_ref(), handle, query, &mut response);
                Some(response)
            }
            Operation::Write => {
                if let Some(handle) = self.engine.find(query.name) {
                    dispatch::write(self.engine.as_ref(), handle, query, record);
                } else {
                    // Writes have no reply; raising the reply signal here
                    // would be taken as the answer to the next read
                    warn!(name = query.name, "write to unknown variable dropped");
                    metrics.record_failure(Status::VariableNotFound);
                }
                None
            }
            Operation::Response => {
                debug!(name = query.name, "ignoring inbound response record");
                None
            }
        }
    }

    fn reject(&self, err: &Error, record: &QueryRecord) -> Option<QueryRecord> {
        let status = err.status();
        self.context.metrics.record_failure(status);
        match record.operation() {
            Some(Operation::Write) => {
                warn!(error = %err, "invalid write dropped");
                None
            }
            Some(Operation::Response) => {
                debug!(error = %err, "ignoring invalid inbound response record");
                None
            }
            Some(Operation::Read) | None => {
                debug!(error = %err, %status, "rejecting request");
                Some(record.to_response(status))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelNames, LocalBackend};
    use crate::engine::{MemoryStore, Value};
    use crate::protocol::DataKind;

    fn listener(store: MemoryStore) -> (Listener<crate::channel::LocalMailbox, MemoryStore>, Arc<MemoryStore>) {
        let backend = LocalBackend::new();
        let channel = Channel::create(&backend, &ChannelNames::default()).unwrap();
        let context = BridgeContext {
            channel: Arc::new(channel),
            shutdown: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(Metrics::default()),
        };
        let engine = Arc::new(store);
        (
            Listener::new(context, Arc::clone(&engine), Duration::from_millis(10)),
            engine,
        )
    }

    #[test]
    fn test_altitude_read() {
        let (listener, _) = listener(MemoryStore::new().with("altitude", Value::Float(1500.0)));
        let request = QueryRecord::read("altitude", DataKind::Float, 1).unwrap();

        let reply = listener.handle(&request).unwrap();
        assert_eq!(reply.status(), Some(Status::Ok));
        assert_eq!(reply.operation(), Some(Operation::Response));
        assert_eq!(reply.float_values()[0], 1500.0);
    }

    #[test]
    fn test_unknown_variable_never_reaches_accessors() {
        let (listener, engine) = listener(MemoryStore::new().with("sim/a", Value::Int(1)));

        let request = QueryRecord::read("sim/missing", DataKind::Int, 1).unwrap();
        let reply = listener.handle(&request).unwrap();
        assert_eq!(reply.status(), Some(Status::VariableNotFound));

        let write = QueryRecord::write_int("sim/missing", 3).unwrap();
        assert!(listener.handle(&write).is_none());
        assert_eq!(engine.accessor_calls(), 0);

        let snapshot = listener.context.metrics.snapshot();
        assert_eq!(snapshot.not_found, 2);
    }

    #[test]
    fn test_oversized_count_rejected_without_copy() {
        let (listener, engine) =
            listener(MemoryStore::new().with("sim/arr", Value::IntArray(vec![5; 300])));
        let mut request = QueryRecord::read("sim/arr", DataKind::Int, 1).unwrap();
        request.set_raw_value_count(300);

        let reply = listener.handle(&request).unwrap();
        assert_eq!(reply.status(), Some(Status::InvalidArgument));
        assert_eq!(reply.int_values()[0], 0);
        assert_eq!(engine.accessor_calls(), 0);
    }

    #[test]
    fn test_unknown_operation_is_answered() {
        let (listener, _) = listener(MemoryStore::new());
        let mut bytes = QueryRecord::read("sim/a", DataKind::Int, 1)
            .unwrap()
            .to_bytes();
        bytes[129] = 0x40;
        let request = QueryRecord::from_bytes(&bytes).unwrap();

        let reply = listener.handle(&request).unwrap();
        assert_eq!(reply.status(), Some(Status::UnknownOperation));
    }

    #[test]
    fn test_unknown_kind_is_invalid_argument() {
        let (listener, _) = listener(MemoryStore::new().with("sim/a", Value::Int(1)));
        let mut bytes = QueryRecord::read("sim/a", DataKind::Int, 1)
            .unwrap()
            .to_bytes();
        bytes[128] = 0x20;
        let request = QueryRecord::from_bytes(&bytes).unwrap();

        let reply = listener.handle(&request).unwrap();
        assert_eq!(reply.status(), Some(Status::InvalidArgument));
    }

    #[test]
    fn test_inbound_response_ignored() {
        let (listener, engine) = listener(MemoryStore::new().with("sim/a", Value::Int(1)));
        let response = QueryRecord::read("sim/a", DataKind::Int, 1)
            .unwrap()
            .to_response(Status::Ok);

        assert!(listener.handle(&response).is_none());
        assert_eq!(engine.accessor_calls(), 0);
        assert_eq!(listener.context.metrics.snapshot().ignored, 1);
    }

    #[test]
    fn test_poll_once_publishes_reply() {
        let (listener, _) = listener(MemoryStore::new().with("altitude", Value::Float(1500.0)));
        let channel = Arc::clone(&listener.context.channel);

        assert!(!listener.poll_once().unwrap());

        let request = QueryRecord::read("altitude", DataKind::Float, 1).unwrap();
        channel.command().write_record(&request).unwrap();
        channel.command().signal().unwrap();

        assert!(listener.poll_once().unwrap());
        assert!(!channel.command().is_signaled().unwrap());
        assert!(channel.reply().is_signaled().unwrap());
        assert_eq!(channel.reply().read_record().unwrap().float_values()[0], 1500.0);
    }

    #[test]
    fn test_write_produces_no_reply_signal() {
        let (listener, engine) = listener(MemoryStore::new().with("sim/speed", Value::Int(1)));
        let channel = Arc::clone(&listener.context.channel);

        let write = QueryRecord::write_int("sim/speed", 4).unwrap();
        channel.command().write_record(&write).unwrap();
        channel.command().signal().unwrap();

        assert!(listener.poll_once().unwrap());
        assert!(!channel.reply().is_signaled().unwrap());
        assert_eq!(engine.value("sim/speed"), Some(Value::Int(4)));
    }
}
