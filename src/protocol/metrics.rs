use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{Operation, Status};

/// Per-bridge request counters.
///
/// Owned by the bridge context and shared with the listener thread; no
/// process-wide statics.
#[derive(Debug, Default)]
pub struct Metrics {
    reads: AtomicU64,
    writes: AtomicU64,
    ignored: AtomicU64,
    replies: AtomicU64,
    not_found: AtomicU64,
    invalid: AtomicU64,
    unknown_operation: AtomicU64,
    dispatch_total_ns: AtomicU64,
    dispatch_max_ns: AtomicU64,
}

impl Metrics {
    #[inline]
    pub(crate) fn record_request(&self, operation: Operation) {
        let counter = match operation {
            Operation::Read => &self.reads,
            Operation::Write => &self.writes,
            Operation::Response => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reply(&self) {
        self.replies.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_failure(&self, status: Status) {
        let counter = match status {
            Status::Ok => return,
            Status::VariableNotFound => &self.not_found,
            Status::InvalidArgument => &self.invalid,
            Status::UnknownOperation => &self.unknown_operation,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dispatch_time(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.dispatch_total_ns.fetch_add(nanos, Ordering::Relaxed);
        update_max(&self.dispatch_max_ns, nanos);
    }

    /// Copy the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            unknown_operation: self.unknown_operation.load(Ordering::Relaxed),
            dispatch_total_ns: self.dispatch_total_ns.load(Ordering::Relaxed),
            dispatch_max_ns: self.dispatch_max_ns.load(Ordering::Relaxed),
        }
    }
}

fn update_max(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while candidate > current {
        match target.compare_exchange_weak(
            current,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(old) => current = old,
        }
    }
}

/// Point-in-time copy of the bridge counters.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Read requests received
    pub reads: u64,
    /// Write requests received
    pub writes: u64,
    /// Inbound `Response` records, which are ignored
    pub ignored: u64,
    /// Replies published on the reply mailbox
    pub replies: u64,
    /// Requests naming an unknown variable
    pub not_found: u64,
    /// Requests failing validation
    pub invalid: u64,
    /// Requests with an unrecognized operation byte
    pub unknown_operation: u64,
    /// Total time spent dispatching, in nanoseconds
    pub dispatch_total_ns: u64,
    /// Slowest single dispatch, in nanoseconds
    pub dispatch_max_ns: u64,
}

impl MetricsSnapshot {
    /// Requests that were decoded into a known operation.
    #[must_use]
    pub const fn handled(&self) -> u64 {
        self.reads + self.writes + self.ignored
    }

    /// Requests that failed for any reason.
    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.not_found + self.invalid + self.unknown_operation
    }
}
