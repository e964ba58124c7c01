//! Background thread with a cancel flag and a bounded join.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::protocol::{Error, Result};

#[derive(Debug, Default)]
struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

/// Marks the worker finished when dropped, including on unwind.
struct DoneGuard(Arc<Completion>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        *self.0.done.lock() = true;
        self.0.cond.notify_all();
    }
}

/// A named thread that runs until its cancel flag is set.
#[derive(Debug)]
pub struct Worker {
    name: String,
    cancel: Arc<AtomicBool>,
    completion: Arc<Completion>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn `body` on a new thread named `name`.
    ///
    /// `body` is expected to observe `cancel` and return soon after it is set.
    pub fn spawn<F>(name: &str, cancel: Arc<AtomicBool>, body: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let completion = Arc::new(Completion::default());
        let guard = DoneGuard(Arc::clone(&completion));
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let _guard = guard;
                body();
            })?;

        Ok(Self {
            name: name.to_owned(),
            cancel,
            completion,
            handle: Some(handle),
        })
    }

    /// Whether the thread body has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        *self.completion.done.lock()
    }

    /// Set the cancel flag and wait up to `timeout` for the thread to finish.
    ///
    /// Returns `Ok(false)` if the thread is still running at the deadline; it
    /// is then detached and keeps its resources until it exits on its own.
    pub fn stop(&mut self, timeout: Duration) -> Result<bool> {
        self.cancel.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return Ok(true);
        };

        let deadline = Instant::now() + timeout;
        let mut done = self.completion.done.lock();
        while !*done {
            if self.completion.cond.wait_until(&mut done, deadline).timed_out() {
                break;
            }
        }
        let finished = *done;
        drop(done);

        if !finished {
            warn!(worker = %self.name, ?timeout, "worker did not stop in time; detaching");
            return Ok(false);
        }
        handle
            .join()
            .map_err(|_| Error::Worker(format!("{} panicked", self.name)))?;
        Ok(true)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancellable(cancel: &Arc<AtomicBool>) -> impl FnOnce() + Send + 'static {
        let cancel = Arc::clone(cancel);
        move || {
            while !cancel.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    #[test]
    fn test_stop_joins_cooperative_worker() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut worker = Worker::spawn("test-worker", Arc::clone(&cancel), cancellable(&cancel)).unwrap();
        assert!(!worker.is_finished());

        assert!(worker.stop(Duration::from_secs(5)).unwrap());
        assert!(worker.is_finished());
        // Second stop is a no-op
        assert!(worker.stop(Duration::ZERO).unwrap());
    }

    #[test]
    fn test_stop_times_out_on_stuck_worker() {
        let cancel = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));
        let body_release = Arc::clone(&release);
        let mut worker = Worker::spawn("stuck-worker", cancel, move || {
            while !body_release.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        let start = Instant::now();
        assert!(!worker.stop(Duration::from_millis(20)).unwrap());
        assert!(start.elapsed() < Duration::from_secs(2));
        release.store(true, Ordering::Release);
    }

    #[test]
    fn test_panic_reported_as_worker_error() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut worker = Worker::spawn("panicking-worker", cancel, || panic!("boom")).unwrap();
        let err = worker.stop(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, Error::Worker(_)));
    }
}
