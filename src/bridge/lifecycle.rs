//! Bridge lifecycle: create the mailboxes, run the listener, tear it all down.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::{debug, info, instrument, warn};

use super::listener::{BridgeContext, Listener};
use super::worker::Worker;
use crate::channel::{Channel, MailboxBackend};
use crate::config::BridgeConfig;
use crate::engine::DataAccess;
use crate::protocol::{Metrics, MetricsSnapshot, Result};

/// Identification reported to the host simulator when the bridge loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginInfo {
    /// Human readable name
    pub name: &'static str,
    /// Unique reverse-DNS signature
    pub signature: &'static str,
    /// One-line description
    pub description: &'static str,
}

/// Identification of this bridge.
pub const PLUGIN_INFO: PluginInfo = PluginInfo {
    name: "RESTful API Interface",
    signature: "oneios.client.rest",
    description: "Plugin exposes API onto shared memory for use via REST service.",
};

const LISTENER_THREAD: &str = "simbridge-listener";

struct Running<M> {
    context: BridgeContext<M>,
    worker: Worker,
}

/// Owner of the mailboxes and the listener thread.
///
/// Dropping a started bridge stops it.
pub struct Bridge<B, D>
where
    B: MailboxBackend,
    D: DataAccess + 'static,
{
    backend: B,
    engine: Arc<D>,
    config: BridgeConfig,
    metrics: Arc<Metrics>,
    running: Option<Running<B::Mailbox>>,
}

impl<B, D> Bridge<B, D>
where
    B: MailboxBackend,
    D: DataAccess + 'static,
{
    /// Create a stopped bridge.
    pub fn new(backend: B, engine: Arc<D>, config: BridgeConfig) -> Self {
        Self {
            backend,
            engine,
            config,
            metrics: Arc::new(Metrics::default()),
            running: None,
        }
    }

    /// Create both mailboxes and start the listener.
    ///
    /// Fails with [`Error::ChannelUnavailable`](crate::Error::ChannelUnavailable)
    /// if either mailbox cannot be created, in which case nothing stays
    /// allocated and no thread is started. Starting a running bridge is a no-op.
    #[instrument(level = "info", skip(self), fields(command = %self.config.names.command_region))]
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            debug!("bridge already running");
            return Ok(());
        }

        let channel = Channel::create(&self.backend, &self.config.names)?;
        let context = BridgeContext {
            channel: Arc::new(channel),
            shutdown: Arc::new(AtomicBool::new(false)),
            metrics: Arc::clone(&self.metrics),
        };

        let listener = Listener::new(
            context.clone(),
            Arc::clone(&self.engine),
            self.config.poll_interval,
        );
        let worker = Worker::spawn(LISTENER_THREAD, Arc::clone(&context.shutdown), move || {
            listener.run();
        })?;

        info!(plugin = PLUGIN_INFO.signature, "bridge started");
        self.running = Some(Running { context, worker });
        Ok(())
    }

    /// Signal the listener, wait for it and release the mailboxes.
    ///
    /// Safe to call repeatedly and without a prior `start`. The wait is
    /// bounded by one poll interval plus `join_grace`; past that the listener
    /// is detached and an error is logged.
    #[instrument(level = "info", skip(self))]
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };

        let timeout = self.config.poll_interval + self.config.join_grace;
        let joined = running.worker.stop(timeout)?;
        if !joined {
            warn!(?timeout, "listener still running after stop; mailboxes released when it exits");
        }
        drop(running.context);
        info!(metrics = ?self.metrics.snapshot(), "bridge stopped");
        Ok(())
    }

    /// Whether the listener thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.worker.is_finished())
    }

    /// Counters accumulated since the bridge was created.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Variable store served by this bridge.
    #[must_use]
    pub const fn engine(&self) -> &Arc<D> {
        &self.engine
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl<B, D> Drop for Bridge<B, D>
where
    B: MailboxBackend,
    D: DataAccess + 'static,
{
    fn drop(&mut self) {
        if let Some(mut running) = self.running.take() {
            let timeout = self.config.poll_interval + self.config.join_grace;
            if let Err(err) = running.worker.stop(timeout) {
                warn!(error = %err, "listener failed during drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelNames, LocalBackend};
    use crate::engine::MemoryStore;
    use crate::protocol::Error;
    use std::time::Duration;

    fn config() -> BridgeConfig {
        BridgeConfig {
            names: ChannelNames::default(),
            poll_interval: Duration::from_millis(20),
            join_grace: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_stop_without_start() {
        let mut bridge = Bridge::new(LocalBackend::new(), Arc::new(MemoryStore::new()), config());
        bridge.stop().unwrap();
        bridge.stop().unwrap();
        assert!(!bridge.is_running());
    }

    #[test]
    fn test_start_stop_start() {
        let mut bridge = Bridge::new(LocalBackend::new(), Arc::new(MemoryStore::new()), config());
        bridge.start().unwrap();
        bridge.start().unwrap();
        assert!(bridge.is_running());

        bridge.stop().unwrap();
        assert!(!bridge.is_running());

        bridge.start().unwrap();
        assert!(bridge.is_running());
    }

    #[test]
    fn test_start_fails_when_reply_mailbox_unavailable() {
        let backend = LocalBackend::new();
        backend.reject("SHAREDMEM_RESPONSE");
        let mut bridge = Bridge::new(backend, Arc::new(MemoryStore::new()), config());

        let err = bridge.start().unwrap_err();
        assert!(matches!(err, Error::ChannelUnavailable { .. }));
        assert!(!bridge.is_running());
        bridge.stop().unwrap();
    }

    #[test]
    fn test_plugin_info() {
        assert_eq!(PLUGIN_INFO.signature, "oneios.client.rest");
        assert!(!PLUGIN_INFO.description.is_empty());
    }
}
