//! Configuration for the listener, the client and the shared memory backend.

use std::time::Duration;

use crate::channel::ChannelNames;

/// Listener-side options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BridgeConfig {
    /// Names the mailboxes are created under.
    pub names: ChannelNames,
    /// Bounded wait on the command signal; also the shutdown latency bound.
    pub poll_interval: Duration,
    /// Extra time `stop` allows beyond one poll interval before giving up on
    /// joining the listener.
    pub join_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            names: ChannelNames::default(),
            poll_interval: Duration::from_secs(1),
            join_grace: Duration::from_millis(500),
        }
    }
}

/// Requester-side options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    /// Names the mailboxes are attached under.
    pub names: ChannelNames,
    /// How long a read waits for the reply signal, and how long any request
    /// waits for the listener to take a previous write.
    pub reply_timeout: Duration,
    /// Pause after a previous write's signal clears, so the listener can
    /// finish copying the record before it is overwritten.
    ///
    /// This is a timing allowance, not a handshake: the listener resets the
    /// signal before it snapshots the record, so a listener descheduled for
    /// longer than `settle` can see the next request instead and the earlier
    /// write is lost. Raise it on heavily loaded hosts.
    pub settle: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            names: ChannelNames::default(),
            reply_timeout: Duration::from_secs(2),
            settle: Duration::from_millis(2),
        }
    }
}

/// Options for the OS shared memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ShmConfig {
    /// Re-check interval for event waits on platforms without a blocking
    /// process-shared wait primitive.
    pub poll_interval: Duration,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let bridge = BridgeConfig::default();
        assert_eq!(bridge.poll_interval, Duration::from_secs(1));
        assert_eq!(bridge.names, ChannelNames::default());

        let client = ClientConfig::default();
        assert_eq!(client.reply_timeout, Duration::from_secs(2));
        assert!(client.settle < client.reply_timeout);
    }
}
