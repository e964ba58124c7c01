//! simbridge - shared memory bridge between an external process and a
//! simulator's named variables
//!
//! The bridge publishes two mailboxes: one region carrying a fixed-size
//! query record plus a manual-reset event for each direction. A listener
//! thread inside the simulator answers reads and applies writes against a
//! [`DataAccess`] implementation; another process talks to it through a
//! [`Client`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use simbridge::{Bridge, BridgeConfig, Client, ClientConfig, LocalBackend, MemoryStore, Value};
//!
//! let backend = LocalBackend::new();
//! let store = Arc::new(MemoryStore::new().with("altitude", Value::Float(1500.0)));
//!
//! let mut bridge = Bridge::new(backend.clone(), store, BridgeConfig::default());
//! bridge.start()?;
//!
//! let mut client = Client::attach(&backend, ClientConfig::default())?;
//! assert_eq!(client.read_float("altitude")?, 1500.0);
//!
//! bridge.stop()?;
//! # Ok::<(), simbridge::Error>(())
//! ```
//!
//! # Features
//!
//! - **Fixed wire layout** - 4736-byte little-endian record, identical on
//!   both sides of the mailbox
//! - **Type dispatch** - scalar, vector and byte buffer access for int,
//!   float and double variables
//! - **OS backends** - POSIX shared memory on Unix, named file mappings and
//!   events on Windows, plus an in-process backend for tests
//! - **Bounded shutdown** - the listener observes stop within one poll
//!   interval

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_code)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bridge;
pub mod channel;
pub mod config;
pub mod engine;
pub mod protocol;

pub use bridge::{Bridge, Client, PLUGIN_INFO, PluginInfo};
pub use channel::{Channel, ChannelNames, LocalBackend, Mailbox, MailboxBackend, WaitOutcome};
#[cfg(any(unix, windows))]
pub use channel::{ShmBackend, ShmMailbox};
pub use config::{BridgeConfig, ClientConfig, ShmConfig};
pub use engine::{DataAccess, MemoryStore, Value};
pub use protocol::{
    DataKind, Error, MAX_BYTE_VALUES, MAX_NAME_LEN, MAX_NUMERIC_VALUES, Operation, QueryRecord,
    RECORD_SIZE, Result, Status,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
