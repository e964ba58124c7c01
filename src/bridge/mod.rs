//! Listener, client and lifecycle built on top of the mailbox channel
//!
//! [`Bridge`] owns the listener thread that serves requests against a
//! [`DataAccess`](crate::engine::DataAccess) implementation; [`Client`] is
//! the requester side used by the other process.

mod client;
pub mod dispatch;
mod lifecycle;
mod listener;
mod worker;

pub use client::Client;
pub use lifecycle::{Bridge, PLUGIN_INFO, PluginInfo};
pub use listener::{BridgeContext, Listener};
pub use worker::Worker;
