//! Query record protocol
//!
//! This module provides the wire layout, enums and errors shared by both
//! sides of the bridge.

mod error;
mod metrics;
mod record;
mod types;

pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use record::{Query, QueryRecord};
pub use types::{DataKind, Operation, Status};

/// Capacity of the name field, including the NUL terminator
pub const NAME_CAPACITY: usize = 128;

/// Longest usable variable name in bytes
pub const MAX_NAME_LEN: usize = NAME_CAPACITY - 1;

/// Capacity of the byte payload slot
pub const MAX_BYTE_VALUES: usize = 500;

/// Capacity of each numeric payload slot
pub const MAX_NUMERIC_VALUES: usize = 256;

/// Size of one encoded record in bytes
pub const RECORD_SIZE: usize = 4736;
