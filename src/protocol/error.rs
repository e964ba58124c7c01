//! Bridge error types

use std::time::Duration;

use thiserror::Error;

use super::{DataKind, Status};

/// Errors raised by the record codec, the mailboxes and the bridge
#[derive(Error, Debug)]
pub enum Error {
    /// A mailbox region or event could not be created or mapped
    #[error("channel unavailable: {name}: {source}")]
    ChannelUnavailable {
        /// Name of the region or event that failed
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The requested variable does not exist in the engine
    #[error("variable not found: {name:?}")]
    VariableNotFound {
        /// Requested variable name
        name: String,
    },

    /// Element count exceeds the payload slot selected by the data kind
    #[error("value count {count} exceeds {kind} capacity of {capacity}")]
    CountExceedsCapacity {
        /// Data kind of the request
        kind: DataKind,
        /// Requested count
        count: usize,
        /// Slot capacity
        capacity: usize,
    },

    /// Unknown data kind byte
    #[error("invalid data kind: {kind_byte:#x}")]
    InvalidDataKind {
        /// Invalid kind byte
        kind_byte: u8,
    },

    /// Unknown operation byte
    #[error("unknown operation: {op_byte:#x}")]
    UnknownOperation {
        /// Invalid operation byte
        op_byte: u8,
    },

    /// Variable name is empty, unterminated, too long or not UTF-8
    #[error("invalid variable name: {reason}")]
    InvalidName {
        /// What was wrong with the name
        reason: &'static str,
    },

    /// Buffer too small
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// No reply arrived on the reply mailbox in time
    #[error("no reply within {waited:?}")]
    ReplyTimeout {
        /// How long the client waited
        waited: Duration,
    },

    /// The listener answered with a non-Ok status
    #[error("request rejected with status {status}")]
    Rejected {
        /// Status carried by the reply
        status: Status,
    },

    /// The listener thread panicked or could not be joined
    #[error("listener worker failed: {0}")]
    Worker(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wire status reported back to the requester for this error
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::VariableNotFound { .. } => Status::VariableNotFound,
            Self::UnknownOperation { .. } => Status::UnknownOperation,
            Self::Rejected { status } => *status,
            Self::CountExceedsCapacity { .. }
            | Self::InvalidDataKind { .. }
            | Self::InvalidName { .. }
            | Self::BufferTooSmall { .. }
            | Self::ChannelUnavailable { .. }
            | Self::ReplyTimeout { .. }
            | Self::Worker(_)
            | Self::Io(_) => Status::InvalidArgument,
        }
    }

    pub(crate) fn unavailable(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::ChannelUnavailable {
            name: name.into(),
            source,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = Error::VariableNotFound {
            name: "sim/none".into(),
        };
        assert_eq!(err.status(), Status::VariableNotFound);

        let err = Error::CountExceedsCapacity {
            kind: DataKind::Int,
            count: 300,
            capacity: 256,
        };
        assert_eq!(err.status(), Status::InvalidArgument);
        assert_eq!(err.to_string(), "value count 300 exceeds Int capacity of 256");

        let err = Error::UnknownOperation { op_byte: 9 };
        assert_eq!(err.status(), Status::UnknownOperation);
    }
}
