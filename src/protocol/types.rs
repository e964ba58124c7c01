//! Query record enums: data kinds, operations and reply status codes

use std::fmt;

use super::{MAX_BYTE_VALUES, MAX_NUMERIC_VALUES};

/// Type of the value carried by a query record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DataKind {
    /// 32-bit signed integer
    Int = 0x00,
    /// 32-bit float
    Float = 0x01,
    /// 64-bit float
    Double = 0x02,
    /// Raw bytes
    Byte = 0x03,
}

impl DataKind {
    /// Convert from byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Int),
            0x01 => Some(Self::Float),
            0x02 => Some(Self::Double),
            0x03 => Some(Self::Byte),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Number of elements the payload slot for this kind can hold
    #[must_use]
    pub const fn capacity(self) -> usize {
        match self {
            Self::Byte => MAX_BYTE_VALUES,
            Self::Int | Self::Float | Self::Double => MAX_NUMERIC_VALUES,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Byte => "Byte",
        };
        write!(f, "{name}")
    }
}

/// What the sender wants done with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Operation {
    /// Fetch the variable and reply
    Read = 0x00,
    /// Store the carried values, no reply
    Write = 0x01,
    /// Reply to a read
    Response = 0x02,
}

impl Operation {
    /// Convert from byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Read),
            0x01 => Some(Self::Write),
            0x02 => Some(Self::Response),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the listener answers this operation on the reply mailbox
    #[must_use]
    pub const fn expects_reply(self) -> bool {
        matches!(self, Self::Read)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "Read",
            Self::Write => "Write",
            Self::Response => "Response",
        };
        write!(f, "{name}")
    }
}

/// Outcome carried in the status byte of a reply record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Status {
    /// Request handled
    #[default]
    Ok = 0x00,
    /// The engine does not know the requested name
    VariableNotFound = 0x01,
    /// Count, kind or name failed validation
    InvalidArgument = 0x02,
    /// The operation byte is not one the listener understands
    UnknownOperation = 0x03,
}

impl Status {
    /// Convert from byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Ok),
            0x01 => Some(Self::VariableNotFound),
            0x02 => Some(Self::InvalidArgument),
            0x03 => Some(Self::UnknownOperation),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the status reports success
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "Ok",
            Self::VariableNotFound => "VariableNotFound",
            Self::InvalidArgument => "InvalidArgument",
            Self::UnknownOperation => "UnknownOperation",
        };
        write!(f, "{name}")
    }
}
