//! Error types for scdloop-format.

use std::io;
use thiserror::Error;

/// Result type for scdloop-format operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for scdloop-format operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Signature missing or no self-consistent header interpretation.
    #[error("Invalid SCD: {0}")]
    InvalidFormat(String),

    /// A declared size or offset points past the end of the data.
    #[error("Truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: u64,
        have: u64,
    },

    /// The codec id has no known loop persistence strategy.
    #[error("Unsupported codec id {0}")]
    UnsupportedCodec(i32),

    /// Embedded bitstream structure is damaged.
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    /// A value does not fit the field that must hold it.
    #[error("Overflow: {0}")]
    Overflow(String),

    /// Recognised but unsupported feature.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create an invalid format error.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a corrupt stream error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptStream(msg.into())
    }

    /// Create an overflow error.
    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::Overflow(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a truncation error.
    pub fn truncated(what: &'static str, need: u64, have: u64) -> Self {
        Self::Truncated { what, need, have }
    }
}
