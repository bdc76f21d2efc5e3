//! Error and status types for the decoder.

use std::fmt;

/// The error kinds a decode call can fail with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Mode switch without reset, or a call on an unusable session.
    Argument(String),
    /// Malformed or corrupt compressed data.
    Data(String),
    /// The allocator reported failure while growing session storage.
    Oom,
}

impl DecodeError {
    pub(crate) fn data(message: impl Into<String>) -> Self {
        DecodeError::Data(message.into())
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        DecodeError::Argument(message.into())
    }

    /// The human-readable message, lazily exposed via
    /// `Session::error_message`.
    pub fn message(&self) -> &str {
        match self {
            DecodeError::Argument(msg) => msg,
            DecodeError::Data(msg) => msg,
            DecodeError::Oom => "allocation failed",
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Argument(msg) => write!(f, "argument error: {msg}"),
            DecodeError::Data(msg) => write!(f, "data error: {msg}"),
            DecodeError::Oom => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// The non-error outcomes of a single decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Progress was made (or none was possible this call), but the stream
    /// has not reached its final block yet.
    Progress,
    /// The final block's output has been fully flushed to the caller.
    EndOfStream,
}

/// Result of one `decode_deflate`/`decode_deflate64` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeResult {
    pub consumed_in: usize,
    pub produced_out: usize,
    pub status: DecodeStatus,
}
