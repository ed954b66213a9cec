// Error type shared by the codecs, the container and the file helpers.

use thiserror::Error;

/// Errors surfaced by every fallible operation in the crate.
///
/// Nothing is retried internally: a corrupt block is reported as soon as
/// it is detected and the caller decides whether to skip it.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A caller-supplied parameter is out of range (zero frame size, zero
    /// invalidation threshold, wrong frame length, zero-width bit field...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The bit reader ran out of input in the middle of a field.
    #[error("unexpected end of stream: needed {needed} bits, {available} available")]
    UnexpectedEndOfStream { needed: u32, available: usize },

    /// The compressed data does not describe a valid frame or container.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// The container was written by a different codec than the decoder
    /// supplied by the caller.
    #[error("codec mismatch: container holds {stored}, decoder is {requested}")]
    CodecMismatch { stored: String, requested: String },

    /// I/O error from a streaming reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptStream(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CodecError>;
