//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding channel frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize or deserialize a JSON frame.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Received a zero-length text frame.
    #[error("empty frame")]
    EmptyFrame,

    /// Received a frame kind the channel does not carry (e.g. binary).
    #[error("unsupported frame: {kind}")]
    UnsupportedFrame { kind: String },
}

impl ProtocolError {
    /// Creates an unsupported frame error.
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedFrame { kind: kind.into() }
    }
}
