//! Real-time client error types.
//!
//! Disconnection is a normal lifecycle event and surfaces through the
//! router's offline notifications, never as an error. Only `connect()`
//! and `disconnect()` calls themselves can fail, and the single-flight
//! machinery hands the same outcome to every concurrent caller, so the
//! variants here are cloneable.

use std::time::Duration;

use thiserror::Error;

/// Result type for real-time client operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Errors returned by `connect()` and `disconnect()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// The WebSocket handshake did not complete within the deadline.
    #[error("handshake did not complete within {timeout:?}")]
    HandshakeTimeout { timeout: Duration },

    /// Frame encoding/decoding failed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying WebSocket failure (connect refused, TLS, IO).
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The connect URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// A `disconnect()` tore down the attempt this `connect()` was
    /// waiting on.
    #[error("connect cancelled by disconnect")]
    ConnectCancelled,

    /// The configured retry cap was reached without a connection.
    #[error("reconnect attempts exhausted after {attempts} failures")]
    RetriesExhausted { attempts: u32 },

    /// The client's background task has shut down.
    #[error("client task has shut down")]
    ClientClosed,
}

impl From<huddle_protocol::ProtocolError> for RealtimeError {
    fn from(err: huddle_protocol::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<url::ParseError> for RealtimeError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
