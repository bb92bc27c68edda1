//! Wire types for the huddle real-time event channel.
//!
//! The real-time channel carries JSON text frames over a WebSocket.
//! Inbound frames are [`InboundMessage`] envelopes; outbound traffic is
//! limited to the control frames in [`OutboundFrame`] (the auth/binding
//! frame sent on open, and periodic pings).
//!
//! # Envelope structure
//!
//! ```json
//! {
//!   "id": "f0b6…",
//!   "sequenceNumber": 42,
//!   "data": { "eventType": "conversation.activity", "...": "..." },
//!   "timestamp": "2026-08-28T10:00:00Z",
//!   "trackingId": "sdk_a1b2…"
//! }
//! ```
//!
//! `sequenceNumber` is absent on control frames (pongs, bootstrap
//! buffer notices); everything under `data` beyond `eventType` is an
//! opaque payload passed through to subscribers.

mod error;
mod frames;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use frames::{OutboundFrame, encode_frame, parse_message};
pub use types::{CloseEvent, EventData, InboundMessage};

/// Normal closure; terminal unless the reason says otherwise.
pub const CLOSE_NORMAL: u16 = 1000;
/// Endpoint going away; expected to be transient.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Unsupported data; terminal.
pub const CLOSE_UNSUPPORTED: u16 = 1003;
/// No status code present in the close frame.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Abnormal closure (connection dropped without a close frame).
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Server hit an unexpected condition.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;
/// Another session took ownership of the channel.
pub const CLOSE_REPLACED: u16 = 4000;

/// Reason on the synthetic close produced when the peer never
/// acknowledges our close frame within the force-close delay.
pub const REASON_DONE_FORCED: &str = "done (forced)";
/// Reason on the synthetic close produced when no pong arrives in time.
pub const REASON_PONG_NOT_RECEIVED: &str = "pong not received";
/// Reason on the synthetic close produced when a pong echoes the wrong
/// ping id.
pub const REASON_PONG_MISMATCH: &str = "pong mismatch";

/// Event type carried by pong control messages.
pub const PONG_EVENT_TYPE: &str = "pong";
