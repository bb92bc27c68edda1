//! Inbound envelope and close record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The typed portion of an inbound envelope.
///
/// `event_type` routes the message; everything else is an opaque
/// payload owned by whichever subscriber consumes the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Event type, e.g. `conversation.activity`. May carry a namespace
    /// prefix on multiplexed channels (`<prefix>.<type>`).
    #[serde(rename = "eventType")]
    pub event_type: String,

    /// Remaining payload fields, passed through untouched.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl EventData {
    /// Creates event data with the given type and no payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Map::new(),
        }
    }

    /// Builder: add a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

/// One inbound envelope from the real-time channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Server-assigned message id. Pongs echo the outstanding ping id here.
    pub id: String,

    /// Per-connection monotonic counter; absent on control frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,

    /// Typed event data.
    pub data: EventData,

    /// Server-side emission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Correlation id threaded through the platform for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
}

impl InboundMessage {
    /// Creates a message with the given id and data, no sequence number.
    pub fn new(id: impl Into<String>, data: EventData) -> Self {
        Self {
            id: id.into(),
            sequence_number: None,
            data,
            timestamp: None,
            tracking_id: None,
        }
    }

    /// Builder: set the sequence number.
    pub fn with_sequence_number(mut self, sequence_number: u64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    /// Builder: set the tracking id.
    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    /// Returns true if this message is a pong control frame.
    pub fn is_pong(&self) -> bool {
        self.data.event_type == crate::PONG_EVENT_TYPE
    }
}

/// Why a connection ended.
///
/// Produced once per connection, either from the peer's close frame or
/// synthesized locally (liveness failure, forced teardown), and consumed
/// by the reconnection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code from the wire, if one was present.
    pub code: Option<u16>,
    /// Close reason text, if any.
    pub reason: Option<String>,
}

impl CloseEvent {
    /// Creates a close event with code and reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: Some(reason.into()),
        }
    }

    /// Creates a close event with a code and no reason.
    pub fn from_code(code: u16) -> Self {
        Self {
            code: Some(code),
            reason: None,
        }
    }

    /// Creates a synthetic close event carrying only a reason.
    pub fn from_reason(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: Some(reason.into()),
        }
    }

    /// Creates a close event with neither code nor reason.
    pub fn empty() -> Self {
        Self {
            code: None,
            reason: None,
        }
    }

    /// Case-sensitive substring match against the reason text.
    pub fn reason_contains(&self, needle: &str) -> bool {
        self.reason.as_deref().is_some_and(|r| r.contains(needle))
    }
}

impl std::fmt::Display for CloseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.reason.as_deref()) {
            (Some(code), Some(reason)) => write!(f, "{code} ({reason})"),
            (Some(code), None) => write!(f, "{code}"),
            (None, Some(reason)) => write!(f, "({reason})"),
            (None, None) => write!(f, "unknown"),
        }
    }
}
