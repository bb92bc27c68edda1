//! Outbound control frames and text-frame codec helpers.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::InboundMessage;

/// Control frames the client sends over the channel.
///
/// The auth/binding frame must be the first traffic on every new
/// connection; nothing counts as "connected" until it has been sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Authorization and channel binding, sent once on open.
    #[serde(rename_all = "camelCase")]
    Auth {
        /// Opaque caller-supplied credential; never inspected here.
        token: String,
        /// Namespace for multiplexed channels, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        binding_prefix: Option<String>,
    },

    /// Liveness probe. The peer replies with a pong message echoing `id`.
    Ping {
        /// Ping id, compared against the pong's message id.
        id: String,
    },
}

impl OutboundFrame {
    /// Creates an auth frame without a binding prefix.
    pub fn auth(token: impl Into<String>) -> Self {
        Self::Auth {
            token: token.into(),
            binding_prefix: None,
        }
    }

    /// Creates an auth frame bound to a namespace prefix.
    pub fn auth_with_binding(token: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::Auth {
            token: token.into(),
            binding_prefix: Some(prefix.into()),
        }
    }

    /// Creates a ping frame with the given id.
    pub fn ping(id: impl Into<String>) -> Self {
        Self::Ping { id: id.into() }
    }
}

/// Encodes an outbound frame as a JSON text frame.
pub fn encode_frame(frame: &OutboundFrame) -> ProtocolResult<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Parses an inbound text frame into an envelope.
///
/// Returns [`ProtocolError::EmptyFrame`] for zero-length frames and a
/// serialization error for malformed JSON; callers are expected to log
/// and drop those without closing the connection.
pub fn parse_message(text: &str) -> ProtocolResult<InboundMessage> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyFrame);
    }
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventData;

    #[test]
    fn auth_frame_serde() {
        let frame = OutboundFrame::auth("token-abc");
        let json = encode_frame(&frame).unwrap();
        assert_eq!(json, r#"{"type":"auth","token":"token-abc"}"#);

        let parsed: OutboundFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn auth_frame_with_binding_serde() {
        let frame = OutboundFrame::auth_with_binding("t", "board");
        let json = encode_frame(&frame).unwrap();
        assert_eq!(
            json,
            r#"{"type":"auth","token":"t","bindingPrefix":"board"}"#
        );
    }

    #[test]
    fn ping_frame_serde() {
        let frame = OutboundFrame::ping("ping-7");
        let json = encode_frame(&frame).unwrap();
        assert_eq!(json, r#"{"type":"ping","id":"ping-7"}"#);
    }

    #[test]
    fn parse_message_roundtrip() {
        let message = InboundMessage::new("m-1", EventData::new("pong"));
        let json = serde_json::to_string(&message).unwrap();
        let parsed = parse_message(&json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn parse_message_empty() {
        assert!(matches!(parse_message(""), Err(ProtocolError::EmptyFrame)));
    }

    #[test]
    fn parse_message_malformed() {
        assert!(matches!(
            parse_message("{not json"),
            Err(ProtocolError::Serialization(_))
        ));
    }
}
