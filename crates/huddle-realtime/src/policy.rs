//! Close classification: decide whether a disconnect is worth retrying.

use std::time::Duration;

use huddle_protocol::{
    CLOSE_ABNORMAL, CLOSE_GOING_AWAY, CLOSE_INTERNAL_ERROR, CLOSE_NO_STATUS, CLOSE_NORMAL,
    CLOSE_REPLACED, CLOSE_UNSUPPORTED, CloseEvent, REASON_DONE_FORCED, REASON_PONG_MISMATCH,
    REASON_PONG_NOT_RECEIVED,
};

/// Reason substrings that mark a close as transient regardless of its
/// code. Matching is case-sensitive and takes priority over the code.
const TRANSIENT_REASONS: [&str; 4] = [
    "idle",
    REASON_DONE_FORCED,
    REASON_PONG_NOT_RECEIVED,
    REASON_PONG_MISMATCH,
];

/// What to do after a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectVerdict {
    /// Retry against the same URL, optionally after at least this delay.
    Reconnect { delay_hint: Option<Duration> },

    /// Terminal close; no automatic retry.
    PermanentClose,

    /// Another session took ownership of the channel. Terminal but not
    /// an error; retrying would fight the new owner.
    Replaced,
}

impl ReconnectVerdict {
    /// Returns true for the `Reconnect` verdict.
    pub fn should_reconnect(&self) -> bool {
        matches!(self, Self::Reconnect { .. })
    }
}

/// Classifies a close event into a reconnect verdict.
///
/// Reason text is consulted first: a known transient cause (idle
/// timeout, forced teardown, liveness failure) always reconnects, even
/// on code 1000. Otherwise the code decides; an absent or unrecognized
/// code is terminal.
pub fn classify(close: &CloseEvent) -> ReconnectVerdict {
    if TRANSIENT_REASONS.iter().any(|r| close.reason_contains(r)) {
        return ReconnectVerdict::Reconnect { delay_hint: None };
    }

    match close.code {
        Some(CLOSE_NORMAL) | Some(CLOSE_UNSUPPORTED) => ReconnectVerdict::PermanentClose,
        Some(CLOSE_GOING_AWAY) | Some(CLOSE_NO_STATUS) | Some(CLOSE_ABNORMAL)
        | Some(CLOSE_INTERNAL_ERROR) => ReconnectVerdict::Reconnect { delay_hint: None },
        Some(CLOSE_REPLACED) => ReconnectVerdict::Replaced,
        _ => ReconnectVerdict::PermanentClose,
    }
}
