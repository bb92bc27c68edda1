//! Per-connection sequence validation.
//!
//! Sequence numbers are expected to increase by exactly one. Anything
//! else (gap, repeat, decrease) is reported so callers can resync out
//! of band, but delivery is never blocked: this is detection, not flow
//! control.

use huddle_protocol::InboundMessage;

/// Outcome of screening one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// In order, or a control frame without a sequence number.
    InOrder,
    /// Discontinuity observed; the message is still delivered.
    Mismatch { expected: u64, observed: u64 },
}

/// Tracks the last accepted sequence number for one connection.
///
/// Discarded together with its connection; a fresh connection starts a
/// fresh counter.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last_accepted: Option<u64>,
}

impl SequenceTracker {
    /// Creates a tracker with no prior sequence number.
    pub fn new() -> Self {
        Self::default()
    }

    /// Screens a message, updating the counter.
    ///
    /// Messages without a sequence number are accepted without touching
    /// state. A mismatching number is reported but still becomes the
    /// new baseline, so a single gap does not cascade into a report per
    /// message.
    pub fn accept(&mut self, message: &InboundMessage) -> SequenceCheck {
        let Some(observed) = message.sequence_number else {
            return SequenceCheck::InOrder;
        };

        let result = match self.last_accepted {
            None => SequenceCheck::InOrder,
            Some(last) if observed == last + 1 => SequenceCheck::InOrder,
            Some(last) => SequenceCheck::Mismatch {
                expected: last + 1,
                observed,
            },
        };

        self.last_accepted = Some(observed);
        result
    }

    /// Last accepted sequence number, if any message carried one yet.
    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }
}
