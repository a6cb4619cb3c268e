//! Sentinel tokens used as inline protocol markers.
//!
//! The literal tokens are only a wire encoding: model output is decoded into
//! [`ChatState`] or [`Verdict`] right at the boundary, and nothing past that
//! point matches on raw strings.

use serde::{Deserialize, Serialize};

/// The conversation (and the owner's task) is over.
pub const CONVERSATION_ENDS: &str = "[CONVERSATION_ENDS]";

/// A payment went through; the conversation is over.
pub const PAYMENT_SUCCEEDED: &str = "[PAYMENT_SUCCEEDED]";

/// A payment attempt was declined.
pub const PAYMENT_FAILED: &str = "[PAYMENT_FAILED]";

/// The validator approves a candidate reply.
pub const APPROVED: &str = "[YES]";

/// The state classifier says the task is still in progress.
pub const CONTINUE: &str = "[CONTINUE]";

/// Markers that end a conversation as soon as they appear in history.
pub const TERMINATION_MARKERS: [&str; 2] = [PAYMENT_SUCCEEDED, CONVERSATION_ENDS];

/// Whether the conversation should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Continue,
    ConversationEnds,
}

impl ChatState {
    /// Decode a state-classifier reply. Anything other than an explicit
    /// end marker keeps the conversation going.
    pub fn decode(text: &str) -> Self {
        if text.contains(CONVERSATION_ENDS) {
            Self::ConversationEnds
        } else {
            Self::Continue
        }
    }
}

/// Find the first termination marker in a block of history text.
pub fn find_termination_marker(history: &str) -> Option<&'static str> {
    TERMINATION_MARKERS
        .into_iter()
        .find(|marker| history.contains(marker))
}

/// The validator's decision on a candidate reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Rejected { rationale: String },
}

impl Verdict {
    /// Only the bare approval token (surrounding whitespace aside) approves.
    pub fn decode(text: &str) -> Self {
        if text.trim() == APPROVED {
            Self::Approved
        } else {
            Self::Rejected {
                rationale: text.trim().to_string(),
            }
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_state_decoding() {
        assert_eq!(ChatState::decode("[CONVERSATION_ENDS]"), ChatState::ConversationEnds);
        assert_eq!(ChatState::decode("State: [CONVERSATION_ENDS]"), ChatState::ConversationEnds);
        assert_eq!(ChatState::decode("[CONTINUE]"), ChatState::Continue);
        assert_eq!(ChatState::decode("[conversation_ends]"), ChatState::Continue);
        assert_eq!(ChatState::decode(""), ChatState::Continue);
    }

    #[test]
    fn termination_markers_are_case_sensitive_substrings() {
        assert_eq!(
            find_termination_marker("shop: thanks! [PAYMENT_SUCCEEDED] ref 42"),
            Some(PAYMENT_SUCCEEDED)
        );
        assert_eq!(find_termination_marker("alice_ai: [CONVERSATION_ENDS]"), Some(CONVERSATION_ENDS));
        assert_eq!(find_termination_marker("[payment_succeeded]"), None);
    }

    #[test]
    fn verdict_decoding() {
        assert!(Verdict::decode("[YES]").is_approved());
        assert!(Verdict::decode("  [YES]\n").is_approved());
        assert_eq!(
            Verdict::decode("[YES] but mention the budget"),
            Verdict::Rejected { rationale: "[YES] but mention the budget".into() }
        );
        assert!(!Verdict::decode("[yes]").is_approved());
    }
}
