//! Conversation message types.
//!
//! These types represent conversation entries and the in-flight assistant
//! message, independent of any storage or rendering concern.

use serde::{Deserialize, Serialize};

use super::turn::TurnId;

/// Who a history entry speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Recorded when a turn is started with the user's message.
    User,
    /// Produced by a turn's text stream.
    Assistant,
}

/// One entry in the visible conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Turn that produced this entry (`None` for user entries).
    pub turn: Option<TurnId>,
    pub role: MessageRole,
    pub content: String,
    /// `false` while the assistant message is still streaming.
    pub complete: bool,
}

impl HistoryEntry {
    /// A finished entry not tied to any agent turn.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            turn: None,
            role,
            content: content.into(),
            complete: true,
        }
    }

    /// A streaming assistant entry for `turn`.
    pub fn partial(turn: TurnId, content: impl Into<String>) -> Self {
        Self {
            turn: Some(turn),
            role: MessageRole::Assistant,
            content: content.into(),
            complete: false,
        }
    }
}

/// Assistant text accumulated while a turn's text stream is consumed.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    turn: TurnId,
    text: String,
    fragments: usize,
    complete: bool,
}

impl MessageBuffer {
    /// Empty buffer owned by `turn`.
    #[must_use]
    pub const fn new(turn: TurnId) -> Self {
        Self {
            turn,
            text: String::new(),
            fragments: 0,
            complete: false,
        }
    }

    /// Append a fragment in arrival order.
    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    /// Mark the stream as exhausted.
    pub const fn mark_complete(&mut self) {
        self.complete = true;
    }

    #[must_use]
    pub const fn turn(&self) -> TurnId {
        self.turn
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of fragments applied so far.
    #[must_use]
    pub const fn fragments(&self) -> usize {
        self.fragments
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }
}
