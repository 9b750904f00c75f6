//! Conversation history store port.
//!
//! The controller mirrors the streaming assistant message into the store and
//! removes it again if the turn never completes. `complete` and
//! `remove_incomplete` are no-ops when the turn has no entry.

use thiserror::Error;

use crate::domain::message::HistoryEntry;
use crate::domain::turn::TurnId;

/// Errors that can occur in history operations.
#[derive(Debug, Clone, Error)]
pub enum HistoryError {
    #[error("History store unavailable: {0}")]
    Unavailable(String),

    #[error("Entry for turn {0} is already complete")]
    AlreadyComplete(TurnId),
}

/// Port for the visible conversation.
///
/// Methods are synchronous: an interrupt must be able to remove the partial
/// message before it returns, without awaiting I/O. Implementations use
/// interior mutability.
pub trait ConversationStore: Send + Sync {
    /// Append a finished entry (user messages, system notes).
    fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError>;

    /// Create or replace the streaming assistant entry for `turn`.
    fn upsert_partial(&self, turn: TurnId, content: &str) -> Result<(), HistoryError>;

    /// Mark the entry for `turn` complete with its final content.
    fn complete(&self, turn: TurnId, content: &str) -> Result<(), HistoryError>;

    /// Remove the last incomplete entry for `turn`.
    ///
    /// Returns whether an entry was removed.
    fn remove_incomplete(&self, turn: TurnId) -> Result<bool, HistoryError>;

    /// Copy of all entries, oldest first.
    fn snapshot(&self) -> Vec<HistoryEntry>;
}
