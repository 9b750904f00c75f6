//! In-memory conversation history.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::message::{HistoryEntry, MessageRole};
use crate::domain::turn::TurnId;
use crate::ports::history::{ConversationStore, HistoryError};

/// [`ConversationStore`] backed by a vector.
///
/// Suitable for a single UI session and for tests.
#[derive(Debug, Default)]
pub struct InMemoryConversation {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl InMemoryConversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing entries.
    pub fn with_entries(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConversationStore for InMemoryConversation {
    fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries().push(entry);
        Ok(())
    }

    fn upsert_partial(&self, turn: TurnId, content: &str) -> Result<(), HistoryError> {
        let mut entries = self.entries();
        match entries.iter_mut().rev().find(|e| e.turn == Some(turn)) {
            Some(entry) if entry.complete => Err(HistoryError::AlreadyComplete(turn)),
            Some(entry) => {
                content.clone_into(&mut entry.content);
                Ok(())
            }
            None => {
                entries.push(HistoryEntry::partial(turn, content));
                Ok(())
            }
        }
    }

    fn complete(&self, turn: TurnId, content: &str) -> Result<(), HistoryError> {
        let mut entries = self.entries();
        if let Some(entry) = entries
            .iter_mut()
            .rev()
            .find(|e| e.turn == Some(turn) && e.role == MessageRole::Assistant)
        {
            content.clone_into(&mut entry.content);
            entry.complete = true;
        }
        Ok(())
    }

    fn remove_incomplete(&self, turn: TurnId) -> Result<bool, HistoryError> {
        let mut entries = self.entries();
        let position = entries
            .iter()
            .rposition(|e| e.turn == Some(turn) && !e.complete);
        Ok(position.map(|idx| entries.remove(idx)).is_some())
    }

    fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries().clone()
    }
}
