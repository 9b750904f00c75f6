//! Default in-process adapters for core ports.

pub mod conversation;

pub use conversation::InMemoryConversation;
