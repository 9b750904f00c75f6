//! Domain types for turn coordination.
//!
//! Pure types with no runtime behaviour of their own; the controller in
//! `turnstile-voice` drives them.

pub mod message;
pub mod outcome;
pub mod state;
pub mod turn;

pub use message::{HistoryEntry, MessageBuffer, MessageRole};
pub use outcome::{CompletionStatus, TurnFailure, TurnPhase};
pub use state::AgentState;
pub use turn::{TurnClock, TurnId, TurnToken};
