//! Canonical event union emitted by the turn controller.
//!
//! UI collaborators subscribe to these instead of reading controller state,
//! so the core never depends on a rendering concern.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "state_changed", "state": "speaking" }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{AgentState, TurnId, TurnPhase};

/// Which user action started a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnTrigger {
    /// The user sent a typed message.
    MessageSent,
    /// The user submitted one or more suggested options.
    OptionSubmitted,
    /// The user started a voice recording.
    RecordingStarted,
}

/// Events emitted while turns run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A new turn was minted and its driver started.
    TurnStarted { turn: TurnId, trigger: TurnTrigger },

    /// Agent state changed.
    StateChanged { state: AgentState },

    /// A text fragment was applied to the in-flight message.
    TextFragment { turn: TurnId, fragment: String },

    /// The assistant message for a turn is complete and in history.
    MessageCompleted { turn: TurnId, content: String },

    /// A turn was interrupted.
    TurnInterrupted { turn: TurnId },

    /// A phase failed; the message is user-visible.
    TurnFailed {
        turn: TurnId,
        phase: Option<TurnPhase>,
        error: String,
    },

    /// A turn ran to its end (success or failure) without being interrupted.
    TurnFinished { turn: TurnId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TurnClock;

    #[test]
    fn events_are_type_tagged() {
        let json = serde_json::to_value(TurnEvent::StateChanged {
            state: AgentState::Speaking,
        })
        .unwrap();
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["state"], "speaking");
    }

    #[test]
    fn turn_ids_serialize_as_numbers() {
        let mut clock = TurnClock::new();
        let turn = clock.mint().id();
        let json = serde_json::to_value(TurnEvent::TurnStarted {
            turn,
            trigger: TurnTrigger::OptionSubmitted,
        })
        .unwrap();
        assert_eq!(json["turn"], 1);
        assert_eq!(json["trigger"], "option_submitted");
    }
}
