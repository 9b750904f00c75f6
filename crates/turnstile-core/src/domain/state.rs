//! Agent state as seen by UI collaborators.

use serde::{Deserialize, Serialize};

/// Observable status of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// No turn is active.
    #[default]
    Idle,

    /// The text stream of the current turn is being consumed.
    Generating,

    /// The audio stream of the current turn is being played.
    Speaking,

    /// Transient: an interrupt is being dispatched. Always followed by `Idle`.
    Interrupted,
}

impl AgentState {
    /// Lowercase label, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Speaking => "speaking",
            Self::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
