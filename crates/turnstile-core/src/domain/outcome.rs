//! Terminal outcomes of stream consumers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::{DeviceError, TransportError};

/// Phase of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    /// Language-model text streaming.
    Text,
    /// Speech synthesis and playback.
    Audio,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Audio => "audio",
        })
    }
}

/// Why a consumer (or the turn driving it) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnFailure {
    /// The token or audio stream ended abnormally.
    #[error("{phase} stream failed: {source}")]
    Transport {
        phase: TurnPhase,
        source: TransportError,
    },

    /// The output device could not be opened or rejected a write.
    #[error("audio output failed: {0}")]
    Resource(#[from] DeviceError),

    /// The task driving the turn ended without reporting (panic or runtime shutdown).
    #[error("turn aborted: {0}")]
    Aborted(String),
}

impl TurnFailure {
    /// Transport failure during `phase`.
    #[must_use]
    pub const fn transport(phase: TurnPhase, source: TransportError) -> Self {
        Self::Transport { phase, source }
    }

    /// Phase the failure belongs to. Resource failures are always audio.
    #[must_use]
    pub const fn phase(&self) -> Option<TurnPhase> {
        match self {
            Self::Transport { phase, .. } => Some(*phase),
            Self::Resource(_) => Some(TurnPhase::Audio),
            Self::Aborted(_) => None,
        }
    }
}

/// Terminal status reported by a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The stream was exhausted without interruption.
    Completed,
    /// The turn was superseded or interrupted. Not an error.
    Interrupted,
    /// The stream or device failed.
    Failed(TurnFailure),
}

impl CompletionStatus {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// The failure, if this status is `Failed`.
    #[must_use]
    pub const fn failure(&self) -> Option<&TurnFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
