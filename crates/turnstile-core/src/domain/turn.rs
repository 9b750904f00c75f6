//! Turn identity and token currency.
//!
//! Every agent turn is tagged with a [`TurnToken`]. The [`TurnClock`] keeps a
//! single shared "current id" cell; a token is *current* while that cell holds
//! its id. Superseding or invalidating a turn flips the cell first and only
//! then fires the token's cancellation, so any code that wakes up from a
//! cancelled await and re-checks [`TurnToken::is_current`] always sees the
//! invalidation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Reserved id meaning "no active turn". Never minted.
const NO_TURN: u64 = 0;

/// Monotonically increasing identifier of one agent turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(u64);

impl TurnId {
    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable handle identifying one turn.
///
/// Cloning is cheap; every clone observes the same currency and the same
/// cancellation signal.
#[derive(Debug, Clone)]
pub struct TurnToken {
    id: TurnId,
    started_at: DateTime<Utc>,
    current: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl TurnToken {
    /// The turn this token belongs to.
    #[must_use]
    pub const fn id(&self) -> TurnId {
        self.id
    }

    /// Wall-clock time at which the token was minted.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether this token still identifies the controller's current turn.
    ///
    /// Once this returns `false` it never returns `true` again.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.id.0
    }

    /// Whether cancellation has been signalled for this turn.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the turn has been invalidated.
    ///
    /// Consumers race this against their pending read so that an interrupt
    /// wakes a suspended read immediately.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// Mints turn tokens and tracks which one is current.
///
/// The clock is not internally synchronised: the owner keeps it behind the
/// same lock that guards agent state, which is what makes "check currency,
/// then act" atomic relative to an interrupt.
#[derive(Debug)]
pub struct TurnClock {
    last: u64,
    current: Arc<AtomicU64>,
    live: Option<TurnToken>,
}

impl TurnClock {
    /// Create a clock with no active turn.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last: NO_TURN,
            current: Arc::new(AtomicU64::new(NO_TURN)),
            live: None,
        }
    }

    /// Mint a new token and make it current.
    ///
    /// Any previously live token is invalidated first.
    pub fn mint(&mut self) -> TurnToken {
        self.invalidate();

        self.last += 1;
        let token = TurnToken {
            id: TurnId(self.last),
            started_at: Utc::now(),
            current: Arc::clone(&self.current),
            cancel: CancellationToken::new(),
        };
        self.current.store(token.id.0, Ordering::SeqCst);
        self.live = Some(token.clone());
        token
    }

    /// Invalidate the live token (if any) and signal its cancellation.
    ///
    /// Returns the invalidated token. Calling this with no live turn is a no-op.
    pub fn invalidate(&mut self) -> Option<TurnToken> {
        let token = self.live.take()?;
        // Currency flips before cancellation fires.
        self.current.store(NO_TURN, Ordering::SeqCst);
        token.cancel.cancel();
        Some(token)
    }

    /// Invalidate the live token only if it belongs to `id`.
    ///
    /// Used when a turn finishes on its own; a stale finisher can never tear
    /// down a newer turn.
    pub fn retire(&mut self, id: TurnId) -> bool {
        if self.live.as_ref().is_some_and(|t| t.id == id) {
            self.invalidate();
            true
        } else {
            false
        }
    }

    /// Id of the live turn, if any.
    #[must_use]
    pub fn live(&self) -> Option<TurnId> {
        self.live.as_ref().map(TurnToken::id)
    }
}

impl Default for TurnClock {
    fn default() -> Self {
        Self::new()
    }
}
