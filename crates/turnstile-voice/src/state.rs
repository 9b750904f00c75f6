//! Observable agent state.
//!
//! The tracker is owned by the controller and only mutated under its state
//! lock. UI collaborators observe it through a `watch` subscription or the
//! [`TurnEvent`] stream; neither can write it.

use std::sync::Arc;

use tokio::sync::watch;
use turnstile_core::{AgentState, NoopEmitter, TurnEvent, TurnEventEmitter};

/// Current [`AgentState`] plus the sinks that publish its changes.
pub struct AgentStateTracker {
    tx: watch::Sender<AgentState>,
    emitter: Arc<dyn TurnEventEmitter>,
}

impl AgentStateTracker {
    /// Tracker starting in [`AgentState::Idle`].
    pub fn new(emitter: Arc<dyn TurnEventEmitter>) -> Self {
        let (tx, _rx) = watch::channel(AgentState::Idle);
        Self { tx, emitter }
    }

    pub fn current(&self) -> AgentState {
        *self.tx.borrow()
    }

    /// Receiver that sees every committed state change.
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.tx.subscribe()
    }

    /// Transition to `new_state`. Returns `false` if already there.
    pub fn set(&self, new_state: AgentState) -> bool {
        let old = self.current();
        if old == new_state {
            return false;
        }

        tracing::debug!(old = %old, new = %new_state, "Agent state transition");
        self.tx.send_replace(new_state);
        self.emit(TurnEvent::StateChanged { state: new_state });
        true
    }

    /// Publish an event to the UI collaborator.
    pub fn emit(&self, event: TurnEvent) {
        self.emitter.emit(event);
    }

    /// Route future events to `emitter`.
    pub fn set_emitter(&mut self, emitter: Arc<dyn TurnEventEmitter>) {
        self.emitter = emitter;
    }
}

impl Default for AgentStateTracker {
    fn default() -> Self {
        Self::new(Arc::new(NoopEmitter))
    }
}
