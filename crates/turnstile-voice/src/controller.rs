//! Turn controller: sequences one agent turn at a time.
//!
//! A turn streams the assistant's text into the conversation, then (when
//! enabled) streams synthesised speech to the output device. Starting a new
//! turn interrupts the active one and waits for its resources to be released
//! before anything new is acquired.
//!
//! # Locking
//!
//! A single `std::sync::Mutex` guards the turn clock, the agent state and the
//! settings. It is never held across an `.await`. Every effect a turn has on
//! shared state (publishing a fragment, committing the message, entering
//! `speaking`, finishing) takes the lock and re-checks the turn token first,
//! so each of those steps is atomic relative to [`TurnController::interrupt`].
//!
//! [`TurnController::start_turn`] is additionally serialised by an async
//! start lock so two concurrent callers cannot interleave their
//! interrupt/settle/mint sequences.
//!
//! A driver that dies before finishing (a panicking stream or emitter,
//! runtime shutdown) retires its turn from `Drop`, so the controller never
//! stays `generating` or `speaking` for a turn nobody is driving.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use turnstile_core::{
    AgentState, CompletionStatus, ConversationStore, HistoryEntry, MessageBuffer, MessageRole,
    NoopEmitter, OutputDeviceFactory, Settings, SettingsError, SpeechSource, TextStream, TurnClock,
    TurnEvent, TurnEventEmitter, TurnFailure, TurnId, TurnPhase, TurnToken, TurnTrigger,
    validate_settings,
};

use crate::consumer;
use crate::state::AgentStateTracker;

// ── Requests and outcomes ──────────────────────────────────────────

/// Everything needed to run one turn.
pub struct TurnRequest {
    trigger: TurnTrigger,
    text: TextStream,
    speech: Option<Arc<dyn SpeechSource>>,
    user_message: Option<String>,
}

impl TurnRequest {
    /// Turn that streams `text` as the assistant's reply.
    pub fn new(trigger: TurnTrigger, text: TextStream) -> Self {
        Self {
            trigger,
            text,
            speech: None,
            user_message: None,
        }
    }

    /// Speak the completed reply through `speech`.
    #[must_use]
    pub fn with_speech(mut self, speech: Arc<dyn SpeechSource>) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Record the user's message in history before the reply starts.
    #[must_use]
    pub fn with_user_message(mut self, content: impl Into<String>) -> Self {
        self.user_message = Some(content.into());
        self
    }
}

/// Terminal report for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn: TurnId,
    /// How the text phase ended.
    pub text: CompletionStatus,
    /// How the audio phase ended, or `None` if it never started.
    pub audio: Option<CompletionStatus>,
}

impl TurnOutcome {
    /// Overall status: the audio phase's if it ran, otherwise the text phase's.
    pub fn status(&self) -> &CompletionStatus {
        match (&self.text, &self.audio) {
            (CompletionStatus::Completed, Some(audio)) => audio,
            (text, _) => text,
        }
    }
}

/// Handle to a started turn.
#[derive(Debug)]
pub struct TurnHandle {
    turn: TurnId,
    task: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    pub const fn id(&self) -> TurnId {
        self.turn
    }

    /// Wait for the turn to end and its resources to be released.
    pub async fn outcome(self) -> TurnOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(turn = %self.turn, error = %e, "Turn driver ended abnormally");
                TurnOutcome {
                    turn: self.turn,
                    text: CompletionStatus::Failed(TurnFailure::Aborted(e.to_string())),
                    audio: None,
                }
            }
        }
    }
}

// ── Controller ─────────────────────────────────────────────────────

/// State guarded by the controller's lock.
struct TurnSlot {
    clock: TurnClock,
    state: AgentStateTracker,
    settings: Settings,
    /// Raised by the most recent turn's driver once its consumers returned.
    settled: Option<watch::Receiver<bool>>,
}

struct Inner {
    slot: Mutex<TurnSlot>,
    start_lock: tokio::sync::Mutex<()>,
    history: Arc<dyn ConversationStore>,
    output: Arc<dyn OutputDeviceFactory>,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, TurnSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Interrupt the live turn, if any. Caller holds the slot lock.
    fn interrupt_locked(&self, slot: &mut TurnSlot) -> Option<TurnId> {
        let Some(turn) = slot.clock.live() else {
            tracing::trace!("Interrupt with no active turn");
            return None;
        };

        slot.state.set(AgentState::Interrupted);
        // Token currency flips before any consumer is woken.
        slot.clock.invalidate();

        match self.history.remove_incomplete(turn) {
            Ok(true) => tracing::debug!(turn = %turn, "Removed partial assistant message"),
            Ok(false) => {}
            Err(e) => tracing::warn!(turn = %turn, error = %e, "Failed to remove partial message"),
        }

        slot.state.emit(TurnEvent::TurnInterrupted { turn });
        slot.state.set(AgentState::Idle);

        tracing::info!(turn = %turn, "Turn interrupted");
        Some(turn)
    }
}

/// Coordinates turns, consumers and agent state.
///
/// Cloning is cheap; clones drive the same controller.
#[derive(Clone)]
pub struct TurnController {
    inner: Arc<Inner>,
}

impl TurnController {
    /// Controller writing to `history` and playing speech on `output`.
    pub fn new(history: Arc<dyn ConversationStore>, output: Arc<dyn OutputDeviceFactory>) -> Self {
        let slot = TurnSlot {
            clock: TurnClock::new(),
            state: AgentStateTracker::new(Arc::new(NoopEmitter)),
            settings: Settings::default(),
            settled: None,
        };

        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(slot),
                start_lock: tokio::sync::Mutex::new(()),
                history,
                output,
            }),
        }
    }

    /// Publish turn events to `emitter`.
    #[must_use]
    pub fn with_emitter(self, emitter: Arc<dyn TurnEventEmitter>) -> Self {
        self.inner.slot().state.set_emitter(emitter);
        self
    }

    pub fn with_settings(self, settings: Settings) -> Result<Self, SettingsError> {
        self.update_settings(settings)?;
        Ok(self)
    }

    /// Replace the settings. Takes effect from the next turn.
    ///
    /// Invalid settings are rejected and the current ones are kept.
    pub fn update_settings(&self, settings: Settings) -> Result<(), SettingsError> {
        validate_settings(&settings)?;
        tracing::debug!(auto_speak = settings.auto_speak, "Turn settings updated");
        self.inner.slot().settings = settings;
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        self.inner.slot().settings.clone()
    }

    /// Current agent state.
    pub fn state(&self) -> AgentState {
        self.inner.slot().state.current()
    }

    /// Subscribe to agent state changes.
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.inner.slot().state.subscribe()
    }

    /// Id of the turn currently driving consumers, if any.
    pub fn current_turn(&self) -> Option<TurnId> {
        self.inner.slot().clock.live()
    }

    /// Start a new turn, interrupting the active one first.
    ///
    /// Returns once the previous turn has released its playback session and
    /// stream readers and the new turn's driver is running.
    pub async fn start_turn(&self, request: TurnRequest) -> TurnHandle {
        let _start = self.inner.start_lock.lock().await;

        let previous = {
            let mut slot = self.inner.slot();
            self.inner.interrupt_locked(&mut slot);
            slot.settled.clone()
        };
        if let Some(settled) = previous {
            wait_settled(settled).await;
        }

        let TurnRequest {
            trigger,
            text,
            speech,
            user_message,
        } = request;

        if let Some(content) = user_message {
            if let Err(e) = self
                .inner
                .history
                .append(HistoryEntry::new(MessageRole::User, content))
            {
                tracing::warn!(error = %e, "Failed to record user message");
            }
        }

        let (settled_tx, settled_rx) = watch::channel(false);
        let (token, speak) = {
            let mut slot = self.inner.slot();
            let token = slot.clock.mint();
            slot.settled = Some(settled_rx);
            slot.state.emit(TurnEvent::TurnStarted {
                turn: token.id(),
                trigger,
            });
            slot.state.set(AgentState::Generating);
            (token, slot.settings.auto_speak)
        };

        tracing::info!(turn = %token.id(), trigger = ?trigger, "Turn started");

        let driver = TurnDriver {
            inner: Arc::clone(&self.inner),
            token: token.clone(),
            speak,
            finished: false,
            settled: settled_tx,
        };
        let task = tokio::spawn(driver.run(text, speech));

        TurnHandle {
            turn: token.id(),
            task,
        }
    }

    /// Interrupt the active turn. Safe to call at any time.
    ///
    /// Never suspends. On return the turn token is invalid, cancellation has
    /// been signalled, any partial assistant message is gone from history and
    /// the state is `idle`. The consumers release their resources shortly
    /// after; [`settle`](Self::settle) waits for that.
    pub fn interrupt(&self) {
        let mut slot = self.inner.slot();
        self.inner.interrupt_locked(&mut slot);
    }

    /// Wait until the most recent turn has released its resources.
    pub async fn settle(&self) {
        let settled = self.inner.slot().settled.clone();
        if let Some(settled) = settled {
            wait_settled(settled).await;
        }
    }

    /// Interrupt and wait for cleanup.
    pub async fn shutdown(&self) {
        self.interrupt();
        self.settle().await;
        tracing::debug!("Turn controller shut down");
    }
}

async fn wait_settled(mut settled: watch::Receiver<bool>) {
    // A dropped sender means the driver is gone, which is settled too.
    if settled.wait_for(|done| *done).await.is_err() {
        tracing::trace!("Previous turn driver already gone");
    }
}

// ── Driver ─────────────────────────────────────────────────────────

/// Runs one turn's pipeline on the runtime.
struct TurnDriver {
    inner: Arc<Inner>,
    token: TurnToken,
    speak: bool,
    /// Set once `finish` has run; checked on drop.
    finished: bool,
    /// Dropped after `Drop::drop` runs, so waiters see cleanup first.
    settled: watch::Sender<bool>,
}

impl TurnDriver {
    async fn run(mut self, text: TextStream, speech: Option<Arc<dyn SpeechSource>>) -> TurnOutcome {
        let turn = self.token.id();
        let mut buffer = MessageBuffer::new(turn);

        let text_status = consumer::consume_text(text, &self.token, &mut buffer, |fragment, buf| {
            self.publish_fragment(fragment, buf);
        })
        .await;

        let text_status = match text_status {
            CompletionStatus::Completed if !self.commit_message(&buffer) => {
                CompletionStatus::Interrupted
            }
            CompletionStatus::Failed(failure) => {
                self.report_failure(&failure, true);
                CompletionStatus::Failed(failure)
            }
            status => status,
        };

        let audio = if text_status.is_completed() {
            self.speak(speech, buffer.text()).await
        } else {
            None
        };

        let outcome = TurnOutcome {
            turn,
            text: text_status,
            audio,
        };

        self.finish(&outcome);
        self.finished = true;
        self.settled.send_replace(true);
        outcome
    }

    /// Mirror a new fragment into history and to the UI.
    fn publish_fragment(&self, fragment: &str, buffer: &MessageBuffer) {
        let slot = self.inner.slot();
        if !self.token.is_current() {
            return;
        }

        let turn = self.token.id();
        if let Err(e) = self.inner.history.upsert_partial(turn, buffer.text()) {
            tracing::warn!(turn = %turn, error = %e, "Failed to update partial message");
        }

        tracing::trace!(turn = %turn, seq = buffer.fragments(), "Text fragment applied");
        slot.state.emit(TurnEvent::TextFragment {
            turn,
            fragment: fragment.to_string(),
        });
    }

    /// Mark the assistant message complete. Returns `false` if the turn went stale.
    fn commit_message(&self, buffer: &MessageBuffer) -> bool {
        let slot = self.inner.slot();
        if !self.token.is_current() {
            tracing::debug!(turn = %self.token.id(), "Completed text belongs to a stale turn");
            return false;
        }

        let turn = self.token.id();
        let content = buffer.text();

        if content.is_empty() {
            tracing::debug!(turn = %turn, "Assistant reply was empty");
        } else if let Err(e) = self.inner.history.complete(turn, content) {
            tracing::warn!(turn = %turn, error = %e, "Failed to complete assistant message");
        }

        slot.state.emit(TurnEvent::MessageCompleted {
            turn,
            content: content.to_string(),
        });
        true
    }

    /// Surface a phase failure. Text failures also discard the partial message.
    fn report_failure(&self, failure: &TurnFailure, discard_partial: bool) {
        let slot = self.inner.slot();
        if !self.token.is_current() {
            return;
        }

        let turn = self.token.id();
        if discard_partial {
            if let Err(e) = self.inner.history.remove_incomplete(turn) {
                tracing::warn!(turn = %turn, error = %e, "Failed to remove partial message");
            }
        }

        slot.state.emit(TurnEvent::TurnFailed {
            turn,
            phase: failure.phase(),
            error: failure.to_string(),
        });
    }

    /// Run the audio phase if this turn should speak.
    async fn speak(
        &self,
        speech: Option<Arc<dyn SpeechSource>>,
        text: &str,
    ) -> Option<CompletionStatus> {
        let turn = self.token.id();

        if !self.speak {
            tracing::debug!(turn = %turn, "Auto-speak disabled, skipping audio");
            return None;
        }
        let Some(speech) = speech else {
            tracing::debug!(turn = %turn, "No speech source, skipping audio");
            return None;
        };
        if text.trim().is_empty() {
            tracing::debug!(turn = %turn, "Nothing to speak");
            return None;
        }

        if !self.enter_speaking() {
            return Some(CompletionStatus::Interrupted);
        }

        let stream = tokio::select! {
            biased;
            () = self.token.cancelled() => {
                tracing::debug!(turn = %turn, "Speech request abandoned on interrupt");
                return Some(CompletionStatus::Interrupted);
            }
            result = speech.synthesize(text) => result,
        };

        let status = match stream {
            Ok(stream) => {
                consumer::consume_audio(stream, &self.token, self.inner.output.as_ref()).await
            }
            Err(e) => {
                tracing::warn!(turn = %turn, error = %e, "Speech request failed");
                CompletionStatus::Failed(TurnFailure::transport(TurnPhase::Audio, e))
            }
        };

        if let CompletionStatus::Failed(failure) = &status {
            // The text answer stays in history.
            self.report_failure(failure, false);
        }

        Some(status)
    }

    /// Advance to `speaking` if this turn is still current.
    fn enter_speaking(&self) -> bool {
        let slot = self.inner.slot();
        if !self.token.is_current() {
            tracing::debug!(turn = %self.token.id(), "Turn went stale before audio");
            return false;
        }
        slot.state.set(AgentState::Speaking);
        true
    }

    /// Return to `idle` if this turn ended on its own.
    fn finish(&self, outcome: &TurnOutcome) {
        let mut slot = self.inner.slot();
        let turn = self.token.id();

        if !slot.clock.retire(turn) {
            tracing::debug!(turn = %turn, "Stale turn finished");
            return;
        }

        slot.state.set(AgentState::Idle);
        slot.state.emit(TurnEvent::TurnFinished { turn });

        tracing::info!(
            turn = %turn,
            text = ?outcome.text,
            audio = ?outcome.audio,
            elapsed_ms = elapsed_ms(&self.token),
            "Turn finished"
        );
    }
}

impl Drop for TurnDriver {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let mut slot = self.inner.slot();
        let turn = self.token.id();
        if !slot.clock.retire(turn) {
            // Interrupted or superseded; whoever did that cleaned up.
            return;
        }

        if let Err(e) = self.inner.history.remove_incomplete(turn) {
            tracing::warn!(turn = %turn, error = %e, "Failed to remove partial message");
        }

        let failure = TurnFailure::Aborted("turn driver stopped before finishing".into());
        slot.state.emit(TurnEvent::TurnFailed {
            turn,
            phase: failure.phase(),
            error: failure.to_string(),
        });
        slot.state.set(AgentState::Idle);

        tracing::error!(turn = %turn, "Turn driver stopped before finishing");
    }
}

fn elapsed_ms(token: &TurnToken) -> i64 {
    (Utc::now() - token.started_at()).num_milliseconds()
}
