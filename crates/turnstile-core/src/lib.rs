//! Core domain types and port definitions for turnstile.
//!
//! `turnstile-core` holds everything the turn controller reasons about
//! without touching a device or a network: turn tokens, agent state, the
//! in-flight message buffer, completion statuses, the collaborator ports
//! and the event union. The controller itself lives in `turnstile-voice`.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod services;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AgentState, CompletionStatus, HistoryEntry, MessageBuffer, MessageRole, TurnClock,
    TurnFailure, TurnId, TurnPhase, TurnToken,
};
pub use events::{TurnEvent, TurnTrigger};
pub use ports::{
    AudioStream, ChannelEmitter, ConversationStore, DeviceError, HistoryError, NoopEmitter,
    OutputDevice, OutputDeviceFactory, SpeechSource, TextStream, TransportError,
    TurnEventEmitter,
};
pub use services::InMemoryConversation;
pub use settings::{
    DEFAULT_PLAYBACK_CHANNELS, DEFAULT_PLAYBACK_QUEUE_DEPTH, DEFAULT_PLAYBACK_SAMPLE_RATE,
    PlaybackSettings, Settings, SettingsError, validate_playback, validate_settings,
};
