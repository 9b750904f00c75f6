//! Interruptible turn controller for turnstile.
//!
//! A turn streams the assistant's reply as text, then speaks it. The
//! [`TurnController`] guarantees at most one turn drives consumers at any
//! instant, that an interrupt lands within one chunk boundary, and that every
//! playback session it opens is closed exactly once.
//!
//! The speech and language-model transports are collaborators: they hand the
//! controller boxed streams (see [`turnstile_core::ports`]). [`frames`]
//! adapts the speech service's JSON Lines body into such a stream, and the
//! `local-playback` feature provides a speaker output built on `rodio`.

#![deny(unused_crate_dependencies)]

// Dev-dependencies only used by integration tests
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tracing_subscriber as _;

pub mod consumer;
pub mod controller;
pub mod frames;
#[cfg(feature = "local-playback")]
pub mod local;
pub mod pcm;
pub mod playback;
pub mod state;

// Re-export key types for convenience
pub use controller::{TurnController, TurnHandle, TurnOutcome, TurnRequest};
pub use frames::{END_CODE, SpeechFrameDecoder, decode_speech_stream};
#[cfg(feature = "local-playback")]
pub use local::LocalOutputFactory;
pub use pcm::Pcm16Decoder;
pub use playback::PlaybackHandle;
pub use state::AgentStateTracker;
