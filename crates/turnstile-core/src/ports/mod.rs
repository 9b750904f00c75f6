//! Port definitions for the external collaborators the controller consumes.
//!
//! Ports are narrow traits; adapters live in other crates (or in
//! [`crate::services`] for the in-memory defaults).

pub mod event_emitter;
pub mod history;
pub mod output;
pub mod streams;

pub use event_emitter::{ChannelEmitter, NoopEmitter, TurnEventEmitter};
pub use history::{ConversationStore, HistoryError};
pub use output::{DeviceError, OutputDevice, OutputDeviceFactory};
pub use streams::{AudioStream, SpeechSource, TextStream, TransportError};
