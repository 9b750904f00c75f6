//! Settings domain types and validation.
//!
//! These are pure domain types; the only I/O is [`Settings::load`], which
//! reads a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default playback sample rate (24 kHz PCM from the speech service).
pub const DEFAULT_PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Default playback channel count.
pub const DEFAULT_PLAYBACK_CHANNELS: u16 = 1;

/// Default number of audio chunks buffered ahead of the output device.
pub const DEFAULT_PLAYBACK_QUEUE_DEPTH: usize = 8;

/// Errors from settings validation or loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid sample rate {0} Hz: must be between 8000 and 192000")]
    InvalidSampleRate(u32),

    #[error("Invalid channel count {0}: must be 1 or 2")]
    InvalidChannels(u16),

    #[error("Invalid queue depth {0}: must be between 1 and 256")]
    InvalidQueueDepth(usize),

    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Output format and buffering for speech playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Sample rate of the PCM16 audio stream.
    pub sample_rate: u32,

    /// Interleaved channel count of the audio stream.
    pub channels: u16,

    /// Chunks that may be queued ahead of the device before writes suspend.
    pub queue_depth: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_PLAYBACK_SAMPLE_RATE,
            channels: DEFAULT_PLAYBACK_CHANNELS,
            queue_depth: DEFAULT_PLAYBACK_QUEUE_DEPTH,
        }
    }
}

/// Controller settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Whether completed assistant messages are spoken.
    pub auto_speak: bool,

    /// Playback configuration for the audio phase.
    pub playback: PlaybackSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_speak: true,
            playback: PlaybackSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults. Unknown fields are ignored and
    /// missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let settings: Self = serde_json::from_str(&raw)?;
        validate_settings(&settings)?;

        tracing::info!(path = %path.display(), "Loaded turn settings");
        Ok(settings)
    }
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    validate_playback(&settings.playback)
}

/// Validate the playback format and buffering on their own.
pub fn validate_playback(playback: &PlaybackSettings) -> Result<(), SettingsError> {
    if !(8_000..=192_000).contains(&playback.sample_rate) {
        return Err(SettingsError::InvalidSampleRate(playback.sample_rate));
    }

    if !matches!(playback.channels, 1 | 2) {
        return Err(SettingsError::InvalidChannels(playback.channels));
    }

    if !(1..=256).contains(&playback.queue_depth) {
        return Err(SettingsError::InvalidQueueDepth(playback.queue_depth));
    }

    Ok(())
}
