//! Audio output port.
//!
//! An [`OutputDevice`] is one playback session (decoder + output device) for
//! one turn. Sessions are created through an [`OutputDeviceFactory`] so the
//! audio consumer can open one lazily on the first chunk.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors raised by an output device session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The output device could not be opened.
    #[error("failed to open audio output: {0}")]
    Open(String),

    /// A chunk could not be decoded or queued.
    #[error("audio output write failed: {0}")]
    Write(String),

    /// The session has already been closed.
    #[error("audio output session is closed")]
    Closed,
}

/// One open playback session.
#[async_trait]
pub trait OutputDevice: Send {
    /// Queue an encoded chunk for decode and playback.
    ///
    /// Must suspend (not drop the chunk) while the device buffer is full.
    /// Chunks are played in the order they are written.
    async fn write(&mut self, chunk: Bytes) -> Result<(), DeviceError>;

    /// Wait until everything written so far has been played.
    async fn drain(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Stop playback and release the device. Must be idempotent.
    fn close(&mut self);
}

/// Opens playback sessions.
pub trait OutputDeviceFactory: Send + Sync {
    /// Open a fresh session on the output device.
    fn open(&self) -> Result<Box<dyn OutputDevice>, DeviceError>;
}
