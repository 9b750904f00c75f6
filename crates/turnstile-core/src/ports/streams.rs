//! Stream source ports: the network collaborators' side of a turn.
//!
//! The core never knows how text or audio reaches it. It consumes boxed
//! streams; cancelling the underlying read is done by dropping the stream,
//! which implementations must treat as "abort the request".

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use thiserror::Error;

/// Lazy, finite sequence of text fragments from the language model.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Lazy, finite sequence of encoded audio chunks from the speech service.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// A stream ended abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection or request failed.
    #[error("stream ended abnormally: {0}")]
    Aborted(String),

    /// The upstream service reported an error inside the stream.
    #[error("upstream error (code {code}): {message}")]
    Upstream { code: i64, message: String },

    /// The stream carried a payload that could not be decoded.
    #[error("malformed stream payload: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Wrap an arbitrary collaborator error, keeping its full cause chain.
    pub fn from_source(err: impl Into<anyhow::Error>) -> Self {
        Self::Aborted(format!("{:#}", err.into()))
    }
}

/// Produces an audio stream for a finished assistant message.
///
/// Implemented by the speech-synthesis collaborator. The returned stream is
/// owned by exactly one audio consumer.
#[async_trait]
pub trait SpeechSource: Send + Sync {
    /// Begin synthesising `text`.
    async fn synthesize(&self, text: &str) -> Result<AudioStream, TransportError>;
}
