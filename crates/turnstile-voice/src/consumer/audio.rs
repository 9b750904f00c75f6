//! Audio stream consumer.

use futures_util::StreamExt;
use turnstile_core::{
    AudioStream, CompletionStatus, OutputDeviceFactory, TurnFailure, TurnPhase, TurnToken,
};

use crate::playback::PlaybackHandle;

/// Play `stream` on a device from `output` for as long as `token` stays current.
///
/// The playback session is opened lazily on the first chunk; a stream that
/// yields nothing never touches the device. On every exit path the stream is
/// dropped first and the session closed second. A completed stream is drained
/// before the session closes, so "completed" means the audio was heard.
pub async fn consume(
    mut stream: AudioStream,
    token: &TurnToken,
    output: &dyn OutputDeviceFactory,
) -> CompletionStatus {
    let mut handle = None;

    let status = match pump(&mut stream, token, output, &mut handle).await {
        Ok(status) => status,
        Err(failure) => {
            tracing::warn!(turn = %token.id(), error = %failure, "Audio playback failed");
            CompletionStatus::Failed(failure)
        }
    };

    drop(stream);
    if let Some(mut playback) = handle {
        playback.close();
    }

    status
}

async fn pump(
    stream: &mut AudioStream,
    token: &TurnToken,
    output: &dyn OutputDeviceFactory,
    handle: &mut Option<PlaybackHandle>,
) -> Result<CompletionStatus, TurnFailure> {
    let turn = token.id();

    if !token.is_current() {
        tracing::debug!(turn = %turn, "Audio stream skipped for stale turn");
        return Ok(CompletionStatus::Interrupted);
    }

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(turn = %turn, "Audio stream interrupted");
                return Ok(CompletionStatus::Interrupted);
            }
            item = stream.next() => item,
        };

        if !token.is_current() {
            tracing::debug!(turn = %turn, "Discarding audio read for superseded turn");
            return Ok(CompletionStatus::Interrupted);
        }

        let chunk = match next {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(TurnFailure::transport(TurnPhase::Audio, e)),
            None => break,
        };

        let playback = match handle.take() {
            Some(playback) => playback,
            None => PlaybackHandle::open(output, turn)?,
        };
        let playback = handle.insert(playback);

        // A write suspended on a full device buffer is abandoned on interrupt.
        tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(turn = %turn, "Audio write abandoned on interrupt");
                return Ok(CompletionStatus::Interrupted);
            }
            written = playback.write(chunk) => written?,
        }
    }

    let Some(playback) = handle.as_mut() else {
        tracing::debug!(turn = %turn, "Audio stream was empty");
        return Ok(CompletionStatus::Completed);
    };

    tokio::select! {
        biased;
        () = token.cancelled() => {
            tracing::debug!(turn = %turn, "Playback drain interrupted");
            return Ok(CompletionStatus::Interrupted);
        }
        drained = playback.drain() => drained?,
    }

    tracing::debug!(turn = %turn, chunks = playback.chunks_written(), "Audio playback complete");
    Ok(CompletionStatus::Completed)
}
