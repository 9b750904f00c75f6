//! Speech service frame decoding.
//!
//! The speech service answers a synthesis request with JSON Lines, one frame
//! per line:
//!
//! ```json
//! {"code": 0, "data": "<base64 pcm>", "message": ""}
//! ```
//!
//! `code == 0` carries audio, [`END_CODE`] marks the end of the stream and any
//! other positive code is an upstream error. Blank and unparseable lines are
//! skipped.

use std::collections::VecDeque;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use serde::Deserialize;
use turnstile_core::{AudioStream, TransportError};

/// Frame code marking the end of synthesis.
pub const END_CODE: i64 = 20_000_000;

const MISSING_CODE: i64 = -1;

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default = "missing_code")]
    code: i64,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

const fn missing_code() -> i64 {
    MISSING_CODE
}

/// Incremental JSON Lines decoder for speech frames.
///
/// Transport chunks may split a line anywhere; the incomplete tail is kept
/// until its newline arrives (or [`finish`](Self::finish) is called).
#[derive(Debug, Default)]
pub struct SpeechFrameDecoder {
    pending: Vec<u8>,
    finished: bool,
}

impl SpeechFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk.
    ///
    /// Returns decoded audio chunks in order. An error, if any, is always the
    /// last item, after which the decoder is finished.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Bytes, TransportError>> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }

        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(offset) = buf[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let stop = self.decode_line(&buf[consumed..end], &mut out);
            consumed = end + 1;

            if stop {
                return out;
            }
        }

        buf.drain(..consumed);
        self.pending = buf;
        out
    }

    /// Decode a trailing line that never got its newline.
    pub fn finish(&mut self) -> Vec<Result<Bytes, TransportError>> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }

        let line = std::mem::take(&mut self.pending);
        self.decode_line(&line, &mut out);
        self.finished = true;
        out
    }

    /// Whether the end marker or an error has been seen.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns `true` when decoding must stop.
    fn decode_line(&mut self, line: &[u8], out: &mut Vec<Result<Bytes, TransportError>>) -> bool {
        let line = line.trim_ascii();
        if line.is_empty() {
            return false;
        }

        let frame: RawFrame = match serde_json::from_slice(line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable speech frame");
                return false;
            }
        };

        match frame.code {
            0 => {
                let Some(data) = frame.data.filter(|d| !d.is_empty()) else {
                    return false;
                };
                match STANDARD.decode(data.as_bytes()) {
                    Ok(audio) => {
                        out.push(Ok(Bytes::from(audio)));
                        false
                    }
                    Err(e) => {
                        out.push(Err(TransportError::Malformed(format!(
                            "invalid base64 audio: {e}"
                        ))));
                        self.finished = true;
                        true
                    }
                }
            }
            END_CODE => {
                tracing::trace!("Speech stream end marker received");
                self.finished = true;
                true
            }
            code if code > 0 => {
                let message = frame
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "unknown error".to_string());
                tracing::warn!(code, %message, "Speech service reported an error");
                out.push(Err(TransportError::Upstream { code, message }));
                self.finished = true;
                true
            }
            code => {
                tracing::trace!(code, "Ignoring speech frame");
                false
            }
        }
    }
}

struct DecodeState<S> {
    body: std::pin::Pin<Box<S>>,
    decoder: SpeechFrameDecoder,
    ready: VecDeque<Result<Bytes, TransportError>>,
    done: bool,
}

/// Adapt a raw response body into an [`AudioStream`] of decoded chunks.
///
/// The stream ends after the end marker or the first error. Dropping it drops
/// `body`, which aborts the underlying request.
pub fn decode_speech_stream<S>(body: S) -> AudioStream
where
    S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SpeechFrameDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.ready.pop_front() {
                return Some((item, st));
            }
            if st.done || st.decoder.is_finished() {
                return None;
            }

            match st.body.next().await {
                Some(Ok(chunk)) => st.ready.extend(st.decoder.feed(&chunk)),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    st.ready.extend(st.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
