//! Local speaker output via `rodio`.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so every playback
//! session gets its own OS thread that owns the stream for its whole life.
//! The async side talks to it over a bounded channel; a full channel
//! suspends [`OutputDevice::write`], which is the device backpressure the
//! audio consumer relies on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tokio::sync::{mpsc, oneshot};
use turnstile_core::{
    DeviceError, OutputDevice, OutputDeviceFactory, PlaybackSettings, SettingsError,
    validate_playback,
};

use crate::pcm::Pcm16Decoder;

/// Poll interval while the sink is saturated.
const SINK_FULL_BACKOFF: Duration = Duration::from_millis(5);

/// Opens sessions on the default output device.
#[derive(Debug, Clone)]
pub struct LocalOutputFactory {
    settings: PlaybackSettings,
}

impl LocalOutputFactory {
    /// Factory for sessions in the given format.
    ///
    /// The format is checked here; rodio asserts on a zero rate or channel
    /// count inside the audio thread.
    pub fn new(settings: PlaybackSettings) -> Result<Self, SettingsError> {
        validate_playback(&settings)?;
        Ok(Self { settings })
    }
}

impl OutputDeviceFactory for LocalOutputFactory {
    fn open(&self) -> Result<Box<dyn OutputDevice>, DeviceError> {
        let output = LocalOutput::spawn(self.settings.clone())?;
        Ok(Box::new(output))
    }
}

// ── Commands ───────────────────────────────────────────────────────

enum PlaybackCommand {
    /// PCM16 bytes to decode and queue.
    Chunk(Bytes),
    /// Reply once everything queued so far has played.
    Drain(oneshot::Sender<()>),
}

// ── Session ────────────────────────────────────────────────────────

/// One playback session backed by a dedicated audio thread.
struct LocalOutput {
    cmd_tx: Option<mpsc::Sender<PlaybackCommand>>,
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
}

impl LocalOutput {
    fn spawn(settings: PlaybackSettings) -> Result<Self, DeviceError> {
        let (cmd_tx, cmd_rx) = mpsc::channel(settings.queue_depth);
        let (init_tx, init_rx) = std::sync::mpsc::channel();
        let stopped = Arc::new(AtomicBool::new(false));

        let thread_stopped = Arc::clone(&stopped);
        thread::Builder::new()
            .name("turnstile-audio".into())
            .spawn(move || run(&settings, cmd_rx, &init_tx, &thread_stopped))
            .map_err(|e| DeviceError::Open(format!("failed to spawn audio thread: {e}")))?;

        let sink = init_rx
            .recv()
            .map_err(|_| DeviceError::Open("audio thread exited during startup".into()))??;

        Ok(Self {
            cmd_tx: Some(cmd_tx),
            sink,
            stopped,
        })
    }

    fn sender(&self) -> Result<&mpsc::Sender<PlaybackCommand>, DeviceError> {
        self.cmd_tx.as_ref().ok_or(DeviceError::Closed)
    }
}

#[async_trait]
impl OutputDevice for LocalOutput {
    async fn write(&mut self, chunk: Bytes) -> Result<(), DeviceError> {
        self.sender()?
            .send(PlaybackCommand::Chunk(chunk))
            .await
            .map_err(|_| DeviceError::Write("audio thread has exited".into()))
    }

    async fn drain(&mut self) -> Result<(), DeviceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender()?
            .send(PlaybackCommand::Drain(reply_tx))
            .await
            .map_err(|_| DeviceError::Write("audio thread has exited".into()))?;
        reply_rx
            .await
            .map_err(|_| DeviceError::Write("audio thread exited before draining".into()))
    }

    fn close(&mut self) {
        if self.cmd_tx.take().is_none() {
            return;
        }
        // Flag before stopping so a thread woken from the sink sees it.
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
        tracing::debug!("Local playback stopped");
    }
}

impl Drop for LocalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Audio thread ───────────────────────────────────────────────────

/// Body of the audio thread. Owns the output stream until the command
/// channel closes or the session is stopped.
fn run(
    settings: &PlaybackSettings,
    mut cmd_rx: mpsc::Receiver<PlaybackCommand>,
    init_tx: &std::sync::mpsc::Sender<Result<Arc<Sink>, DeviceError>>,
    stopped: &AtomicBool,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init_tx.send(Err(DeviceError::Open(e.to_string())));
            return;
        }
    };
    let sink = match Sink::try_new(&handle) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            let _ = init_tx.send(Err(DeviceError::Open(e.to_string())));
            return;
        }
    };
    if init_tx.send(Ok(Arc::clone(&sink))).is_err() {
        return;
    }

    tracing::debug!(
        sample_rate = settings.sample_rate,
        channels = settings.channels,
        "Local playback session opened"
    );

    let mut decoder = Pcm16Decoder::new();
    while let Some(command) = cmd_rx.blocking_recv() {
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        match command {
            PlaybackCommand::Chunk(bytes) => {
                let samples = decoder.decode(&bytes);
                if samples.is_empty() {
                    continue;
                }
                sink.append(SamplesBuffer::new(
                    settings.channels,
                    settings.sample_rate,
                    samples,
                ));

                // Leave further chunks in the channel until the sink has room.
                while sink.len() >= settings.queue_depth && !stopped.load(Ordering::SeqCst) {
                    thread::sleep(SINK_FULL_BACKOFF);
                }
            }
            PlaybackCommand::Drain(reply) => {
                // Returns early if the session is stopped.
                sink.sleep_until_end();
                let _ = reply.send(());
            }
        }
    }

    sink.stop();
    tracing::debug!("Audio thread exiting");
}
