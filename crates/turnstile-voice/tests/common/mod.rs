//! Shared fakes for turn controller integration tests.
//!
//! No audio hardware or network access is required: streams are driven by
//! the test through channels and the output device only records what it is
//! asked to do.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use turnstile_core::{
    AgentState, AudioStream, ChannelEmitter, DeviceError, InMemoryConversation, OutputDevice,
    OutputDeviceFactory, Settings, SpeechSource, TextStream, TransportError, TurnEvent,
};
use turnstile_voice::TurnController;

// ── Tracing ────────────────────────────────────────────────────────

/// Install a test subscriber once per binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Streams ────────────────────────────────────────────────────────

type BoxStream<T> = Pin<Box<dyn Stream<Item = Result<T, TransportError>> + Send>>;

/// Stream fed by the returned sender. It ends when the sender is dropped.
pub fn channel_stream<T: Send + 'static>() -> (
    mpsc::UnboundedSender<Result<T, TransportError>>,
    BoxStream<T>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, UnboundedReceiverStream::new(rx).boxed())
}

/// Finite text stream.
pub fn text_stream(fragments: &[&str]) -> TextStream {
    let items: Vec<Result<String, TransportError>> =
        fragments.iter().map(|f| Ok((*f).to_string())).collect();
    stream::iter(items).boxed()
}

/// Finite audio stream of `count` chunks of four bytes each.
pub fn audio_stream(count: usize) -> AudioStream {
    let items: Vec<Result<Bytes, TransportError>> = (0..count).map(|i| Ok(chunk(i))).collect();
    stream::iter(items).boxed()
}

/// Distinguishable four-byte PCM chunk.
pub fn chunk(i: usize) -> Bytes {
    let b = u8::try_from(i % 256).unwrap_or(0);
    Bytes::from(vec![b, 0, b, 0])
}

// ── Speech source ──────────────────────────────────────────────────

/// Speech source that hands out queued streams in order.
///
/// Once the queue is empty it answers with an empty stream.
#[derive(Default)]
pub struct FakeSpeech {
    streams: Mutex<VecDeque<Result<AudioStream, TransportError>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self, stream: AudioStream) {
        self.streams.lock().unwrap().push_back(Ok(stream));
    }

    pub fn push_error(&self, err: TransportError) {
        self.streams.lock().unwrap().push_back(Err(err));
    }

    /// Texts passed to `synthesize`, in call order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechSource for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, TransportError> {
        self.requests.lock().unwrap().push(text.to_string());
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(stream::empty().boxed()))
    }
}

// ── Output device ──────────────────────────────────────────────────

/// Ordered record of device activity, e.g. `open:1`, `write:1`, `close:1`.
#[derive(Clone, Default)]
pub struct DeviceLog(Arc<Mutex<Vec<String>>>);

impl DeviceLog {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Number of entries equal to `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == entry)
    }
}

/// Output factory whose sessions record into a shared [`DeviceLog`].
#[derive(Default)]
pub struct FakeOutput {
    log: DeviceLog,
    sessions: AtomicUsize,
    open_now: Arc<AtomicUsize>,
    max_open: Arc<AtomicUsize>,
    fail_open: AtomicBool,
}

impl FakeOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> &DeviceLog {
        &self.log
    }

    /// Make subsequent `open` calls fail.
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Highest number of sessions that were open at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.open_now.load(Ordering::SeqCst)
    }
}

impl OutputDeviceFactory for FakeOutput {
    fn open(&self) -> Result<Box<dyn OutputDevice>, DeviceError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(DeviceError::Open("no output device available".into()));
        }

        let id = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        let open = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(open, Ordering::SeqCst);
        self.log.push(format!("open:{id}"));

        Ok(Box::new(FakeDevice {
            id,
            log: self.log.clone(),
            open_now: Arc::clone(&self.open_now),
        }))
    }
}

struct FakeDevice {
    id: usize,
    log: DeviceLog,
    open_now: Arc<AtomicUsize>,
}

#[async_trait]
impl OutputDevice for FakeDevice {
    async fn write(&mut self, _chunk: Bytes) -> Result<(), DeviceError> {
        self.log.push(format!("write:{}", self.id));
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), DeviceError> {
        self.log.push(format!("drain:{}", self.id));
        Ok(())
    }

    fn close(&mut self) {
        self.log.push(format!("close:{}", self.id));
        self.open_now.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub controller: TurnController,
    pub history: Arc<InMemoryConversation>,
    pub output: Arc<FakeOutput>,
    pub events: mpsc::UnboundedReceiver<TurnEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        init_tracing();

        let history = Arc::new(InMemoryConversation::new());
        let output = FakeOutput::new();
        let (emitter, events) = ChannelEmitter::new();

        let controller = TurnController::new(history.clone(), output.clone())
            .with_emitter(Arc::new(emitter))
            .with_settings(settings)
            .expect("test settings are valid");

        Self {
            controller,
            history,
            output,
            events,
        }
    }

    /// Take every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Agent states in the order they were published.
pub fn states(events: &[TurnEvent]) -> Vec<AgentState> {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Poll `cond` until it holds. Panics after five seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached within 5s");
}
