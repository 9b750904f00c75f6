//! Playback resource handle: one output session for one turn.
//!
//! The handle owns a single [`OutputDevice`] session and guarantees that the
//! device is closed exactly once: explicit [`close`](PlaybackHandle::close)
//! calls after the first are no-ops, and dropping an open handle closes it.
//! A closed handle cannot be written to or reopened.

use bytes::Bytes;
use turnstile_core::{DeviceError, OutputDevice, OutputDeviceFactory, TurnId};

/// Owned playback session for one turn's audio phase.
pub struct PlaybackHandle {
    turn: TurnId,
    device: Box<dyn OutputDevice>,
    closed: bool,
    chunks_written: usize,
}

impl PlaybackHandle {
    /// Open a session on the output device for `turn`.
    pub fn open(factory: &dyn OutputDeviceFactory, turn: TurnId) -> Result<Self, DeviceError> {
        let device = factory.open()?;
        tracing::debug!(turn = %turn, "Playback session opened");

        Ok(Self {
            turn,
            device,
            closed: false,
            chunks_written: 0,
        })
    }

    /// Feed one encoded chunk to the device.
    ///
    /// Suspends while the device buffer is full.
    pub async fn write(&mut self, chunk: Bytes) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }

        let len = chunk.len();
        self.device.write(chunk).await?;
        self.chunks_written += 1;

        tracing::trace!(
            turn = %self.turn,
            bytes = len,
            seq = self.chunks_written,
            "Audio chunk queued"
        );
        Ok(())
    }

    /// Wait for queued audio to finish playing.
    pub async fn drain(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        self.device.drain().await
    }

    /// Close the session. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.closed {
            tracing::trace!(turn = %self.turn, "Playback session already closed");
            return;
        }

        self.closed = true;
        self.device.close();
        tracing::debug!(
            turn = %self.turn,
            chunks = self.chunks_written,
            "Playback session closed"
        );
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Chunks successfully handed to the device.
    #[must_use]
    pub const fn chunks_written(&self) -> usize {
        self.chunks_written
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};
    use turnstile_core::TurnClock;

    use super::*;

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        writes: AtomicUsize,
        closes: AtomicUsize,
    }

    struct CountingDevice(Arc<Counters>);

    #[async_trait]
    impl OutputDevice for CountingDevice {
        async fn write(&mut self, _chunk: Bytes) -> Result<(), DeviceError> {
            self.0.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&mut self) {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingFactory(Arc<Counters>);

    impl OutputDeviceFactory for CountingFactory {
        fn open(&self) -> Result<Box<dyn OutputDevice>, DeviceError> {
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingDevice(Arc::clone(&self.0))))
        }
    }

    struct BrokenFactory;

    impl OutputDeviceFactory for BrokenFactory {
        fn open(&self) -> Result<Box<dyn OutputDevice>, DeviceError> {
            Err(DeviceError::Open("no output device available".into()))
        }
    }

    fn turn() -> TurnId {
        TurnClock::new().mint().id()
    }

    #[tokio::test]
    async fn close_reaches_device_once() {
        let counters = Arc::new(Counters::default());
        let factory = CountingFactory(Arc::clone(&counters));

        let mut handle = PlaybackHandle::open(&factory, turn()).unwrap();
        assert_ok!(handle.write(Bytes::from_static(&[0, 0])).await);

        handle.close();
        handle.close();
        drop(handle);

        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.writes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_handle_rejects_io() {
        let counters = Arc::new(Counters::default());
        let factory = CountingFactory(Arc::clone(&counters));

        let mut handle = PlaybackHandle::open(&factory, turn()).unwrap();
        handle.close();

        assert_eq!(
            handle.write(Bytes::from_static(&[1, 2])).await,
            Err(DeviceError::Closed)
        );
        assert_err!(handle.drain().await);
        assert_eq!(counters.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_closes_open_handle() {
        let counters = Arc::new(Counters::default());
        let factory = CountingFactory(Arc::clone(&counters));

        let handle = PlaybackHandle::open(&factory, turn()).unwrap();
        assert!(!handle.is_closed());
        drop(handle);

        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_failure_is_reported() {
        let result = PlaybackHandle::open(&BrokenFactory, turn());
        assert!(matches!(result, Err(DeviceError::Open(_))));
    }
}
