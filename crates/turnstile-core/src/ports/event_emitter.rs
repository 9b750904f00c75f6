//! Where turn events go.

use tokio::sync::mpsc;

use crate::events::TurnEvent;

/// Receives every event a controller publishes, in order.
///
/// `emit` runs while the controller holds its state lock and must not block.
pub trait TurnEventEmitter: Send + Sync {
    fn emit(&self, event: TurnEvent);
}

/// Drops every event. Used until a listener is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl TurnEventEmitter for NoopEmitter {
    fn emit(&self, _event: TurnEvent) {}
}

/// Emitter backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<TurnEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TurnEventEmitter for ChannelEmitter {
    fn emit(&self, event: TurnEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Turn event receiver dropped");
        }
    }
}
