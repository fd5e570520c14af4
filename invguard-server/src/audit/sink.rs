//! Live-update notification sinks

use shared::LiveUpdate;
use tokio::sync::broadcast;

/// Default capacity of the live-update broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Receiver side of live updates
///
/// `publish` must not block and must not fail the caller.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, update: &LiveUpdate);
}

/// `tokio::sync::broadcast` backed sink
///
/// Slow subscribers lag and lose events; there is no replay.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<LiveUpdate>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, update: &LiveUpdate) {
        match self.tx.send(update.clone()) {
            Ok(receivers) => {
                tracing::trace!(event = %update.event_type, receivers, "Live update published");
            }
            Err(_) => {
                tracing::trace!(event = %update.event_type, "No live-update subscribers");
            }
        }
    }
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn publish(&self, _update: &LiveUpdate) {}
}
