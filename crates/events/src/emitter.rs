//! Fire-and-forget event broadcast.

use tokio::sync::broadcast;

use crate::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcasts events to zero or more subscribers.
///
/// Emission happens inline on the publisher's control-flow path, so sends
/// never block: an emitter with no subscribers, or with subscribers that
/// have fallen behind, silently drops events rather than stalling a
/// publish.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: broadcast::Sender<Event>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribes to all events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Emits an event to all current subscribers.
    pub fn emit(&self, event: Event) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}
