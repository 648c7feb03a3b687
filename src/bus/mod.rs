use tokio::sync::broadcast;
use tracing::debug;

use crate::models::event::DispatchEvent;

/// Fan-out bus for domain events. Publishing is fire-and-forget: a slow or
/// absent subscriber never blocks the publisher, and events emitted while a
/// client is disconnected are not redelivered — the client reloads the full
/// mission list on reconnect instead.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Hand the event to every open session. Returns immediately; a zero
    /// subscriber count is normal and not an error.
    pub fn publish(&self, event: DispatchEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => debug!(event = name, receivers, "event published"),
            Err(_) => debug!(event = name, "event published with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.tx.subscribe()
    }

    pub fn session_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
