//! Broadcast fan-out of service mutation events.

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use studio_ipc::Event;

use crate::EVENT_CHANNEL_CAPACITY;

/// Publishes service events to every listening transport.
///
/// Delivery is at-least-once and carries no ordering guarantee relative to
/// unrelated requests; an event happens-after the mutation that produced it.
/// Emitting with no subscribers is a no-op.
pub struct EventHub {
    tx: broadcast::Sender<Event>,
}

impl EventHub {
    /// Create a hub with the default channel capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event from a service mutation.
    pub fn emit(&self, resource: impl Into<String>, event: impl Into<String>, data: Value) {
        let event = Event::new(resource, event, data);
        trace!(resource = %event.resource, event = %event.event, "Emitting event");

        // No receivers is fine; windows may not be listening yet.
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();

        hub.emit("ScenesService", "sceneAdded", json!({ "id": "scene-3" }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.resource, "ScenesService");
        assert_eq!(event.event, "sceneAdded");
        assert_eq!(event.data, json!({ "id": "scene-3" }));
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let hub = EventHub::new();
        hub.emit("AudioService", "volumeChanged", json!({}));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
