//! Streaming control service and its status machine.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, info};

use studio_sync::Mutex;

use super::{Service, ServiceError};
use crate::EventHub;

/// Status of the outgoing stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    /// Not streaming.
    #[default]
    Offline,

    /// Stream is starting up.
    Starting,

    /// Stream is live.
    Live,

    /// Stream is shutting down.
    Ending,
}

impl StreamStatus {
    /// Returns true if the stream is live.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Returns true if no stream is running.
    pub fn is_offline(self) -> bool {
        matches!(self, Self::Offline)
    }

    /// Returns a simple string representation of the status.
    pub fn name(self) -> &'static str {
        match self {
            Self::Offline => "Offline",
            Self::Starting => "Starting",
            Self::Live => "Live",
            Self::Ending => "Ending",
        }
    }
}

/// Controls the stream lifecycle: Offline → Starting → Live → Ending → Offline.
///
/// Start and stop are serialized by an advisory lock so overlapping requests
/// from different windows cannot interleave a transition; starting while
/// live and stopping while offline are idempotent no-ops returning the
/// current status.
pub struct StreamingService {
    status: RwLock<StreamStatus>,
    lock: Mutex,
    events: Arc<EventHub>,
}

impl StreamingService {
    pub(super) fn new(events: Arc<EventHub>) -> Self {
        Self {
            status: RwLock::new(StreamStatus::Offline),
            lock: Mutex::new(),
            events,
        }
    }

    fn transition(&self, next: StreamStatus) {
        let previous = {
            let mut status = self.status.write();
            let previous = *status;
            *status = next;
            previous
        };

        debug!(previous = previous.name(), current = next.name(), "Stream status transition");
        self.events.emit(
            "StreamingService",
            "statusChanged",
            json!({ "status": next.name(), "previous": previous.name() }),
        );
    }
}

#[async_trait]
impl Service for StreamingService {
    fn name(&self) -> &'static str {
        "StreamingService"
    }

    async fn call(&self, method: &str, _args: &[Value]) -> Result<Value, ServiceError> {
        match method {
            "getStatus" => Ok(json!(self.status.read().name())),
            "startStreaming" => {
                let _guard = self.lock.acquire().await;

                let current = *self.status.read();
                if !current.is_offline() {
                    debug!(status = current.name(), "Already streaming, ignoring start");
                    return Ok(json!(current.name()));
                }

                info!("Starting stream");
                self.transition(StreamStatus::Starting);
                self.transition(StreamStatus::Live);
                Ok(json!(StreamStatus::Live.name()))
            }
            "stopStreaming" => {
                let _guard = self.lock.acquire().await;

                let current = *self.status.read();
                if current.is_offline() {
                    debug!("Already offline, ignoring stop");
                    return Ok(json!(current.name()));
                }

                info!("Stopping stream");
                self.transition(StreamStatus::Ending);
                self.transition(StreamStatus::Offline);
                Ok(json!(StreamStatus::Offline.name()))
            }
            _ => Err(ServiceError::MethodNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_stop_cycle_emits_transitions() {
        let events = Arc::new(EventHub::new());
        let service = StreamingService::new(Arc::clone(&events));
        let mut rx = events.subscribe();

        assert_eq!(service.call("getStatus", &[]).await.unwrap(), json!("Offline"));

        let status = service.call("startStreaming", &[]).await.unwrap();
        assert_eq!(status, json!("Live"));

        let starting = rx.recv().await.unwrap();
        assert_eq!(starting.data["status"], json!("Starting"));
        let live = rx.recv().await.unwrap();
        assert_eq!(live.data["status"], json!("Live"));

        let status = service.call("stopStreaming", &[]).await.unwrap();
        assert_eq!(status, json!("Offline"));
    }

    #[tokio::test]
    async fn test_start_while_live_is_noop() {
        let events = Arc::new(EventHub::new());
        let service = StreamingService::new(Arc::clone(&events));

        service.call("startStreaming", &[]).await.unwrap();
        let mut rx = events.subscribe();

        let status = service.call("startStreaming", &[]).await.unwrap();
        assert_eq!(status, json!("Live"));

        // No transition events for the redundant start.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_while_offline_is_noop() {
        let events = Arc::new(EventHub::new());
        let service = StreamingService::new(events);

        let status = service.call("stopStreaming", &[]).await.unwrap();
        assert_eq!(status, json!("Offline"));
    }
}
