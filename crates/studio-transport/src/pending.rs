//! The table of outstanding requests awaiting responses.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use studio_ipc::Response;

use crate::TransportError;

/// Maps in-flight request ids to their response continuations.
///
/// An entry is created when a request is sent and removed when its response
/// arrives. Closing the table drops every continuation, which rejects the
/// waiting callers, and makes all later registrations fail fast with
/// [`TransportError::ChannelClosed`].
pub struct PendingCalls {
    inner: Mutex<PendingState>,
}

struct PendingState {
    calls: HashMap<u64, oneshot::Sender<Response>>,
    closed: bool,
}

impl PendingCalls {
    /// Create an empty, open table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PendingState {
                calls: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Register an outstanding request and return its response receiver.
    pub fn register(&self, id: u64) -> Result<oneshot::Receiver<Response>, TransportError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TransportError::ChannelClosed);
        }

        let (tx, rx) = oneshot::channel();
        inner.calls.insert(id, tx);
        Ok(rx)
    }

    /// Route a response to its waiting caller. Returns false if no caller
    /// was registered under the response's id.
    pub fn complete(&self, response: Response) -> bool {
        let sender = self.inner.lock().calls.remove(&response.id);
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                trace!(id = response.id, "Dropping untracked response");
                false
            }
        }
    }

    /// Drop an entry without completing it (timed-out call).
    pub fn forget(&self, id: u64) {
        self.inner.lock().calls.remove(&id);
    }

    /// Reject every outstanding call and refuse future registrations.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        // Dropping the senders rejects the waiting receivers.
        inner.calls.clear();
    }

    /// Returns true if the table has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Returns true if no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().calls.is_empty()
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_complete_routes_by_id() {
        let pending = PendingCalls::new();
        let rx1 = pending.register(1).unwrap();
        let rx2 = pending.register(2).unwrap();

        assert!(pending.complete(Response::ok(2, json!("second"))));
        assert!(pending.complete(Response::ok(1, json!("first"))));

        assert_eq!(rx1.await.unwrap().into_result().unwrap(), json!("first"));
        assert_eq!(rx2.await.unwrap().into_result().unwrap(), json!("second"));
    }

    #[tokio::test]
    async fn test_untracked_response_is_dropped() {
        let pending = PendingCalls::new();
        assert!(!pending.complete(Response::ok(9, json!(null))));
    }

    #[tokio::test]
    async fn test_close_rejects_all_outstanding() {
        let pending = PendingCalls::new();
        let receivers: Vec<_> = (1..=3).map(|id| pending.register(id).unwrap()).collect();

        pending.close();
        for rx in receivers {
            assert!(rx.await.is_err());
        }

        assert!(pending.is_closed());
        assert!(matches!(
            pending.register(4),
            Err(TransportError::ChannelClosed)
        ));
    }
}
