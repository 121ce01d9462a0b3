//! Window-side IPC client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use studio_ipc::{
    Event, Message, Request, BRIDGE_RESOURCE, READY_EVENT, SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD,
};

use crate::{
    ChannelState, CodecError, EnvelopeCodec, PendingCalls, TransportError, TransportResult,
    OUTBOUND_QUEUE_CAPACITY,
};

/// Capacity of the local event fan-out channel.
const EVENT_FANOUT_CAPACITY: usize = 256;

/// One window's connection to the worker process.
///
/// `call` sends a request and awaits its correlated response;
/// `send_command` is the fire-and-forget path that never tracks the id.
/// There is no default request timeout: a call with no response stays
/// pending until channel teardown, unless an opt-in timeout is armed with
/// [`IpcClient::with_request_timeout`].
pub struct IpcClient {
    pending: Arc<PendingCalls>,
    out_tx: mpsc::Sender<Message>,
    events_tx: broadcast::Sender<Event>,
    next_id: AtomicU64,
    request_timeout: Option<Duration>,
    token: CancellationToken,
    state: Arc<Mutex<ChannelState>>,
}

impl IpcClient {
    /// Connect over a duplex byte stream and wait for the worker's
    /// readiness announcement.
    pub async fn connect<S>(stream: S) -> TransportResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let framed = Framed::new(stream, EnvelopeCodec);
        let (mut sink, inbound) = framed.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_FANOUT_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        let pending = Arc::new(PendingCalls::new());
        let token = CancellationToken::new();
        let state = Arc::new(Mutex::new(ChannelState::Idle));

        let writer_token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_token.cancelled() => break,
                    message = out_rx.recv() => match message {
                        Some(message) => {
                            if let Err(e) = sink.send(message).await {
                                warn!(error = %e, "Outbound write failed");
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        tokio::spawn(read_loop(
            inbound,
            Arc::clone(&pending),
            events_tx.clone(),
            ready_tx,
            token.clone(),
            Arc::clone(&state),
        ));

        // The worker announces readiness before serving; a channel that
        // dies first rejects the handshake.
        ready_rx.await.map_err(|_| TransportError::ChannelClosed)?;
        debug!("Channel ready");

        Ok(Self {
            pending,
            out_tx,
            events_tx,
            next_id: AtomicU64::new(0),
            request_timeout: None,
            token,
            state,
        })
    }

    /// Connect to a worker's Unix domain socket.
    #[cfg(unix)]
    pub async fn connect_unix(path: impl AsRef<std::path::Path>) -> TransportResult<Self> {
        let stream = tokio::net::UnixStream::connect(path).await?;
        Self::connect(stream).await
    }

    /// Arm an opt-in per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Call a method on a remote service and await its result.
    pub async fn call(
        &self,
        resource: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> TransportResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let rx = self.pending.register(id)?;

        let request = Request::new(id, resource, method, args);
        if self.out_tx.send(Message::Request(request)).await.is_err() {
            self.pending.forget(id);
            return Err(TransportError::ChannelClosed);
        }

        let response = match self.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(result) => result,
                Err(_) => {
                    self.pending.forget(id);
                    return Err(TransportError::Timeout);
                }
            },
            None => rx.await,
        };

        let response = response.map_err(|_| TransportError::ChannelClosed)?;
        response.into_result().map_err(TransportError::Remote)
    }

    /// Fire a method without tracking its result.
    ///
    /// A regular request envelope is sent, but no pending entry is
    /// registered; the eventual response arrives untracked and is dropped.
    pub async fn send_command(
        &self,
        resource: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> TransportResult<()> {
        if self.pending.is_closed() {
            return Err(TransportError::ChannelClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let request = Request::new(id, resource, method, args);
        self.out_tx
            .send(Message::Request(request))
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Subscribe this channel to a resource's events.
    pub async fn subscribe(&self, resource: &str) -> TransportResult<()> {
        self.call(BRIDGE_RESOURCE, SUBSCRIBE_METHOD, vec![json!(resource)])
            .await
            .map(|_| ())
    }

    /// Remove this channel's subscription to a resource.
    pub async fn unsubscribe(&self, resource: &str) -> TransportResult<()> {
        self.call(BRIDGE_RESOURCE, UNSUBSCRIBE_METHOD, vec![json!(resource)])
            .await
            .map(|_| ())
    }

    /// Local fan-out of events forwarded by the worker.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.events_tx.subscribe()
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    /// Number of calls awaiting responses.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Tear the channel down, rejecting all pending calls.
    pub fn close(&self) {
        debug!("Closing channel");
        self.token.cancel();
        self.pending.close();
        *self.state.lock() = ChannelState::Closed;
    }
}

impl Drop for IpcClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop<R>(
    mut inbound: R,
    pending: Arc<PendingCalls>,
    events_tx: broadcast::Sender<Event>,
    ready_tx: oneshot::Sender<()>,
    token: CancellationToken,
    state: Arc<Mutex<ChannelState>>,
) where
    R: futures::Stream<Item = Result<Message, CodecError>> + Unpin,
{
    let mut ready_tx = Some(ready_tx);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            frame = inbound.next() => match frame {
                None => {
                    debug!("Worker closed channel");
                    break;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Channel framing failure");
                    break;
                }
                Some(Ok(message)) => {
                    handle_message(message, &pending, &events_tx, &mut ready_tx, &state);
                }
            },
        }
    }

    // Teardown rejects everything still outstanding.
    pending.close();
    *state.lock() = ChannelState::Closed;
    token.cancel();
}

fn handle_message(
    message: Message,
    pending: &PendingCalls,
    events_tx: &broadcast::Sender<Event>,
    ready_tx: &mut Option<oneshot::Sender<()>>,
    state: &Mutex<ChannelState>,
) {
    match message {
        Message::Response(response) => {
            *state.lock() = ChannelState::Active;
            // Untracked responses (a command's discarded result, or a late
            // reply) are dropped by the table.
            pending.complete(response);
        }
        Message::Event(event) => {
            if event.resource == BRIDGE_RESOURCE && event.event == READY_EVENT {
                if let Some(tx) = ready_tx.take() {
                    *state.lock() = ChannelState::Listening;
                    let _ = tx.send(());
                }
            } else {
                *state.lock() = ChannelState::Active;
            }
            let _ = events_tx.send(event);
        }
        Message::Request(request) => {
            trace!(id = request.id, "Ignoring request from worker");
        }
    }
}
