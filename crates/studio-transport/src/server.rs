//! Worker-side IPC server multiplexing window channels.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use studio_ipc::{
    Event, Message, Request, Response, ResponseError, BRIDGE_RESOURCE, READY_EVENT,
    SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD,
};
use studio_services::{Dispatcher, EventHub};

use crate::{ChannelState, EnvelopeCodec, OUTBOUND_QUEUE_CAPACITY};

/// Serves the worker's service graph to any number of window channels.
///
/// Every attached channel is driven by its own task against the one shared
/// [`Dispatcher`], so requests from different windows interleave freely;
/// each request is additionally dispatched as its own task, and responses
/// are correlated by id on the client side, so completion order is free.
/// Service events from the [`EventHub`] are forwarded to the channels
/// subscribed to their resource name.
pub struct IpcServer {
    dispatcher: Arc<Dispatcher>,
    events: Arc<EventHub>,
    channels: Arc<Mutex<HashMap<u64, ChannelHandle>>>,
    next_channel: AtomicU64,
}

struct ChannelHandle {
    token: CancellationToken,
    state: Arc<Mutex<ChannelState>>,
}

impl IpcServer {
    /// Create a server over the given dispatcher and event hub.
    pub fn new(dispatcher: Arc<Dispatcher>, events: Arc<EventHub>) -> Self {
        Self {
            dispatcher,
            events,
            channels: Arc::new(Mutex::new(HashMap::new())),
            next_channel: AtomicU64::new(0),
        }
    }

    /// Drive a duplex byte stream as one window channel.
    ///
    /// Announces readiness with the bridge `ready` event, then serves until
    /// the peer disconnects or [`IpcServer::shutdown`] is called. Returns
    /// the channel's id.
    pub fn attach<S>(&self, stream: S) -> u64
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let channel_id = self.next_channel.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let state = Arc::new(Mutex::new(ChannelState::Idle));

        self.channels.lock().insert(
            channel_id,
            ChannelHandle {
                token: token.clone(),
                state: Arc::clone(&state),
            },
        );

        let dispatcher = Arc::clone(&self.dispatcher);
        let event_rx = self.events.subscribe();
        let channels = Arc::clone(&self.channels);

        tokio::spawn(async move {
            run_channel(channel_id, stream, dispatcher, event_rx, token, Arc::clone(&state)).await;
            *state.lock() = ChannelState::Closed;
            channels.lock().remove(&channel_id);
            info!(channel = channel_id, "Channel closed");
        });

        channel_id
    }

    /// Accept window connections on a Unix domain socket, attaching each.
    #[cfg(unix)]
    pub async fn listen_unix(&self, path: impl AsRef<std::path::Path>) -> crate::TransportResult<()> {
        let path = path.as_ref();
        if path.exists() {
            // Stale socket from a previous run.
            std::fs::remove_file(path)?;
        }

        let listener = tokio::net::UnixListener::bind(path)?;
        info!(socket = %path.display(), "Listening for window connections");

        loop {
            let (stream, _addr) = listener.accept().await?;
            let channel = self.attach(stream);
            debug!(channel, "Window connected");
        }
    }

    /// The dispatcher serving all channels.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The hub whose events are fanned out to subscribed channels.
    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Number of currently attached channels.
    pub fn active_channels(&self) -> usize {
        self.channels.lock().len()
    }

    /// Tear down every channel.
    pub fn shutdown(&self) {
        info!("Shutting down IPC server");
        let mut channels = self.channels.lock();
        for handle in channels.values() {
            handle.token.cancel();
            *handle.state.lock() = ChannelState::Closed;
        }
        channels.clear();
    }
}

async fn run_channel<S>(
    channel_id: u64,
    stream: S,
    dispatcher: Arc<Dispatcher>,
    mut event_rx: broadcast::Receiver<Event>,
    token: CancellationToken,
    state: Arc<Mutex<ChannelState>>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let framed = Framed::new(stream, EnvelopeCodec);
    let (mut sink, mut inbound) = framed.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_CAPACITY);

    // Writer task owns the sink.
    let writer_token = token.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_token.cancelled() => break,
                message = out_rx.recv() => match message {
                    Some(message) => {
                        if let Err(e) = sink.send(message).await {
                            warn!(channel = channel_id, error = %e, "Outbound write failed");
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    let subscriptions: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

    // Event fan-out, gated by the channel's subscription set. Bridge events
    // bypass the gate.
    let forward_tx = out_tx.clone();
    let forward_subs = Arc::clone(&subscriptions);
    let forward_token = token.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = forward_token.cancelled() => break,
                event = event_rx.recv() => match event {
                    Ok(event) => {
                        let wanted = event.resource == BRIDGE_RESOURCE
                            || forward_subs.lock().contains(&event.resource);
                        if wanted && forward_tx.send(Message::Event(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(channel = channel_id, missed, "Event fan-out lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });

    // Announce readiness.
    if out_tx
        .send(Message::Event(Event::new(BRIDGE_RESOURCE, READY_EVENT, Value::Null)))
        .await
        .is_ok()
    {
        *state.lock() = ChannelState::Listening;
        debug!(channel = channel_id, "Channel listening");
    }

    let in_flight: Arc<Mutex<HashSet<u64>>> = Arc::new(Mutex::new(HashSet::new()));

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            frame = inbound.next() => match frame {
                None => {
                    debug!(channel = channel_id, "Peer closed channel");
                    break;
                }
                Some(Err(e)) => {
                    warn!(channel = channel_id, error = %e, "Channel framing failure");
                    break;
                }
                Some(Ok(message)) => {
                    {
                        let mut state = state.lock();
                        if !state.is_active() {
                            *state = ChannelState::Active;
                        }
                    }
                    handle_inbound(channel_id, message, &dispatcher, &out_tx, &subscriptions, &in_flight);
                }
            },
        }
    }

    token.cancel();
    let _ = writer.await;
    let _ = forwarder.await;
}

fn handle_inbound(
    channel_id: u64,
    message: Message,
    dispatcher: &Arc<Dispatcher>,
    out_tx: &mpsc::Sender<Message>,
    subscriptions: &Arc<Mutex<HashSet<String>>>,
    in_flight: &Arc<Mutex<HashSet<u64>>>,
) {
    let request = match message {
        Message::Request(request) => request,
        Message::Response(response) => {
            trace!(channel = channel_id, id = response.id, "Ignoring response from peer");
            return;
        }
        Message::Event(event) => {
            trace!(channel = channel_id, resource = %event.resource, "Ignoring event from peer");
            return;
        }
    };

    if request.params.resource == BRIDGE_RESOURCE {
        send_response(out_tx, handle_bridge_request(&request, subscriptions));
        return;
    }

    // Reusing an id while its request is still in flight is a protocol
    // error; the offending request never reaches the dispatcher.
    if !in_flight.lock().insert(request.id) {
        warn!(channel = channel_id, id = request.id, "Duplicate in-flight request id");
        send_response(
            out_tx,
            Response::err(request.id, ResponseError::new("duplicate request id")),
        );
        return;
    }

    let dispatcher = Arc::clone(dispatcher);
    let out_tx = out_tx.clone();
    let in_flight = Arc::clone(in_flight);
    tokio::spawn(async move {
        let response = dispatcher.dispatch(&request).await;
        in_flight.lock().remove(&request.id);
        let _ = out_tx.send(Message::Response(response)).await;
    });
}

fn handle_bridge_request(request: &Request, subscriptions: &Mutex<HashSet<String>>) -> Response {
    let target = request.params.args.first().and_then(Value::as_str);

    match (request.method.as_str(), target) {
        (SUBSCRIBE_METHOD, Some(resource)) => {
            debug!(resource, "Channel subscribed");
            subscriptions.lock().insert(resource.to_string());
            Response::ok(request.id, Value::Null)
        }
        (UNSUBSCRIBE_METHOD, Some(resource)) => {
            debug!(resource, "Channel unsubscribed");
            subscriptions.lock().remove(resource);
            Response::ok(request.id, Value::Null)
        }
        (SUBSCRIBE_METHOD | UNSUBSCRIBE_METHOD, None) => Response::err(
            request.id,
            ResponseError::for_resource("expected a resource name", BRIDGE_RESOURCE),
        ),
        _ => Response::err(
            request.id,
            ResponseError::for_resource("method not found", BRIDGE_RESOURCE),
        ),
    }
}

fn send_response(out_tx: &mpsc::Sender<Message>, response: Response) {
    let out_tx = out_tx.clone();
    tokio::spawn(async move {
        let _ = out_tx.send(Message::Response(response)).await;
    });
}
