//! Typed window<->worker envelopes for the studio bridge.
//!
//! This crate defines the JSON-RPC-style message shapes that cross the
//! boundary between UI windows and the worker process: requests, responses,
//! events, and the resource identifiers that address services and stateful
//! objects on the worker side.

mod envelope;
mod error;
mod resource;

pub use envelope::{Event, Message, Request, RequestParams, Response, ResponseError, ResponseOutcome};
pub use error::ProtocolError;
pub use resource::ResourceId;

/// Protocol version carried in every request envelope.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Reserved resource name for bridge-level operations (readiness, event
/// subscriptions). Never resolvable through the service registry.
pub const BRIDGE_RESOURCE: &str = "IpcBridge";

/// Bridge method that subscribes the calling channel to a resource's events.
pub const SUBSCRIBE_METHOD: &str = "subscribe";

/// Bridge method that removes a channel's subscription to a resource.
pub const UNSUBSCRIBE_METHOD: &str = "unsubscribe";

/// Bridge event announcing that a channel is ready to serve requests.
pub const READY_EVENT: &str = "ready";
