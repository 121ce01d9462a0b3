//! Framed IPC transport between UI windows and the worker process.
//!
//! The worker runs an [`IpcServer`] multiplexing one channel per window
//! against a single dispatcher and event hub; each window runs an
//! [`IpcClient`]. Envelopes cross the channel as length-prefixed JSON
//! frames, responses are correlated to requests by id, and service events
//! are fanned out to the channels subscribed to their resource.

mod channel;
mod client;
mod codec;
mod error;
mod pending;
mod server;

pub use channel::ChannelState;
pub use client::IpcClient;
pub use codec::{CodecError, EnvelopeCodec};
pub use error::TransportError;
pub use pending::PendingCalls;
pub use server::IpcServer;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Maximum size of one encoded frame.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Capacity of a channel's outbound message queue.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;
