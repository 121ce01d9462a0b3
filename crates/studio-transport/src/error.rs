//! Error types for the transport module.

use thiserror::Error;

use studio_ipc::ResponseError;

use crate::CodecError;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel was torn down with the call outstanding, or the call was
    /// made after teardown.
    #[error("channel closed")]
    ChannelClosed,

    /// The call's opt-in timeout elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The peer's dispatcher returned an error response.
    #[error("remote call failed: {0}")]
    Remote(ResponseError),

    /// Frame encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
