//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while interpreting envelope contents.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// The resource identifier string is not a valid name or name+args form.
    #[error("invalid resource identifier: {0}")]
    InvalidResourceId(String),

    /// Constructor arguments could not be deserialized.
    #[error("invalid constructor arguments: {0}")]
    InvalidArgs(String),
}
