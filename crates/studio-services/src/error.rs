//! Error types for service resolution and invocation.

use thiserror::Error;

/// Errors produced by a service handler.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service has no method with the requested name.
    #[error("method not found")]
    MethodNotFound,

    /// The call arguments could not be decoded.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The handler ran and failed.
    #[error("{0}")]
    Failed(String),
}

impl ServiceError {
    /// Business failure with the given message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Argument decoding failure with the given message.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }
}

/// Errors produced while resolving a resource identifier.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No singleton or factory is registered under the requested name.
    #[error("service not found")]
    ServiceNotFound { name: String },

    /// A resource factory rejected the constructor arguments.
    #[error("{0}")]
    Factory(String),
}
