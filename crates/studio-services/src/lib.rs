//! Service registry and request dispatch for the studio bridge.
//!
//! This crate holds the worker-process side of the bridge: the [`Service`]
//! trait every service implements, the [`ServiceRegistry`] that owns the
//! singletons and resource factories, the [`Dispatcher`] that turns request
//! envelopes into response envelopes, the [`EventHub`] that fans service
//! mutations out to the transports, and the built-in studio services.

mod dispatcher;
mod error;
mod events;
mod registry;
mod service;
mod services;

pub use dispatcher::Dispatcher;
pub use error::{RegistryError, ServiceError};
pub use events::EventHub;
pub use registry::ServiceRegistry;
pub use service::Service;
pub use services::{builtin_registry, AudioService, Scene, ScenesService, StreamStatus, StreamingService};

/// Capacity of the service event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
