//! The trait every addressable service implements.

use async_trait::async_trait;
use serde_json::Value;

use crate::ServiceError;

/// A unit of business logic addressable over the bridge.
///
/// Implementations dispatch `method` through an explicit match over their
/// known method names and return [`ServiceError::MethodNotFound`] for
/// anything else. Services own their state and mutate it only through their
/// own methods.
#[async_trait]
pub trait Service: Send + Sync {
    /// Service or resource class name used in resource identifiers.
    fn name(&self) -> &'static str;

    /// Invoke a method with JSON-decoded arguments.
    async fn call(&self, method: &str, args: &[Value]) -> Result<Value, ServiceError>;
}
