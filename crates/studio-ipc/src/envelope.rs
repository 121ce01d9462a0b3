//! Request, response, and event envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PROTOCOL_VERSION;

/// A call addressed to a service or resource on the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version, always [`PROTOCOL_VERSION`].
    pub jsonrpc: String,

    /// Call identifier, unique among in-flight requests from one origin.
    pub id: u64,

    /// Method name to invoke on the target.
    pub method: String,

    /// Target resource and call arguments.
    pub params: RequestParams,
}

/// Parameters of a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Resource identifier string (service name, or class name plus
    /// serialized constructor arguments).
    pub resource: String,

    /// JSON-serializable call arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    /// Create a request envelope for the given target.
    pub fn new(id: u64, resource: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            id,
            method: method.into(),
            params: RequestParams {
                resource: resource.into(),
                args,
            },
        }
    }
}

/// The reply to a single request, correlated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Identifier of the originating request.
    pub id: u64,

    /// Result or error payload.
    #[serde(flatten)]
    pub outcome: ResponseOutcome,
}

/// Exactly one of `result` or `error` is present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseOutcome {
    /// The call succeeded.
    Success {
        /// Serialized return value (JSON null for void methods).
        result: Value,
    },

    /// The call failed at resolution or inside the handler.
    Failure {
        /// Structured failure description.
        error: ResponseError,
    },
}

/// Structured error carried by a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Human-readable failure message.
    pub message: String,

    /// Originating service or resource name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl ResponseError {
    /// Create an error with no originating resource.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource: None,
        }
    }

    /// Create an error attributed to a resource.
    pub fn for_resource(message: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource: Some(resource.into()),
        }
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "{} ({})", self.message, resource),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Response {
    /// Successful response carrying a result value.
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Success { result },
        }
    }

    /// Failed response carrying a structured error.
    pub fn err(id: u64, error: ResponseError) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Failure { error },
        }
    }

    /// Returns true if this response carries a result.
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Success { .. })
    }

    /// Convert into the call's outcome.
    pub fn into_result(self) -> Result<Value, ResponseError> {
        match self.outcome {
            ResponseOutcome::Success { result } => Ok(result),
            ResponseOutcome::Failure { error } => Err(error),
        }
    }
}

/// Unsolicited notification broadcast to subscribed windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Emitting service or resource name.
    pub resource: String,

    /// Event name within that resource.
    pub event: String,

    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl Event {
    /// Create an event envelope.
    pub fn new(resource: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
        Self {
            resource: resource.into(),
            event: event.into(),
            data,
        }
    }
}

/// Any envelope that can cross the channel.
///
/// Decoding is structural: requests carry `method` + `params`, events carry
/// `resource` + `event`, responses carry `id` with `result` or `error`. The
/// variant order matters for untagged deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// A call from the peer.
    Request(Request),

    /// An unsolicited event.
    Event(Event),

    /// The reply to an earlier call.
    Response(Response),
}
