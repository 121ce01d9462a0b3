//! The external facade delegating allowed calls to the internal dispatcher.

use std::sync::Arc;

use tracing::{debug, trace};

use studio_ipc::{Request, Response, ResponseError, ResourceId};
use studio_services::Dispatcher;

use crate::{ApiVersion, CostLedger, MethodSurface};

/// Serves external consumers a reduced view of the internal services.
///
/// Envelope shape is identical to the internal API; only the allowed method
/// set is narrower. Allowed calls are cost-recorded, then delegated
/// verbatim to the internal dispatcher.
pub struct ExternalApi {
    surface: MethodSurface,
    ledger: CostLedger,
    dispatcher: Arc<Dispatcher>,
}

impl ExternalApi {
    /// Create a facade over the internal dispatcher with the given surface.
    pub fn new(surface: MethodSurface, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            surface,
            ledger: CostLedger::new(),
            dispatcher,
        }
    }

    /// Create the v1 facade.
    pub fn v1(dispatcher: Arc<Dispatcher>) -> Self {
        Self::new(MethodSurface::v1(), dispatcher)
    }

    /// Execute one external request.
    pub async fn handle(&self, request: Request) -> Response {
        // The surface is keyed by resource class, so an instance id like
        // `Scene["scene-1"]` is checked under `Scene`.
        let class = match ResourceId::parse(&request.params.resource) {
            Ok(id) => id.name().to_string(),
            Err(e) => {
                return Response::err(
                    request.id,
                    ResponseError::for_resource(e.to_string(), &request.params.resource),
                );
            }
        };

        let Some(cost_class) = self.surface.cost_of(&class, &request.method) else {
            debug!(resource = %request.params.resource, method = %request.method, "Rejecting external call");
            return Response::err(
                request.id,
                ResponseError::for_resource(
                    "method not allowed for external API",
                    &request.params.resource,
                ),
            );
        };

        self.ledger.record(cost_class.cost());
        trace!(
            resource = %request.params.resource,
            method = %request.method,
            cost = cost_class.cost(),
            "Delegating external call"
        );

        self.dispatcher.dispatch(&request).await
    }

    /// Execute a batch, preserving request order in the responses.
    pub async fn handle_batch(&self, requests: Vec<Request>) -> Vec<Response> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(self.handle(request).await);
        }
        responses
    }

    /// The facade's cost ledger.
    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    /// The surface version being served.
    pub fn version(&self) -> ApiVersion {
        self.surface.version()
    }
}
