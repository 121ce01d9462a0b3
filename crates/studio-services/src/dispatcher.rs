//! Request-to-response dispatch against the live service registry.

use std::sync::Arc;

use tracing::{debug, instrument};

use studio_ipc::{Request, Response, ResponseError, ResourceId};

use crate::ServiceRegistry;

/// Resolves request envelopes and invokes the target service method.
///
/// `dispatch` is total: resolution failures and handler failures become
/// error responses, never panics or `Err` values, and the response id always
/// equals the request id. A failing call leaves the dispatcher fully
/// serviceable for subsequent requests.
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over the given registry.
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher resolves against.
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Execute one request and produce its response.
    #[instrument(name = "dispatch", skip(self, request), fields(id = request.id, resource = %request.params.resource, method = %request.method))]
    pub async fn dispatch(&self, request: &Request) -> Response {
        let resource = &request.params.resource;

        let id = match ResourceId::parse(resource) {
            Ok(id) => id,
            Err(e) => {
                debug!(error = %e, "Rejecting malformed resource identifier");
                return Response::err(
                    request.id,
                    ResponseError::for_resource(e.to_string(), resource),
                );
            }
        };

        let service = match self.registry.resolve(&id) {
            Ok(service) => service,
            Err(e) => {
                debug!(error = %e, "Resolution failed");
                return Response::err(
                    request.id,
                    ResponseError::for_resource(e.to_string(), resource),
                );
            }
        };

        match service.call(&request.method, &request.params.args).await {
            Ok(result) => Response::ok(request.id, result),
            Err(e) => {
                debug!(error = %e, "Handler failed");
                Response::err(
                    request.id,
                    ResponseError::for_resource(e.to_string(), resource),
                )
            }
        }
    }
}
