//! Built-in studio services wired at process bootstrap.

mod audio;
mod scenes;
mod streaming;

use std::sync::Arc;

use serde_json::Value;

use crate::{EventHub, Service, ServiceError, ServiceRegistry};

pub use audio::AudioService;
pub use scenes::{Scene, ScenesService};
pub use streaming::{StreamStatus, StreamingService};

use scenes::SceneStore;

/// Build the registry holding the built-in service graph.
///
/// Singletons are registered here, once, in a fixed order; the `Scene`
/// resource class registers its factory for lazy per-instance construction.
/// Dependencies arrive through constructors.
pub fn builtin_registry(events: &Arc<EventHub>) -> Arc<ServiceRegistry> {
    let registry = Arc::new(ServiceRegistry::new());
    let store = Arc::new(SceneStore::new());

    registry.register(Arc::new(ScenesService::new(
        Arc::clone(&store),
        Arc::clone(events),
    )));
    registry.register(Arc::new(StreamingService::new(Arc::clone(events))));
    registry.register(Arc::new(AudioService::new(Arc::clone(events))));

    let scene_events = Arc::clone(events);
    registry.register_factory("Scene", move |args| {
        let id = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::invalid_args("expected a scene id"))?;
        Ok(Arc::new(Scene::new(
            id.to_string(),
            Arc::clone(&store),
            Arc::clone(&scene_events),
        )) as Arc<dyn Service>)
    });

    registry
}

/// Decode a named string field from the call's first object argument.
fn string_field(args: &[Value], field: &str) -> Result<String, ServiceError> {
    object_field(args, field)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ServiceError::invalid_args(format!("field '{field}' must be a string")))
}

/// Decode a named number field from the call's first object argument.
fn f64_field(args: &[Value], field: &str) -> Result<f64, ServiceError> {
    object_field(args, field)?
        .as_f64()
        .ok_or_else(|| ServiceError::invalid_args(format!("field '{field}' must be a number")))
}

/// Decode a named boolean field from the call's first object argument.
fn bool_field(args: &[Value], field: &str) -> Result<bool, ServiceError> {
    object_field(args, field)?
        .as_bool()
        .ok_or_else(|| ServiceError::invalid_args(format!("field '{field}' must be a boolean")))
}

fn object_field<'a>(args: &'a [Value], field: &str) -> Result<&'a Value, ServiceError> {
    args.first()
        .and_then(Value::as_object)
        .ok_or_else(|| ServiceError::invalid_args("expected an object argument"))?
        .get(field)
        .ok_or_else(|| ServiceError::invalid_args(format!("missing field '{field}'")))
}
