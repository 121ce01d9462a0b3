//! Explicit service registry with memoized resource instances.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, trace};

use studio_ipc::ResourceId;

use crate::{RegistryError, Service, ServiceError};

/// Factory building a resource instance from constructor arguments.
pub type ServiceFactory =
    Box<dyn Fn(&[Value]) -> Result<Arc<dyn Service>, ServiceError> + Send + Sync>;

/// Owns the process-wide service graph.
///
/// Singletons are registered once at process bootstrap, so startup order is
/// deterministic. Stateful resource classes register a factory instead;
/// instances are built on first resolution and memoized by the full
/// identifier string (`name + JSON(args)`), so identical name+args always
/// resolve to the identical `Arc` and differing args yield distinct
/// instances.
pub struct ServiceRegistry {
    singletons: RwLock<HashMap<String, Arc<dyn Service>>>,
    factories: RwLock<HashMap<String, ServiceFactory>>,
    instances: Mutex<HashMap<String, Arc<dyn Service>>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            singletons: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Register a singleton service under its own name.
    pub fn register(&self, service: Arc<dyn Service>) {
        let name = service.name();
        debug!(service = name, "Registering service");
        self.singletons.write().insert(name.to_string(), service);
    }

    /// Register a factory for a resource class.
    pub fn register_factory<F>(&self, class: &str, factory: F)
    where
        F: Fn(&[Value]) -> Result<Arc<dyn Service>, ServiceError> + Send + Sync + 'static,
    {
        debug!(class, "Registering resource factory");
        self.factories
            .write()
            .insert(class.to_string(), Box::new(factory));
    }

    /// Resolve an identifier to a live service instance.
    pub fn resolve(&self, id: &ResourceId) -> Result<Arc<dyn Service>, RegistryError> {
        if !id.has_args() {
            return self
                .singletons
                .read()
                .get(id.name())
                .cloned()
                .ok_or_else(|| RegistryError::ServiceNotFound {
                    name: id.name().to_string(),
                });
        }

        let key = id.to_string();
        let mut instances = self.instances.lock();
        if let Some(instance) = instances.get(&key) {
            trace!(resource = %key, "Reusing memoized instance");
            return Ok(Arc::clone(instance));
        }

        let factories = self.factories.read();
        let factory = factories
            .get(id.name())
            .ok_or_else(|| RegistryError::ServiceNotFound {
                name: id.name().to_string(),
            })?;

        let args = id
            .args()
            .map_err(|e| RegistryError::Factory(e.to_string()))?;
        let instance = factory(&args).map_err(|e| RegistryError::Factory(e.to_string()))?;

        debug!(resource = %key, "Constructed resource instance");
        instances.insert(key, Arc::clone(&instance));
        Ok(instance)
    }

    /// Names of all registered singletons.
    pub fn service_names(&self) -> Vec<String> {
        self.singletons.read().keys().cloned().collect()
    }

    /// Number of memoized resource instances.
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Service for Echo {
        fn name(&self) -> &'static str {
            "Echo"
        }

        async fn call(&self, method: &str, args: &[Value]) -> Result<Value, ServiceError> {
            match method {
                "echo" => Ok(args.first().cloned().unwrap_or(Value::Null)),
                _ => Err(ServiceError::MethodNotFound),
            }
        }
    }

    struct Tagged;

    #[async_trait]
    impl Service for Tagged {
        fn name(&self) -> &'static str {
            "Tagged"
        }

        async fn call(&self, _method: &str, _args: &[Value]) -> Result<Value, ServiceError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_resolves_registered_singleton() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Echo));

        let id = ResourceId::service("Echo");
        assert!(registry.resolve(&id).is_ok());

        let unknown = ResourceId::service("Missing");
        let err = registry.resolve(&unknown).map(|_| ()).unwrap_err();
        assert_eq!(err.to_string(), "service not found");
    }

    #[test]
    fn test_memoizes_instances_by_full_identifier() {
        let registry = ServiceRegistry::new();
        registry.register_factory("Tagged", |_args| Ok(Arc::new(Tagged) as Arc<dyn Service>));

        let a = registry
            .resolve(&ResourceId::with_args("Tagged", &[json!("x")]))
            .unwrap();
        let b = registry
            .resolve(&ResourceId::with_args("Tagged", &[json!("x")]))
            .unwrap();
        let c = registry
            .resolve(&ResourceId::with_args("Tagged", &[json!("y")]))
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.instance_count(), 2);
    }

    #[test]
    fn test_factory_failure_surfaces_message() {
        let registry = ServiceRegistry::new();
        registry.register_factory("Tagged", |_args| {
            Err(ServiceError::invalid_args("expected a scene id"))
        });

        let err = registry
            .resolve(&ResourceId::with_args("Tagged", &[json!(1)]))
            .map(|_| ())
            .unwrap_err();
        assert!(err.to_string().contains("expected a scene id"));
    }
}
