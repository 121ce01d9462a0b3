//! Scene collection service and per-scene resources.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, info};

use studio_sync::CriticalSection;

use super::{string_field, Service, ServiceError};
use crate::EventHub;

/// Shared scene collection state behind [`ScenesService`] and [`Scene`].
pub(super) struct SceneStore {
    inner: RwLock<StoreInner>,
}

struct StoreInner {
    scenes: Vec<SceneRecord>,
    active: Option<String>,
    next_id: u64,
}

#[derive(Clone)]
struct SceneRecord {
    id: String,
    name: String,
}

impl SceneStore {
    /// Create a store seeded with the default scene pair.
    pub(super) fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                scenes: vec![
                    SceneRecord {
                        id: "scene-1".to_string(),
                        name: "Scene 1".to_string(),
                    },
                    SceneRecord {
                        id: "scene-2".to_string(),
                        name: "Scene 2".to_string(),
                    },
                ],
                active: Some("scene-1".to_string()),
                next_id: 3,
            }),
        }
    }

    fn names(&self) -> Vec<String> {
        self.inner.read().scenes.iter().map(|s| s.name.clone()).collect()
    }

    fn ids(&self) -> Vec<String> {
        self.inner.read().scenes.iter().map(|s| s.id.clone()).collect()
    }

    fn active_id(&self) -> Option<String> {
        self.inner.read().active.clone()
    }

    fn name_of(&self, id: &str) -> Option<String> {
        self.inner
            .read()
            .scenes
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
    }

    fn add(&self, name: String) -> String {
        let mut inner = self.inner.write();
        let id = format!("scene-{}", inner.next_id);
        inner.next_id += 1;
        inner.scenes.push(SceneRecord {
            id: id.clone(),
            name,
        });
        id
    }

    /// Remove a scene. Returns the new active scene id when the removal
    /// changed which scene is active.
    fn remove(&self, id: &str) -> Result<Option<Option<String>>, ServiceError> {
        let mut inner = self.inner.write();
        let index = inner
            .scenes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ServiceError::failed("scene not found"))?;
        inner.scenes.remove(index);

        if inner.active.as_deref() == Some(id) {
            // The active scene went away; fall back to the first remaining.
            let fallback = inner.scenes.first().map(|s| s.id.clone());
            inner.active = fallback.clone();
            Ok(Some(fallback))
        } else {
            Ok(None)
        }
    }

    /// Make a scene active. Returns true if the active scene changed.
    fn set_active(&self, id: &str) -> Result<bool, ServiceError> {
        let mut inner = self.inner.write();
        if !inner.scenes.iter().any(|s| s.id == id) {
            return Err(ServiceError::failed("scene not found"));
        }
        if inner.active.as_deref() == Some(id) {
            return Ok(false);
        }
        inner.active = Some(id.to_string());
        Ok(true)
    }

    fn rename(&self, id: &str, name: String) -> Result<(), ServiceError> {
        let mut inner = self.inner.write();
        let scene = inner
            .scenes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ServiceError::failed("scene not found"))?;
        scene.name = name;
        Ok(())
    }
}

/// The scene collection singleton.
///
/// Mutations run through a [`CriticalSection`] so concurrent window requests
/// apply in strict arrival order, and each mutation emits its event after
/// the state change.
pub struct ScenesService {
    store: Arc<SceneStore>,
    events: Arc<EventHub>,
    section: CriticalSection,
}

impl ScenesService {
    pub(super) fn new(store: Arc<SceneStore>, events: Arc<EventHub>) -> Self {
        Self {
            store,
            events,
            section: CriticalSection::new(),
        }
    }
}

#[async_trait]
impl Service for ScenesService {
    fn name(&self) -> &'static str {
        "ScenesService"
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value, ServiceError> {
        match method {
            "getScenes" => Ok(json!(self.store.names())),
            "getSceneIds" => Ok(json!(self.store.ids())),
            "activeSceneId" => Ok(json!(self.store.active_id())),
            "createScene" => {
                let name = string_field(args, "name")?;
                self.section
                    .guard(|| async {
                        let id = self.store.add(name.clone());
                        info!(scene = %id, name = %name, "Scene created");
                        self.events
                            .emit(self.name(), "sceneAdded", json!({ "id": id, "name": name }));
                        Ok(json!({ "id": id, "name": name }))
                    })
                    .await
            }
            "removeScene" => {
                let id = string_field(args, "id")?;
                self.section
                    .guard(|| async {
                        let active_change = self.store.remove(&id)?;
                        info!(scene = %id, "Scene removed");
                        self.events.emit(self.name(), "sceneRemoved", json!({ "id": id }));
                        if let Some(fallback) = active_change {
                            debug!(scene = ?fallback, "Active scene fell back");
                            self.events
                                .emit(self.name(), "sceneSwitched", json!({ "id": fallback }));
                        }
                        Ok(Value::Null)
                    })
                    .await
            }
            "makeSceneActive" => {
                let id = string_field(args, "id")?;
                self.section
                    .guard(|| async {
                        if self.store.set_active(&id)? {
                            self.events
                                .emit(self.name(), "sceneSwitched", json!({ "id": id }));
                        }
                        Ok(Value::Null)
                    })
                    .await
            }
            _ => Err(ServiceError::MethodNotFound),
        }
    }
}

/// A single addressable scene, resolved as `Scene["<scene-id>"]`.
pub struct Scene {
    scene_id: String,
    store: Arc<SceneStore>,
    events: Arc<EventHub>,
}

impl Scene {
    pub(super) fn new(scene_id: String, store: Arc<SceneStore>, events: Arc<EventHub>) -> Self {
        Self {
            scene_id,
            store,
            events,
        }
    }
}

#[async_trait]
impl Service for Scene {
    fn name(&self) -> &'static str {
        "Scene"
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value, ServiceError> {
        match method {
            "getId" => Ok(json!(self.scene_id)),
            "getName" => self
                .store
                .name_of(&self.scene_id)
                .map(|name| json!(name))
                .ok_or_else(|| ServiceError::failed("scene not found")),
            "rename" => {
                let name = string_field(args, "name")?;
                self.store.rename(&self.scene_id, name.clone())?;
                self.events.emit(
                    "ScenesService",
                    "sceneRenamed",
                    json!({ "id": self.scene_id, "name": name }),
                );
                Ok(Value::Null)
            }
            _ => Err(ServiceError::MethodNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (ScenesService, Arc<EventHub>, Arc<SceneStore>) {
        let store = Arc::new(SceneStore::new());
        let events = Arc::new(EventHub::new());
        let service = ScenesService::new(Arc::clone(&store), Arc::clone(&events));
        (service, events, store)
    }

    #[tokio::test]
    async fn test_seeded_scenes() {
        let (service, _events, _store) = service();

        let names = service.call("getScenes", &[]).await.unwrap();
        assert_eq!(names, json!(["Scene 1", "Scene 2"]));

        let active = service.call("activeSceneId", &[]).await.unwrap();
        assert_eq!(active, json!("scene-1"));
    }

    #[tokio::test]
    async fn test_create_scene_emits_event() {
        let (service, events, _store) = service();
        let mut rx = events.subscribe();

        let created = service
            .call("createScene", &[json!({ "name": "Intro" })])
            .await
            .unwrap();
        assert_eq!(created, json!({ "id": "scene-3", "name": "Intro" }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "sceneAdded");
        assert_eq!(event.data, json!({ "id": "scene-3", "name": "Intro" }));
    }

    #[tokio::test]
    async fn test_removing_active_scene_falls_back() {
        let (service, events, _store) = service();
        let mut rx = events.subscribe();

        service
            .call("removeScene", &[json!({ "id": "scene-1" })])
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().event, "sceneRemoved");
        let switched = rx.recv().await.unwrap();
        assert_eq!(switched.event, "sceneSwitched");
        assert_eq!(switched.data, json!({ "id": "scene-2" }));

        let active = service.call("activeSceneId", &[]).await.unwrap();
        assert_eq!(active, json!("scene-2"));
    }

    #[tokio::test]
    async fn test_remove_unknown_scene_fails() {
        let (service, _events, _store) = service();

        let err = service
            .call("removeScene", &[json!({ "id": "scene-9" })])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "scene not found");
    }

    #[tokio::test]
    async fn test_scene_resource_rename() {
        let (service, events, store) = service();
        let scene = Scene::new("scene-2".to_string(), store, Arc::clone(&events));
        let mut rx = events.subscribe();

        scene
            .call("rename", &[json!({ "name": "Outro" })])
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.resource, "ScenesService");
        assert_eq!(event.event, "sceneRenamed");

        let names = service.call("getScenes", &[]).await.unwrap();
        assert_eq!(names, json!(["Scene 1", "Outro"]));
    }

    #[tokio::test]
    async fn test_removed_scene_resource_fails() {
        let (service, events, store) = service();
        let scene = Scene::new("scene-2".to_string(), store, events);

        service
            .call("removeScene", &[json!({ "id": "scene-2" })])
            .await
            .unwrap();

        let err = scene.call("getName", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "scene not found");
    }
}
