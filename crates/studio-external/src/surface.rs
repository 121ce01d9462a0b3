//! The versioned method surface exposed to external consumers.

use std::collections::HashMap;

/// Version of the external method surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// The initial surface.
    V1,
}

impl ApiVersion {
    /// Wire name of this version.
    pub fn name(self) -> &'static str {
        match self {
            Self::V1 => "v1",
        }
    }
}

/// Cost classification for throttling bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostClass {
    /// Trivial reads.
    Free,

    /// Cheap reads.
    Cheap,

    /// Ordinary mutations.
    Normal,

    /// Heavyweight operations.
    Expensive,
}

impl CostClass {
    /// Fixed per-call cost of this class.
    pub fn cost(self) -> u32 {
        match self {
            Self::Free => 0,
            Self::Cheap => 1,
            Self::Normal => 5,
            Self::Expensive => 25,
        }
    }
}

/// The allowlist of (resource class, method) pairs an external consumer may
/// call, each decorated with its cost class.
pub struct MethodSurface {
    version: ApiVersion,
    methods: HashMap<(String, String), CostClass>,
}

impl MethodSurface {
    /// An empty surface at the given version.
    pub fn new(version: ApiVersion) -> Self {
        Self {
            version,
            methods: HashMap::new(),
        }
    }

    /// The v1 surface: studio reads plus scene, streaming, and audio
    /// mutations.
    pub fn v1() -> Self {
        let mut surface = Self::new(ApiVersion::V1);

        surface.allow("ScenesService", "getScenes", CostClass::Cheap);
        surface.allow("ScenesService", "getSceneIds", CostClass::Cheap);
        surface.allow("ScenesService", "activeSceneId", CostClass::Free);
        surface.allow("ScenesService", "createScene", CostClass::Normal);
        surface.allow("ScenesService", "removeScene", CostClass::Normal);
        surface.allow("ScenesService", "makeSceneActive", CostClass::Normal);

        surface.allow("Scene", "getId", CostClass::Free);
        surface.allow("Scene", "getName", CostClass::Free);
        surface.allow("Scene", "rename", CostClass::Normal);

        surface.allow("StreamingService", "getStatus", CostClass::Free);
        surface.allow("StreamingService", "startStreaming", CostClass::Expensive);
        surface.allow("StreamingService", "stopStreaming", CostClass::Expensive);

        surface.allow("AudioService", "getInputs", CostClass::Cheap);
        surface.allow("AudioService", "setVolume", CostClass::Normal);
        surface.allow("AudioService", "setMuted", CostClass::Normal);

        surface
    }

    /// Allow a method on a resource class.
    pub fn allow(&mut self, resource: &str, method: &str, class: CostClass) {
        self.methods
            .insert((resource.to_string(), method.to_string()), class);
    }

    /// Cost class of an allowed method, or `None` if it is outside the
    /// surface.
    pub fn cost_of(&self, resource: &str, method: &str) -> Option<CostClass> {
        self.methods
            .get(&(resource.to_string(), method.to_string()))
            .copied()
    }

    /// The surface's version.
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Number of allowed methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns true if nothing is allowed.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
