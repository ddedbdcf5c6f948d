/// Backend registry and loader
///
/// Backends register a factory under a name; the loader instantiates one,
/// negotiates the interface version and initializes it. Loading a backend
/// while another is active fully unloads the old one first (deinit + drop),
/// so no GPU resources owned by the old backend survive the swap.
///
/// The registry is an explicit value handed to the loader; there is no
/// global plugin table.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::{engine_error, engine_info};
use crate::renderer::backend::{
    BackendConfig, RenderBackend, RENDER_BACKEND_INTERFACE_VERSION,
};

/// Factory creating an uninitialized backend instance
pub type BackendFactory = Box<dyn Fn(&BackendConfig) -> Result<Box<dyn RenderBackend>> + Send + Sync>;

/// Registry of backend factories, keyed by backend name
pub struct BackendRegistry {
    factories: FxHashMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Register a backend factory
    ///
    /// # Arguments
    ///
    /// * `name` - Backend name (e.g., "headless", "vulkan")
    /// * `factory` - Factory creating an uninitialized backend
    pub fn register<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn(&BackendConfig) -> Result<Box<dyn RenderBackend>> + Send + Sync + 'static,
    {
        self.factories.insert(name, Box::new(factory));
    }

    /// Whether a backend name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    fn create(&self, name: &str, config: &BackendConfig) -> Result<Box<dyn RenderBackend>> {
        self.factories
            .get(name)
            .ok_or_else(|| {
                Error::InitializationFailed(format!("backend '{}' not registered", name))
            })?(config)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Loader owning at most one active backend.
///
/// State machine: Unloaded -> `load` -> Loaded (version-checked,
/// initialized) -> `unload`/drop -> Unloaded.
pub struct BackendLoader {
    registry: BackendRegistry,
    active: Option<Box<dyn RenderBackend>>,
}

impl BackendLoader {
    /// Create a loader over a registry
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            active: None,
        }
    }

    /// Load and initialize a backend by name
    ///
    /// The interface version is checked before any other backend call; a
    /// mismatch aborts the load. An already-active backend is fully
    /// unloaded first.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unregistered, the interface version
    /// differs from `RENDER_BACKEND_INTERFACE_VERSION`, or `init` fails.
    pub fn load(&mut self, name: &str, config: &BackendConfig) -> Result<()> {
        self.unload();

        let mut backend = match self.registry.create(name, config) {
            Ok(backend) => backend,
            Err(err) => {
                engine_error!("nebula3d::BackendLoader",
                    "failed to create backend '{}': {}", name, err);
                return Err(err);
            }
        };

        // Version negotiation happens before init or any resource call.
        let found = backend.interface_version();
        if found != RENDER_BACKEND_INTERFACE_VERSION {
            engine_error!("nebula3d::BackendLoader",
                "backend '{}' has interface version {}, engine expects {}",
                name, found, RENDER_BACKEND_INTERFACE_VERSION);
            return Err(Error::VersionMismatch {
                expected: RENDER_BACKEND_INTERFACE_VERSION,
                found,
            });
        }

        backend.init(config)?;
        engine_info!("nebula3d::BackendLoader",
            "loaded backend '{}' (interface version {})", name, found);
        self.active = Some(backend);
        Ok(())
    }

    /// Deinitialize and drop the active backend, if any
    pub fn unload(&mut self) {
        if let Some(mut backend) = self.active.take() {
            engine_info!("nebula3d::BackendLoader", "unloading backend '{}'", backend.name());
            backend.deinit();
        }
    }

    /// Whether a backend is currently loaded
    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    /// The active backend
    pub fn active(&self) -> Option<&dyn RenderBackend> {
        self.active.as_deref()
    }

    /// The active backend, mutably
    pub fn active_mut(&mut self) -> Option<&mut (dyn RenderBackend + 'static)> {
        self.active.as_deref_mut()
    }

    /// The registry this loader selects backends from
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }
}

impl Drop for BackendLoader {
    fn drop(&mut self) {
        self.unload();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
