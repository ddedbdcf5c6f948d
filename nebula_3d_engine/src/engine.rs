/// Nebula3D Engine - explicit context object owning all subsystems
///
/// The engine is a constructed value, not a singleton: `Engine::new` does
/// the initialize-once work (load the backend, create the initial heaps,
/// build the allocator, resource table and renderer state) and returns a
/// failure result instead of silently no-op-ing. Callers thread the engine
/// through their code and drop (or `shutdown`) it to tear everything down
/// in dependency order: resources first, then heaps, then the backend.

use glam::UVec2;

use crate::error::{Error, Result};
use crate::engine_info;
use crate::renderer::backend::{BackendConfig, BackendStats, HeapId, MemoryKind};
use crate::renderer::gpu_allocator::{DynamicGpuAllocator, PoolStats};
use crate::renderer::gpu_mesh::GpuMesh;
use crate::renderer::loader::{BackendLoader, BackendRegistry};
use crate::resource::geometry::MeshData;
use crate::resource::handle::Handle;
use crate::resource::resource_table::{BufferDesc, FramebufferDesc, ResourceTable, TextureDesc};
use crate::stage::renderer_state::{
    ComputePipelineDesc, RendererState, RenderPipelineDesc,
};
use crate::stage::stage::StageDesc;
use crate::utils::StringRegistry;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Name of the backend to load from the registry
    pub backend: String,
    /// Configuration forwarded to the backend
    pub backend_config: BackendConfig,
    /// Initial device-local heap size in bytes
    pub device_heap_size: u64,
    /// Initial upload heap size in bytes
    pub upload_heap_size: u64,
    /// Initial screen resolution
    pub resolution: UVec2,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: "headless".to_string(),
            backend_config: BackendConfig::default(),
            device_heap_size: 256 * 1024 * 1024,
            upload_heap_size: 64 * 1024 * 1024,
            resolution: UVec2::new(1280, 720),
        }
    }
}

/// Engine context owning the backend, GPU memory and all resource tables
pub struct Engine {
    config: EngineConfig,
    loader: BackendLoader,
    allocator: DynamicGpuAllocator,
    strings: StringRegistry,
    resources: ResourceTable,
    state: RendererState,
}

impl Engine {
    /// Boot the engine: load the backend, create the initial heaps and
    /// build the subsystems
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unregistered, its interface
    /// version mismatches, or the initial heaps cannot be created.
    pub fn new(config: EngineConfig, registry: BackendRegistry) -> Result<Engine> {
        let mut loader = BackendLoader::new(registry);
        loader.load(&config.backend, &config.backend_config)?;

        let mut allocator = DynamicGpuAllocator::new();
        {
            let backend = loader.active_mut().expect("backend just loaded");
            allocator.add_heap(backend, MemoryKind::Device, config.device_heap_size)?;
            allocator.add_heap(backend, MemoryKind::Upload, config.upload_heap_size)?;
        }

        let strings = StringRegistry::new();
        let resources = ResourceTable::new(config.resolution);
        let state = RendererState::new(config.backend_config.frames_in_flight);

        engine_info!("nebula3d::Engine",
            "engine up: backend '{}', {} MiB device / {} MiB upload, {}x{}",
            config.backend,
            config.device_heap_size / (1024 * 1024),
            config.upload_heap_size / (1024 * 1024),
            config.resolution.x, config.resolution.y);

        Ok(Self {
            config,
            loader,
            allocator,
            strings,
            resources,
            state,
        })
    }

    /// Whether a backend is loaded (false after `shutdown`)
    pub fn is_running(&self) -> bool {
        self.loader.is_loaded()
    }

    /// Statistics of the loaded backend
    pub fn backend_stats(&self) -> Option<BackendStats> {
        self.loader.active().map(|backend| backend.stats())
    }

    /// Statistics of one allocator pool
    pub fn memory_stats(&self, kind: MemoryKind) -> PoolStats {
        self.allocator.stats(kind)
    }

    // ===== RESOURCES =====

    /// The resource table (read access)
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Create a named buffer (see `ResourceTable::add_buffer`)
    pub fn add_buffer(&mut self, desc: &BufferDesc, allow_replace: bool) -> Result<Handle> {
        self.resources
            .add_buffer(desc, allow_replace, &mut self.strings, &mut self.allocator)
    }

    /// Create a named texture (see `ResourceTable::add_texture`)
    pub fn add_texture(&mut self, desc: &TextureDesc, allow_replace: bool) -> Result<Handle> {
        self.resources
            .add_texture(desc, allow_replace, &mut self.strings, &mut self.allocator)
    }

    /// Create a named framebuffer (see `ResourceTable::add_framebuffer`)
    pub fn add_framebuffer(&mut self, desc: &FramebufferDesc, allow_replace: bool) -> Result<Handle> {
        self.resources
            .add_framebuffer(desc, allow_replace, &mut self.strings, &mut self.allocator)
    }

    /// Destroy a named buffer; a no-op if absent
    pub fn remove_buffer(&mut self, name: &str) -> bool {
        self.resources.remove_buffer(name, &mut self.allocator)
    }

    /// Destroy a named texture; a no-op if absent
    pub fn remove_texture(&mut self, name: &str) -> bool {
        self.resources.remove_texture(name, &mut self.allocator)
    }

    /// Destroy a named framebuffer; a no-op if absent
    pub fn remove_framebuffer(&mut self, name: &str) -> bool {
        self.resources.remove_framebuffer(name, &mut self.allocator)
    }

    /// Recreate resolution-dependent resources at a new resolution
    ///
    /// Call exactly once per detected size change.
    pub fn update_resolution(&mut self, new_resolution: UVec2) -> Result<()> {
        self.resources
            .update_resolution(new_resolution, &mut self.allocator)
    }

    // ===== GPU MESHES =====

    /// Allocate and upload a mesh (blocking initial-load path)
    pub fn create_gpu_mesh(&mut self, name: &str, mesh: &MeshData) -> Result<GpuMesh> {
        let tag = self.strings.intern(name)?;
        let mut gpu_mesh = GpuMesh::allocate(mesh, tag, &mut self.allocator)?;
        let backend = self
            .loader
            .active_mut()
            .ok_or_else(|| Error::InitializationFailed("no backend loaded".to_string()))?;
        match gpu_mesh.upload_blocking(mesh, &mut self.allocator, backend) {
            Ok(()) => Ok(gpu_mesh),
            Err(err) => {
                gpu_mesh.deallocate(&mut self.allocator);
                Err(err)
            }
        }
    }

    /// Release a mesh's GPU regions (idempotent)
    pub fn destroy_gpu_mesh(&mut self, mesh: &mut GpuMesh) {
        mesh.deallocate(&mut self.allocator);
    }

    // ===== RENDERER STATE =====

    /// The stage/pipeline state (read access)
    pub fn renderer_state(&self) -> &RendererState {
        &self.state
    }

    /// Register a render pipeline
    pub fn register_render_pipeline(&mut self, desc: RenderPipelineDesc) -> Result<()> {
        self.state.register_render_pipeline(desc, &mut self.strings)
    }

    /// Register a compute pipeline
    pub fn register_compute_pipeline(&mut self, desc: ComputePipelineDesc) -> Result<()> {
        self.state.register_compute_pipeline(desc, &mut self.strings)
    }

    /// Remove a render pipeline by name; a no-op if absent
    pub fn remove_render_pipeline(&mut self, name: &str) -> bool {
        self.state.remove_render_pipeline(name)
    }

    /// Remove a compute pipeline by name; a no-op if absent
    pub fn remove_compute_pipeline(&mut self, name: &str) -> bool {
        self.state.remove_compute_pipeline(name)
    }

    /// Append a stage to the execution list
    pub fn add_stage(&mut self, desc: &StageDesc) -> Result<()> {
        self.state.add_stage(desc, &mut self.strings, &mut self.allocator)
    }

    /// Insert a stage at a position
    pub fn insert_stage(&mut self, at: usize, desc: &StageDesc) -> Result<()> {
        self.state
            .insert_stage(at, desc, &mut self.strings, &mut self.allocator)
    }

    /// Remove a stage by position
    pub fn remove_stage(&mut self, at: usize) -> Result<()> {
        self.state.remove_stage(at, &mut self.allocator)
    }

    /// Move a stage to a new position
    pub fn move_stage(&mut self, from: usize, to: usize) -> Result<()> {
        self.state.move_stage(from, to)
    }

    /// Move the sweep past the next barrier
    pub fn proceed_past_barrier(&mut self) -> Result<()> {
        self.state.proceed_past_barrier()
    }

    /// Start a new frame (advances the per-frame rotation exactly once)
    pub fn begin_frame(&mut self) -> Result<()> {
        self.state.begin_frame()
    }

    /// Enable constant buffer input for a stage in the active segment
    pub fn begin_stage_input(&mut self, name: &str) -> Result<()> {
        self.state.begin_stage_input(name)
    }

    /// Write constant buffer data for a register of the input stage
    ///
    /// Returns `Ok(false)` when the register is not bound (not an error).
    pub fn set_constant_buffer(&mut self, shader_register: u32, data: &[u8]) -> Result<bool> {
        let Some(backend) = self.loader.active_mut() else {
            return Err(Error::InitializationFailed("no backend loaded".to_string()));
        };
        self.state.set_constant_buffer(shader_register, data, backend)
    }

    /// Disable constant buffer input
    pub fn end_stage_input(&mut self) -> Result<()> {
        self.state.end_stage_input()
    }

    // ===== MEMORY / BACKEND LIFECYCLE =====

    /// Grow a memory pool by one heap
    pub fn grow_heap(&mut self, kind: MemoryKind, capacity: u64) -> Result<HeapId> {
        let Some(backend) = self.loader.active_mut() else {
            return Err(Error::InitializationFailed("no backend loaded".to_string()));
        };
        self.allocator.add_heap(backend, kind, capacity)
    }

    /// Swap to a different backend at runtime
    ///
    /// All resources, stages and heaps are torn down first - the resource
    /// table must not outlive the backend that created its allocations -
    /// then the old backend is unloaded, the new one is loaded
    /// (version-checked) and fresh heaps are created.
    pub fn swap_backend(&mut self, name: &str) -> Result<()> {
        self.resources.clear(&mut self.allocator);
        self.state.clear(&mut self.allocator);
        if let Some(backend) = self.loader.active_mut() {
            self.allocator.release_heaps(backend);
        }

        self.config.backend = name.to_string();
        self.loader.load(name, &self.config.backend_config)?;

        let backend = self.loader.active_mut().expect("backend just loaded");
        self.allocator
            .add_heap(backend, MemoryKind::Device, self.config.device_heap_size)?;
        self.allocator
            .add_heap(backend, MemoryKind::Upload, self.config.upload_heap_size)?;
        Ok(())
    }

    /// Tear everything down in dependency order
    ///
    /// Resources and stages release their allocations, heaps are destroyed,
    /// then the backend is unloaded. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if !self.loader.is_loaded() {
            return;
        }
        self.resources.clear(&mut self.allocator);
        self.state.clear(&mut self.allocator);
        if let Some(backend) = self.loader.active_mut() {
            self.allocator.release_heaps(backend);
        }
        self.loader.unload();
        engine_info!("nebula3d::Engine", "engine shut down");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
