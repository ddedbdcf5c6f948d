/// Render backend trait - the versioned interface every backend implements
///
/// Backends (headless, Vulkan, ...) are concrete types behind this trait,
/// created through a `BackendRegistry` factory and driven by the
/// `BackendLoader`. The loader negotiates `interface_version()` against
/// `RENDER_BACKEND_INTERFACE_VERSION` before calling anything else, so an
/// incompatible backend fails at load time rather than at first use.

use crate::error::Result;

/// Interface version the engine is compiled against.
///
/// A backend whose `interface_version()` differs is rejected by the loader.
pub const RENDER_BACKEND_INTERFACE_VERSION: u32 = 3;

/// Backend-assigned identifier of a GPU memory heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(pub u32);

/// Kind of GPU memory backing a heap.
///
/// Upload memory is CPU-visible staging/constant memory; device memory is
/// GPU-only. The two have different bandwidth/latency tradeoffs and are
/// pooled separately by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// CPU-visible, written by `write_heap`
    Upload,
    /// Device-local, populated through the copy queue
    Device,
}

/// Backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Frames in flight (per-frame resource slot count)
    pub frames_in_flight: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Nebula3D Application".to_string(),
            app_version: (1, 0, 0),
            frames_in_flight: 2,
        }
    }
}

/// Backend statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Number of live heaps
    pub heap_count: u32,
    /// Total bytes across live heaps
    pub heap_bytes: u64,
    /// Copy batches submitted since init
    pub copy_submissions: u64,
    /// Times `init` actually built backend state (idempotent re-inits do
    /// not count)
    pub init_count: u32,
}

/// One copy-queue transfer between heaps
#[derive(Debug, Clone, Copy)]
pub struct CopyRegion {
    pub src: HeapId,
    pub src_offset: u64,
    pub dst: HeapId,
    pub dst_offset: u64,
    pub size: u64,
}

/// Render backend interface
///
/// One implementation per concrete backend. All engine-side GPU work goes
/// through heap allocation, upload-heap writes and blocking copy-queue
/// transfers; command recording and presentation live behind the backend.
pub trait RenderBackend: Send {
    /// Backend name (e.g., "headless", "vulkan")
    fn name(&self) -> &str;

    /// Interface version this backend was built against
    ///
    /// Checked by the loader before any other call.
    fn interface_version(&self) -> u32;

    /// Initialize the backend
    ///
    /// Idempotent: initializing an already-initialized backend succeeds
    /// without rebuilding any backend state.
    fn init(&mut self, config: &BackendConfig) -> Result<()>;

    /// Tear down the backend, destroying all heaps
    ///
    /// Idempotent: a no-op when not initialized.
    fn deinit(&mut self);

    /// Whether `init` has completed
    fn is_initialized(&self) -> bool;

    /// Create a memory heap of the given kind and size
    fn create_heap(&mut self, kind: MemoryKind, size: u64) -> Result<HeapId>;

    /// Destroy a heap
    ///
    /// # Errors
    ///
    /// Returns an error if the heap does not exist.
    fn destroy_heap(&mut self, heap: HeapId) -> Result<()>;

    /// Write into an upload heap at a byte offset
    ///
    /// # Errors
    ///
    /// Returns an error for device heaps, unknown heaps, or out-of-bounds
    /// ranges.
    fn write_heap(&mut self, heap: HeapId, offset: u64, data: &[u8]) -> Result<()>;

    /// Read back from an upload heap at a byte offset
    fn read_heap(&self, heap: HeapId, offset: u64, out: &mut [u8]) -> Result<()>;

    /// Submit a batch of copy-queue transfers
    fn submit_copies(&mut self, regions: &[CopyRegion]) -> Result<()>;

    /// Block the calling thread until all submitted copies complete
    fn wait_copies(&mut self) -> Result<()>;

    /// Get statistics about the backend
    fn stats(&self) -> BackendStats;
}
