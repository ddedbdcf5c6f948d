/// HeadlessBackend - RenderBackend implemented over CPU memory

use rustc_hash::FxHashMap;

use nebula_3d_engine::nebula3d::{Error, Result};
use nebula_3d_engine::nebula3d::render::{
    BackendConfig, BackendStats, CopyRegion, HeapId, MemoryKind, RenderBackend,
    RENDER_BACKEND_INTERFACE_VERSION,
};
use nebula_3d_engine::{engine_bail, engine_debug, engine_info};

use crate::heap::Heap;

/// Headless backend: heaps in CPU memory, synchronous copy queue
///
/// `init`/`deinit` are idempotent; all heaps die with `deinit`. Copies are
/// queued by `submit_copies` and executed by `wait_copies`, which models
/// the engine's blocking-upload contract exactly (nothing is observable in
/// a destination heap until the wait returns).
pub struct HeadlessBackend {
    initialized: bool,
    enable_validation: bool,
    heaps: FxHashMap<HeapId, Heap>,
    next_heap_id: u32,
    pending_copies: Vec<CopyRegion>,
    stats: BackendStats,
}

impl HeadlessBackend {
    /// Create an uninitialized backend
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            initialized: false,
            enable_validation: config.enable_validation,
            heaps: FxHashMap::default(),
            next_heap_id: 0,
            pending_copies: Vec::new(),
            stats: BackendStats::default(),
        }
    }

    fn heap(&self, id: HeapId) -> Result<&Heap> {
        self.heaps
            .get(&id)
            .ok_or_else(|| Error::InvalidResource(format!("unknown heap {:?}", id)))
    }

    fn require_init(&self) -> Result<()> {
        if !self.initialized {
            return Err(Error::InitializationFailed(
                "headless backend not initialized".to_string(),
            ));
        }
        Ok(())
    }
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn interface_version(&self) -> u32 {
        RENDER_BACKEND_INTERFACE_VERSION
    }

    fn init(&mut self, config: &BackendConfig) -> Result<()> {
        if self.initialized {
            // Idempotent: a second init must not rebuild anything.
            engine_debug!("nebula3d::headless", "init on an initialized backend (no-op)");
            return Ok(());
        }
        self.enable_validation = config.enable_validation;
        self.initialized = true;
        self.stats.init_count += 1;
        engine_info!("nebula3d::headless",
            "initialized for '{}' v{}.{}.{} ({} frames in flight)",
            config.app_name,
            config.app_version.0, config.app_version.1, config.app_version.2,
            config.frames_in_flight);
        Ok(())
    }

    fn deinit(&mut self) {
        if !self.initialized {
            return;
        }
        if !self.pending_copies.is_empty() {
            engine_debug!("nebula3d::headless",
                "deinit with {} unwaited copies", self.pending_copies.len());
            self.pending_copies.clear();
        }
        self.heaps.clear();
        self.stats.heap_count = 0;
        self.stats.heap_bytes = 0;
        self.initialized = false;
        engine_info!("nebula3d::headless", "deinitialized");
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn create_heap(&mut self, kind: MemoryKind, size: u64) -> Result<HeapId> {
        self.require_init()?;
        if size == 0 {
            engine_bail!("nebula3d::headless", "create_heap: zero size");
        }
        let id = HeapId(self.next_heap_id);
        self.next_heap_id += 1;
        self.heaps.insert(id, Heap::new(kind, size));
        self.stats.heap_count += 1;
        self.stats.heap_bytes += size;
        if self.enable_validation {
            engine_debug!("nebula3d::headless",
                "created {:?} heap {:?} ({} bytes)", kind, id, size);
        }
        Ok(id)
    }

    fn destroy_heap(&mut self, heap: HeapId) -> Result<()> {
        self.require_init()?;
        let Some(removed) = self.heaps.remove(&heap) else {
            engine_bail!("nebula3d::headless", "destroy_heap: unknown heap {:?}", heap);
        };
        self.stats.heap_count -= 1;
        self.stats.heap_bytes -= removed.size();
        Ok(())
    }

    fn write_heap(&mut self, heap: HeapId, offset: u64, data: &[u8]) -> Result<()> {
        self.require_init()?;
        let Some(entry) = self.heaps.get_mut(&heap) else {
            engine_bail!("nebula3d::headless", "write_heap: unknown heap {:?}", heap);
        };
        if entry.kind() != MemoryKind::Upload {
            engine_bail!("nebula3d::headless",
                "write_heap: heap {:?} is not upload-visible", heap);
        }
        if !entry.in_bounds(offset, data.len() as u64) {
            engine_bail!("nebula3d::headless",
                "write_heap: {} bytes at offset {} exceed heap size {}",
                data.len(), offset, entry.size());
        }
        entry.bytes_mut(offset, data.len() as u64).copy_from_slice(data);
        Ok(())
    }

    fn read_heap(&self, heap: HeapId, offset: u64, out: &mut [u8]) -> Result<()> {
        self.require_init()?;
        let entry = self.heap(heap)?;
        if entry.kind() != MemoryKind::Upload {
            engine_bail!("nebula3d::headless",
                "read_heap: heap {:?} is not upload-visible", heap);
        }
        if !entry.in_bounds(offset, out.len() as u64) {
            engine_bail!("nebula3d::headless",
                "read_heap: {} bytes at offset {} exceed heap size {}",
                out.len(), offset, entry.size());
        }
        out.copy_from_slice(entry.bytes(offset, out.len() as u64));
        Ok(())
    }

    fn submit_copies(&mut self, regions: &[CopyRegion]) -> Result<()> {
        self.require_init()?;
        for region in regions {
            let src = self.heap(region.src)?;
            if !src.in_bounds(region.src_offset, region.size) {
                engine_bail!("nebula3d::headless",
                    "submit_copies: source range out of bounds on {:?}", region.src);
            }
            let dst = self.heap(region.dst)?;
            if !dst.in_bounds(region.dst_offset, region.size) {
                engine_bail!("nebula3d::headless",
                    "submit_copies: destination range out of bounds on {:?}", region.dst);
            }
        }
        self.pending_copies.extend_from_slice(regions);
        self.stats.copy_submissions += 1;
        Ok(())
    }

    fn wait_copies(&mut self) -> Result<()> {
        self.require_init()?;
        let pending = std::mem::take(&mut self.pending_copies);
        for region in pending {
            // Validated at submit time; heaps cannot vanish in between
            // because destroy_heap is also engine-driven and synchronous.
            let bytes = self.heap(region.src)?.bytes(region.src_offset, region.size).to_vec();
            let Some(dst) = self.heaps.get_mut(&region.dst) else {
                engine_bail!("nebula3d::headless",
                    "wait_copies: destination heap {:?} destroyed with copies in flight",
                    region.dst);
            };
            dst.bytes_mut(region.dst_offset, region.size).copy_from_slice(&bytes);
        }
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats
    }
}
