/// Mock backend for unit tests (no GPU required)
///
/// Backs heaps with plain byte vectors and executes copy-queue transfers
/// on wait. Tracks heap and init counts so loader and idempotency tests
/// can observe backend state without a real device.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::engine_bail;
use crate::renderer::backend::{
    BackendConfig, BackendStats, CopyRegion, HeapId, MemoryKind, RenderBackend,
    RENDER_BACKEND_INTERFACE_VERSION,
};

struct MockHeap {
    kind: MemoryKind,
    data: Vec<u8>,
}

/// Mock backend implementing `RenderBackend` in CPU memory
pub struct MockBackend {
    /// Version reported to the loader; tests override to provoke mismatches
    pub reported_version: u32,
    initialized: bool,
    heaps: FxHashMap<HeapId, MockHeap>,
    next_heap: u32,
    stats: BackendStats,
    pending_copies: Vec<CopyRegion>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            reported_version: RENDER_BACKEND_INTERFACE_VERSION,
            initialized: false,
            heaps: FxHashMap::default(),
            next_heap: 0,
            stats: BackendStats::default(),
            pending_copies: Vec::new(),
        }
    }

    /// A backend claiming a different interface version
    pub fn with_version(version: u32) -> Self {
        let mut backend = Self::new();
        backend.reported_version = version;
        backend
    }

    /// Test-only readback of device heap contents
    pub fn heap_bytes(&self, heap: HeapId, offset: u64, len: usize) -> Vec<u8> {
        let heap = self.heaps.get(&heap).expect("unknown heap");
        heap.data[offset as usize..offset as usize + len].to_vec()
    }

    fn require_init(&self) -> Result<()> {
        if !self.initialized {
            return Err(Error::InitializationFailed(
                "mock backend not initialized".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn interface_version(&self) -> u32 {
        self.reported_version
    }

    fn init(&mut self, _config: &BackendConfig) -> Result<()> {
        if self.initialized {
            // Idempotent: no backend state is rebuilt.
            return Ok(());
        }
        self.initialized = true;
        self.stats.init_count += 1;
        Ok(())
    }

    fn deinit(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        self.heaps.clear();
        self.stats.heap_count = 0;
        self.stats.heap_bytes = 0;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn create_heap(&mut self, kind: MemoryKind, size: u64) -> Result<HeapId> {
        self.require_init()?;
        let id = HeapId(self.next_heap);
        self.next_heap += 1;
        self.heaps.insert(id, MockHeap {
            kind,
            data: vec![0; size as usize],
        });
        self.stats.heap_count += 1;
        self.stats.heap_bytes += size;
        Ok(id)
    }

    fn destroy_heap(&mut self, heap: HeapId) -> Result<()> {
        match self.heaps.remove(&heap) {
            Some(removed) => {
                self.stats.heap_count -= 1;
                self.stats.heap_bytes -= removed.data.len() as u64;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("unknown heap {:?}", heap))),
        }
    }

    fn write_heap(&mut self, heap: HeapId, offset: u64, data: &[u8]) -> Result<()> {
        self.require_init()?;
        let Some(entry) = self.heaps.get_mut(&heap) else {
            engine_bail!("nebula3d::mock", "write_heap: unknown heap {:?}", heap);
        };
        if entry.kind != MemoryKind::Upload {
            engine_bail!("nebula3d::mock", "write_heap: heap {:?} is not upload-visible", heap);
        }
        let end = (offset as usize).checked_add(data.len());
        let Some(end) = end.filter(|end| *end <= entry.data.len()) else {
            engine_bail!("nebula3d::mock",
                "write_heap: {} bytes at offset {} exceed heap size {}",
                data.len(), offset, entry.data.len());
        };
        entry.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn read_heap(&self, heap: HeapId, offset: u64, out: &mut [u8]) -> Result<()> {
        let Some(entry) = self.heaps.get(&heap) else {
            engine_bail!("nebula3d::mock", "read_heap: unknown heap {:?}", heap);
        };
        if entry.kind != MemoryKind::Upload {
            engine_bail!("nebula3d::mock", "read_heap: heap {:?} is not upload-visible", heap);
        }
        let end = (offset as usize).checked_add(out.len());
        let Some(end) = end.filter(|end| *end <= entry.data.len()) else {
            engine_bail!("nebula3d::mock",
                "read_heap: {} bytes at offset {} exceed heap size {}",
                out.len(), offset, entry.data.len());
        };
        out.copy_from_slice(&entry.data[offset as usize..end]);
        Ok(())
    }

    fn submit_copies(&mut self, regions: &[CopyRegion]) -> Result<()> {
        self.require_init()?;
        for region in regions {
            if !self.heaps.contains_key(&region.src) || !self.heaps.contains_key(&region.dst) {
                engine_bail!("nebula3d::mock", "submit_copies: unknown heap in copy");
            }
        }
        self.pending_copies.extend_from_slice(regions);
        self.stats.copy_submissions += 1;
        Ok(())
    }

    fn wait_copies(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending_copies);
        for region in pending {
            let src = self
                .heaps
                .get(&region.src)
                .ok_or_else(|| Error::InvalidResource("copy source vanished".to_string()))?;
            let bytes = src.data
                [region.src_offset as usize..(region.src_offset + region.size) as usize]
                .to_vec();
            let dst = self
                .heaps
                .get_mut(&region.dst)
                .ok_or_else(|| Error::InvalidResource("copy destination vanished".to_string()))?;
            dst.data[region.dst_offset as usize..(region.dst_offset + region.size) as usize]
                .copy_from_slice(&bytes);
        }
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats
    }
}
