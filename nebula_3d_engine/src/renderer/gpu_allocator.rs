/// Dynamic GPU memory sub-allocation.
///
/// Large backend heaps are carved into per-resource regions. Each
/// `MemoryKind` has its own pool of heaps; allocation is first-fit over the
/// free ranges of each heap, deallocation coalesces with both neighbors.
/// There is no compaction: regions never move, and over-fragmentation
/// surfaces as `Error::OutOfMemory` so the caller can `add_heap` explicitly.
///
/// Single-threaded by design; the allocator carries no locks.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::engine_bail;
use crate::engine_warn;
use crate::renderer::backend::{HeapId, MemoryKind, RenderBackend};
use crate::utils::StringId;

/// A sub-allocated region of a backend heap.
///
/// Deliberately neither `Clone` nor `Copy`: the region is owned linearly
/// and returned to the allocator exactly once via `deallocate`.
#[derive(Debug, PartialEq, Eq)]
pub struct GpuAllocation {
    heap: HeapId,
    offset: u64,
    size: u64,
    kind: MemoryKind,
}

impl GpuAllocation {
    /// Backing heap
    pub fn heap(&self) -> HeapId {
        self.heap
    }

    /// Byte offset inside the heap
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Region size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Memory kind of the backing heap
    pub fn kind(&self) -> MemoryKind {
        self.kind
    }
}

/// A free byte range inside one heap
#[derive(Debug, Clone, Copy)]
struct FreeRange {
    offset: u64,
    size: u64,
}

/// Live region bookkeeping, keyed by offset
struct UsedRegion {
    size: u64,
    tag: StringId,
}

struct Heap {
    id: HeapId,
    capacity: u64,
    /// Free ranges sorted by offset, never adjacent (coalesced on free)
    free: Vec<FreeRange>,
    /// Live regions keyed by their start offset
    used: FxHashMap<u64, UsedRegion>,
}

impl Heap {
    fn new(id: HeapId, capacity: u64) -> Self {
        Self {
            id,
            capacity,
            free: vec![FreeRange { offset: 0, size: capacity }],
            used: FxHashMap::default(),
        }
    }

    fn allocated_bytes(&self) -> u64 {
        self.used.values().map(|r| r.size).sum()
    }

    /// First-fit: carve an aligned region out of the first range that holds
    /// one. The unaligned head and the tail of the chosen range stay free.
    fn try_allocate(&mut self, size: u64, alignment: u64, kind: MemoryKind, tag: StringId) -> Option<GpuAllocation> {
        for i in 0..self.free.len() {
            let range = self.free[i];
            let aligned = align_up(range.offset, alignment);
            let padding = aligned - range.offset;
            let Some(needed) = padding.checked_add(size) else {
                continue;
            };
            if needed > range.size {
                continue;
            }

            let tail_offset = aligned + size;
            let tail_size = range.size - padding - size;

            match (padding > 0, tail_size > 0) {
                (false, false) => {
                    self.free.remove(i);
                }
                (true, false) => {
                    self.free[i].size = padding;
                }
                (false, true) => {
                    self.free[i] = FreeRange { offset: tail_offset, size: tail_size };
                }
                (true, true) => {
                    self.free[i].size = padding;
                    self.free.insert(i + 1, FreeRange { offset: tail_offset, size: tail_size });
                }
            }

            self.used.insert(aligned, UsedRegion { size, tag });
            return Some(GpuAllocation {
                heap: self.id,
                offset: aligned,
                size,
                kind,
            });
        }
        None
    }

    /// Return a region and merge it with adjacent free neighbors
    fn free_region(&mut self, offset: u64, size: u64) {
        let insert_at = self
            .free
            .partition_point(|range| range.offset < offset);

        // Merge with the following range if touching.
        let merges_next = self
            .free
            .get(insert_at)
            .is_some_and(|next| offset + size == next.offset);
        // Merge with the preceding range if touching.
        let merges_prev = insert_at > 0 && {
            let prev = self.free[insert_at - 1];
            prev.offset + prev.size == offset
        };

        match (merges_prev, merges_next) {
            (true, true) => {
                let next = self.free.remove(insert_at);
                let prev = &mut self.free[insert_at - 1];
                prev.size += size + next.size;
            }
            (true, false) => {
                self.free[insert_at - 1].size += size;
            }
            (false, true) => {
                let next = &mut self.free[insert_at];
                next.offset = offset;
                next.size += size;
            }
            (false, false) => {
                self.free.insert(insert_at, FreeRange { offset, size });
            }
        }
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two(), "alignment must be a power of two");
    (value + alignment - 1) & !(alignment - 1)
}

/// Statistics of one memory pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub num_heaps: u32,
    pub capacity: u64,
    pub allocated: u64,
    pub num_regions: u32,
}

/// Sub-allocator over backend heaps, one pool per `MemoryKind`
pub struct DynamicGpuAllocator {
    upload: Vec<Heap>,
    device: Vec<Heap>,
}

impl DynamicGpuAllocator {
    /// Create an allocator with no heaps
    ///
    /// Call `add_heap` before the first allocation.
    pub fn new() -> Self {
        Self {
            upload: Vec::new(),
            device: Vec::new(),
        }
    }

    fn pool(&self, kind: MemoryKind) -> &Vec<Heap> {
        match kind {
            MemoryKind::Upload => &self.upload,
            MemoryKind::Device => &self.device,
        }
    }

    fn pool_mut(&mut self, kind: MemoryKind) -> &mut Vec<Heap> {
        match kind {
            MemoryKind::Upload => &mut self.upload,
            MemoryKind::Device => &mut self.device,
        }
    }

    /// Create a backing heap through the backend and add it to the pool
    ///
    /// This is the explicit growth path when allocation reports
    /// `OutOfMemory`.
    pub fn add_heap(
        &mut self,
        backend: &mut dyn RenderBackend,
        kind: MemoryKind,
        capacity: u64,
    ) -> Result<HeapId> {
        if capacity == 0 {
            engine_bail!("nebula3d::DynamicGpuAllocator", "heap capacity must be non-zero");
        }
        let id = backend.create_heap(kind, capacity)?;
        self.pool_mut(kind).push(Heap::new(id, capacity));
        Ok(id)
    }

    /// Allocate a region
    ///
    /// First-fit among the free ranges of every heap of `kind`, in the
    /// order heaps were added. `alignment` must be a power of two.
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` when no free range fits. Recoverable: free
    /// resources or `add_heap` and retry.
    pub fn allocate(
        &mut self,
        kind: MemoryKind,
        size: u64,
        alignment: u64,
        tag: StringId,
    ) -> Result<GpuAllocation> {
        assert!(size > 0, "zero-size GPU allocation");
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");

        for heap in self.pool_mut(kind) {
            if let Some(allocation) = heap.try_allocate(size, alignment, kind, tag) {
                return Ok(allocation);
            }
        }
        engine_warn!("nebula3d::DynamicGpuAllocator",
            "out of {:?} memory allocating {} bytes (align {})", kind, size, alignment);
        Err(Error::OutOfMemory)
    }

    /// Return a region to its pool, coalescing with free neighbors
    pub fn deallocate(&mut self, allocation: GpuAllocation) {
        let heap = self
            .pool_mut(allocation.kind)
            .iter_mut()
            .find(|heap| heap.id == allocation.heap);

        let Some(heap) = heap else {
            debug_assert!(false, "deallocate: unknown heap {:?}", allocation.heap);
            return;
        };
        let Some(region) = heap.used.remove(&allocation.offset) else {
            debug_assert!(false, "deallocate: no live region at offset {}", allocation.offset);
            return;
        };
        debug_assert_eq!(region.size, allocation.size);
        heap.free_region(allocation.offset, allocation.size);
    }

    /// Statistics for one pool
    pub fn stats(&self, kind: MemoryKind) -> PoolStats {
        let pool = self.pool(kind);
        PoolStats {
            num_heaps: pool.len() as u32,
            capacity: pool.iter().map(|h| h.capacity).sum(),
            allocated: pool.iter().map(|h| h.allocated_bytes()).sum(),
            num_regions: pool.iter().map(|h| h.used.len() as u32).sum(),
        }
    }

    /// Destroy all backing heaps through the backend and forget the pools
    ///
    /// Callers must have deallocated (or be intentionally abandoning) all
    /// regions; live regions are reported as leaks.
    pub fn release_heaps(&mut self, backend: &mut dyn RenderBackend) {
        for heap in self.upload.drain(..).chain(self.device.drain(..)) {
            if !heap.used.is_empty() {
                engine_warn!("nebula3d::DynamicGpuAllocator",
                    "releasing heap {:?} with {} live region(s)", heap.id, heap.used.len());
            }
            if let Err(err) = backend.destroy_heap(heap.id) {
                engine_warn!("nebula3d::DynamicGpuAllocator",
                    "failed to destroy heap {:?}: {}", heap.id, err);
            }
        }
    }
}

impl Default for DynamicGpuAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "gpu_allocator_tests.rs"]
mod tests;
