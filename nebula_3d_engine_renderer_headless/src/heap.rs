/// Heap - CPU-emulated GPU memory heap

use nebula_3d_engine::nebula3d::render::MemoryKind;

/// One emulated heap: a byte buffer tagged with its memory kind
pub(crate) struct Heap {
    kind: MemoryKind,
    data: Vec<u8>,
}

impl Heap {
    pub(crate) fn new(kind: MemoryKind, size: u64) -> Self {
        Self {
            kind,
            data: vec![0; size as usize],
        }
    }

    pub(crate) fn kind(&self) -> MemoryKind {
        self.kind
    }

    pub(crate) fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Whether `[offset, offset + len)` lies inside the heap
    pub(crate) fn in_bounds(&self, offset: u64, len: u64) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.size())
    }

    pub(crate) fn bytes(&self, offset: u64, len: u64) -> &[u8] {
        &self.data[offset as usize..(offset + len) as usize]
    }

    pub(crate) fn bytes_mut(&mut self, offset: u64, len: u64) -> &mut [u8] {
        &mut self.data[offset as usize..(offset + len) as usize]
    }
}
