/// Stage types - the units of GPU work in the renderer state
///
/// A stage is a named entry in the ordered execution list: a render pass,
/// a compute pass, or a user barrier demarcating independently submittable
/// segments. Render and compute stages reference their pipeline by name
/// (resolved lazily) and carry per-register constant buffers, each N frames
/// deep so the CPU writes next-frame data while the GPU reads the current
/// slot.

use crate::renderer::gpu_allocator::GpuAllocation;
use crate::resource::framed::Framed;
use crate::utils::StringId;

/// Sentinel for "no stage found" scans
pub const INVALID_STAGE_IDX: u32 = u32::MAX;

/// Kind of work a stage performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Draw calls into framebuffer attachments
    RenderPass,
    /// Compute dispatches
    ComputePass,
    /// Synchronization point between independently submittable segments
    UserBarrier,
}

/// One per-frame slot of a stage constant buffer: an upload-visible region
pub struct ConstantBufferMemory {
    allocation: GpuAllocation,
    size: u64,
}

impl ConstantBufferMemory {
    pub(crate) fn new(allocation: GpuAllocation, size: u64) -> Self {
        Self { allocation, size }
    }

    /// Upload-visible region backing this slot
    pub fn allocation(&self) -> &GpuAllocation {
        &self.allocation
    }

    /// Slot capacity in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn into_allocation(self) -> GpuAllocation {
        self.allocation
    }
}

/// A constant buffer bound to a shader register, N frames deep
pub struct ConstantBufferBinding {
    shader_register: u32,
    memory: Framed<ConstantBufferMemory>,
}

impl ConstantBufferBinding {
    pub(crate) fn new(shader_register: u32, memory: Framed<ConstantBufferMemory>) -> Self {
        Self {
            shader_register,
            memory,
        }
    }

    /// Shader register this buffer is bound to
    pub fn shader_register(&self) -> u32 {
        self.shader_register
    }

    /// The per-frame slots
    pub fn memory(&self) -> &Framed<ConstantBufferMemory> {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut Framed<ConstantBufferMemory> {
        &mut self.memory
    }

    pub(crate) fn into_memory(self) -> Framed<ConstantBufferMemory> {
        self.memory
    }
}

/// A stage in the ordered execution list
pub struct Stage {
    name: StringId,
    kind: StageKind,
    pipeline: StringId,
    constant_buffers: Vec<ConstantBufferBinding>,
    /// Lazily resolved pipeline index; cleared on every structural edit
    pub(crate) cached_pipeline_idx: Option<u32>,
}

impl Stage {
    pub(crate) fn new(
        name: StringId,
        kind: StageKind,
        pipeline: StringId,
        constant_buffers: Vec<ConstantBufferBinding>,
    ) -> Self {
        Self {
            name,
            kind,
            pipeline,
            constant_buffers,
            cached_pipeline_idx: None,
        }
    }

    /// Interned stage name
    pub fn name(&self) -> StringId {
        self.name
    }

    /// Kind of work this stage performs
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Interned name of the referenced pipeline (empty for barriers)
    pub fn pipeline(&self) -> StringId {
        self.pipeline
    }

    /// Constant buffers bound to this stage
    pub fn constant_buffers(&self) -> &[ConstantBufferBinding] {
        &self.constant_buffers
    }

    pub(crate) fn constant_buffers_mut(&mut self) -> &mut Vec<ConstantBufferBinding> {
        &mut self.constant_buffers
    }
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// Descriptor for one stage constant buffer
#[derive(Debug, Clone, Copy)]
pub struct ConstantBufferDesc {
    pub shader_register: u32,
    /// Slot capacity in bytes
    pub size: u64,
}

/// Descriptor for creating a stage
#[derive(Debug, Clone)]
pub struct StageDesc {
    pub name: String,
    pub kind: StageKind,
    /// Referenced pipeline name; must be empty for barriers
    pub pipeline: String,
    pub constant_buffers: Vec<ConstantBufferDesc>,
}

impl StageDesc {
    /// A render pass referencing a render pipeline
    pub fn render_pass(name: &str, pipeline: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: StageKind::RenderPass,
            pipeline: pipeline.to_string(),
            constant_buffers: Vec::new(),
        }
    }

    /// A compute pass referencing a compute pipeline
    pub fn compute_pass(name: &str, pipeline: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: StageKind::ComputePass,
            pipeline: pipeline.to_string(),
            constant_buffers: Vec::new(),
        }
    }

    /// A user barrier demarcating a segment boundary
    pub fn barrier(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: StageKind::UserBarrier,
            pipeline: String::new(),
            constant_buffers: Vec::new(),
        }
    }

    /// Bind a constant buffer to a shader register
    pub fn with_constant_buffer(mut self, shader_register: u32, size: u64) -> Self {
        self.constant_buffers.push(ConstantBufferDesc {
            shader_register,
            size,
        });
        self
    }
}
