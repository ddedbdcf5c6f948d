/// Renderer state - the ordered stage list and pipeline tables
///
/// State machine over the stage list: `current_stage_idx` marks the
/// position in the present-queue sweep, barriers split the list into
/// independently submittable segments, and name lookups resolve within the
/// active segment only. Structural edits (insert/remove/reorder stages,
/// register/remove pipelines) bump a revision counter that invalidates
/// every previously resolved index; using a cached index across an edit is
/// a programmer error caught by `debug_assert!`.
///
/// The renderer state also owns the frame rotation: `begin_frame` advances
/// the shared frame index and every stage's per-frame constant buffers
/// exactly once per frame boundary.

use crate::error::Result;
use crate::{engine_bail, engine_debug};
use crate::renderer::backend::{MemoryKind, RenderBackend};
use crate::renderer::gpu_allocator::DynamicGpuAllocator;
use crate::resource::framed::{Framed, MAX_FRAMES_IN_FLIGHT};
use crate::stage::stage::{
    ConstantBufferBinding, ConstantBufferMemory, Stage, StageDesc, StageKind, INVALID_STAGE_IDX,
};
use crate::utils::{StringId, StringRegistry};

/// Alignment of stage constant buffer slots
const CONSTANT_BUFFER_ALIGN: u64 = 256;

// ============================================================================
// PIPELINE REGISTRY
// ============================================================================

/// Descriptor for a render pipeline
#[derive(Debug, Clone)]
pub struct RenderPipelineDesc {
    pub name: String,
    pub vertex_shader: String,
    pub pixel_shader: String,
}

/// Descriptor for a compute pipeline
#[derive(Debug, Clone)]
pub struct ComputePipelineDesc {
    pub name: String,
    pub compute_shader: String,
}

/// A registered render pipeline
pub struct RenderPipeline {
    name: StringId,
    desc: RenderPipelineDesc,
}

impl RenderPipeline {
    pub fn name(&self) -> StringId {
        self.name
    }
    pub fn desc(&self) -> &RenderPipelineDesc {
        &self.desc
    }
}

/// A registered compute pipeline
pub struct ComputePipeline {
    name: StringId,
    desc: ComputePipelineDesc,
}

impl ComputePipeline {
    pub fn name(&self) -> StringId {
        self.name
    }
    pub fn desc(&self) -> &ComputePipelineDesc {
        &self.desc
    }
}

// ============================================================================
// CACHED INDICES
// ============================================================================

/// An index resolved against a specific structure revision.
///
/// Callers must not retain a `CachedIdx` across a structural edit; the
/// asserting accessors (`render_pipeline_at`, ...) catch that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedIdx {
    idx: u32,
    revision: u64,
}

impl CachedIdx {
    /// Raw index, `INVALID_STAGE_IDX` when the lookup found nothing
    pub fn idx(self) -> u32 {
        self.idx
    }

    /// Whether the lookup found something
    pub fn is_found(self) -> bool {
        self.idx != INVALID_STAGE_IDX
    }
}

// ============================================================================
// RENDERER STATE
// ============================================================================

/// Ordered stage list, pipeline tables and frame rotation
pub struct RendererState {
    stages: Vec<Stage>,
    render_pipelines: Vec<RenderPipeline>,
    compute_pipelines: Vec<ComputePipeline>,
    current_stage_idx: u32,
    frame_idx: u32,
    num_frames: u32,
    revision: u64,
    input_stage: Option<u32>,
}

impl RendererState {
    /// Create an empty state with the given frames-in-flight count
    pub fn new(num_frames: u32) -> Self {
        assert!(
            (2..=MAX_FRAMES_IN_FLIGHT).contains(&num_frames),
            "frames in flight must be in [2, {}], got {}",
            MAX_FRAMES_IN_FLIGHT,
            num_frames
        );
        Self {
            stages: Vec::new(),
            render_pipelines: Vec::new(),
            compute_pipelines: Vec::new(),
            current_stage_idx: 0,
            frame_idx: 0,
            num_frames,
            revision: 0,
            input_stage: None,
        }
    }

    /// Frames in flight
    pub fn num_frames(&self) -> u32 {
        self.num_frames
    }

    /// Current frame index, in `[0, num_frames)`
    pub fn frame_idx(&self) -> u32 {
        self.frame_idx
    }

    /// Position of the sweep in the stage list
    pub fn current_stage_idx(&self) -> u32 {
        self.current_stage_idx
    }

    /// Structure revision; bumped by every structural edit
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Structural edit bookkeeping: new revision, all caches dropped
    fn mark_structural_edit(&mut self) {
        self.revision += 1;
        self.current_stage_idx = 0;
        for stage in &mut self.stages {
            stage.cached_pipeline_idx = None;
        }
    }

    // ===== PIPELINE REGISTRY =====

    /// Register a render pipeline
    ///
    /// A structural edit: all previously resolved indices go stale.
    pub fn register_render_pipeline(
        &mut self,
        desc: RenderPipelineDesc,
        strings: &mut StringRegistry,
    ) -> Result<()> {
        let name = strings.intern(&desc.name)?;
        if self.render_pipelines.iter().any(|p| p.name == name) {
            engine_bail!("nebula3d::RendererState",
                "render pipeline '{}' already registered", desc.name);
        }
        self.render_pipelines.push(RenderPipeline { name, desc });
        self.mark_structural_edit();
        Ok(())
    }

    /// Register a compute pipeline (structural edit)
    pub fn register_compute_pipeline(
        &mut self,
        desc: ComputePipelineDesc,
        strings: &mut StringRegistry,
    ) -> Result<()> {
        let name = strings.intern(&desc.name)?;
        if self.compute_pipelines.iter().any(|p| p.name == name) {
            engine_bail!("nebula3d::RendererState",
                "compute pipeline '{}' already registered", desc.name);
        }
        self.compute_pipelines.push(ComputePipeline { name, desc });
        self.mark_structural_edit();
        Ok(())
    }

    /// Remove a render pipeline by name (structural edit); no-op if absent
    pub fn remove_render_pipeline(&mut self, name: &str) -> bool {
        let id = StringId::of(name);
        let before = self.render_pipelines.len();
        self.render_pipelines.retain(|p| p.name != id);
        let removed = self.render_pipelines.len() != before;
        if removed {
            self.mark_structural_edit();
        }
        removed
    }

    /// Remove a compute pipeline by name (structural edit); no-op if absent
    pub fn remove_compute_pipeline(&mut self, name: &str) -> bool {
        let id = StringId::of(name);
        let before = self.compute_pipelines.len();
        self.compute_pipelines.retain(|p| p.name != id);
        let removed = self.compute_pipelines.len() != before;
        if removed {
            self.mark_structural_edit();
        }
        removed
    }

    /// Table-wide scan of the render pipeline registry by name
    ///
    /// Segment-independent, unlike stage lookups. The returned index is
    /// valid until the next structural edit.
    pub fn find_render_pipeline_idx(&self, name: &str) -> CachedIdx {
        let id = StringId::of(name);
        let idx = self
            .render_pipelines
            .iter()
            .position(|p| p.name == id)
            .map(|i| i as u32)
            .unwrap_or(INVALID_STAGE_IDX);
        CachedIdx {
            idx,
            revision: self.revision,
        }
    }

    /// Table-wide scan of the compute pipeline registry by name
    pub fn find_compute_pipeline_idx(&self, name: &str) -> CachedIdx {
        let id = StringId::of(name);
        let idx = self
            .compute_pipelines
            .iter()
            .position(|p| p.name == id)
            .map(|i| i as u32)
            .unwrap_or(INVALID_STAGE_IDX);
        CachedIdx {
            idx,
            revision: self.revision,
        }
    }

    /// Dereference a cached render pipeline index
    ///
    /// Asserts (debug) if the index was resolved before a structural edit.
    pub fn render_pipeline_at(&self, cached: CachedIdx) -> Option<&RenderPipeline> {
        if cached.revision != self.revision {
            debug_assert!(false,
                "cached pipeline index used across a structural edit (revision {} != {})",
                cached.revision, self.revision);
            return None;
        }
        if !cached.is_found() {
            return None;
        }
        self.render_pipelines.get(cached.idx as usize)
    }

    /// Dereference a cached compute pipeline index (same policy)
    pub fn compute_pipeline_at(&self, cached: CachedIdx) -> Option<&ComputePipeline> {
        if cached.revision != self.revision {
            debug_assert!(false,
                "cached pipeline index used across a structural edit (revision {} != {})",
                cached.revision, self.revision);
            return None;
        }
        if !cached.is_found() {
            return None;
        }
        self.compute_pipelines.get(cached.idx as usize)
    }

    /// Number of registered render pipelines
    pub fn render_pipeline_count(&self) -> u32 {
        self.render_pipelines.len() as u32
    }

    // ===== STAGE LIST EDITS =====

    /// Append a stage
    pub fn add_stage(
        &mut self,
        desc: &StageDesc,
        strings: &mut StringRegistry,
        allocator: &mut DynamicGpuAllocator,
    ) -> Result<()> {
        let at = self.stages.len();
        self.insert_stage(at, desc, strings, allocator)
    }

    /// Insert a stage at a position (structural edit)
    ///
    /// Allocates the stage's per-frame constant buffers from upload
    /// memory. Forbidden while a stage is input-enabled.
    pub fn insert_stage(
        &mut self,
        at: usize,
        desc: &StageDesc,
        strings: &mut StringRegistry,
        allocator: &mut DynamicGpuAllocator,
    ) -> Result<()> {
        if self.input_stage.is_some() {
            engine_bail!("nebula3d::RendererState",
                "structural edit while stage input is active");
        }
        if at > self.stages.len() {
            engine_bail!("nebula3d::RendererState",
                "stage insert position {} out of range", at);
        }
        match desc.kind {
            StageKind::UserBarrier => {
                if !desc.pipeline.is_empty() || !desc.constant_buffers.is_empty() {
                    engine_bail!("nebula3d::RendererState",
                        "barrier stage '{}' must not reference pipelines or constant buffers",
                        desc.name);
                }
            }
            StageKind::RenderPass | StageKind::ComputePass => {
                if desc.pipeline.is_empty() {
                    engine_bail!("nebula3d::RendererState",
                        "stage '{}' references no pipeline", desc.name);
                }
            }
        }

        let name = strings.intern(&desc.name)?;
        let pipeline = if desc.pipeline.is_empty() {
            StringId::EMPTY
        } else {
            strings.intern(&desc.pipeline)?
        };

        let mut bindings = Vec::with_capacity(desc.constant_buffers.len());
        for cb in &desc.constant_buffers {
            if cb.size == 0 {
                self.release_bindings(bindings, allocator);
                engine_bail!("nebula3d::RendererState",
                    "stage '{}' register {} has zero-size constant buffer",
                    desc.name, cb.shader_register);
            }
            // One upload-visible region per in-flight frame.
            let mut slots = Vec::with_capacity(self.num_frames as usize);
            for _ in 0..self.num_frames {
                match allocator.allocate(
                    MemoryKind::Upload,
                    cb.size,
                    CONSTANT_BUFFER_ALIGN,
                    name,
                ) {
                    Ok(allocation) => slots.push(ConstantBufferMemory::new(allocation, cb.size)),
                    Err(err) => {
                        for slot in slots {
                            allocator.deallocate(slot.into_allocation());
                        }
                        self.release_bindings(bindings, allocator);
                        return Err(err);
                    }
                }
            }
            let mut slots = slots.into_iter();
            let memory = Framed::new(self.num_frames, |_| {
                slots.next().expect("one slot per frame")
            });
            bindings.push(ConstantBufferBinding::new(cb.shader_register, memory));
        }

        self.stages.insert(at, Stage::new(name, desc.kind, pipeline, bindings));
        self.mark_structural_edit();
        Ok(())
    }

    /// Remove a stage by position (structural edit)
    ///
    /// Releases the stage's constant buffer regions.
    pub fn remove_stage(
        &mut self,
        at: usize,
        allocator: &mut DynamicGpuAllocator,
    ) -> Result<()> {
        if self.input_stage.is_some() {
            engine_bail!("nebula3d::RendererState",
                "structural edit while stage input is active");
        }
        if at >= self.stages.len() {
            engine_bail!("nebula3d::RendererState",
                "stage remove position {} out of range", at);
        }
        let mut stage = self.stages.remove(at);
        let bindings = std::mem::take(stage.constant_buffers_mut());
        self.release_bindings(bindings, allocator);
        self.mark_structural_edit();
        Ok(())
    }

    /// Move a stage to a new position (structural edit)
    pub fn move_stage(&mut self, from: usize, to: usize) -> Result<()> {
        if self.input_stage.is_some() {
            engine_bail!("nebula3d::RendererState",
                "structural edit while stage input is active");
        }
        if from >= self.stages.len() || to >= self.stages.len() {
            engine_bail!("nebula3d::RendererState",
                "stage move {} -> {} out of range", from, to);
        }
        let stage = self.stages.remove(from);
        self.stages.insert(to, stage);
        self.mark_structural_edit();
        Ok(())
    }

    fn release_bindings(
        &mut self,
        bindings: Vec<ConstantBufferBinding>,
        allocator: &mut DynamicGpuAllocator,
    ) {
        for binding in bindings {
            for slot in binding.into_memory().into_slots() {
                allocator.deallocate(slot.into_allocation());
            }
        }
    }

    /// Number of stages
    pub fn stage_count(&self) -> u32 {
        self.stages.len() as u32
    }

    /// Stage at a position
    pub fn stage(&self, idx: u32) -> Option<&Stage> {
        self.stages.get(idx as usize)
    }

    // ===== SWEEP SCANS =====

    /// Index of the next `UserBarrier` at or after the current position
    ///
    /// `INVALID_STAGE_IDX` when no barrier remains: the rest of the list is
    /// one final segment.
    pub fn find_next_barrier_idx(&self) -> u32 {
        for idx in self.current_stage_idx as usize..self.stages.len() {
            if self.stages[idx].kind() == StageKind::UserBarrier {
                return idx as u32;
            }
        }
        INVALID_STAGE_IDX
    }

    /// Index of a named stage within the active segment
    ///
    /// Scans forward from the current position and stops at the next
    /// barrier: a stage name resolves only inside the currently active
    /// segment, so the same name may legally recur after a barrier.
    pub fn find_active_stage_idx(&self, name: &str) -> u32 {
        let id = StringId::of(name);
        for idx in self.current_stage_idx as usize..self.stages.len() {
            let stage = &self.stages[idx];
            if stage.kind() == StageKind::UserBarrier {
                break;
            }
            if stage.name() == id {
                return idx as u32;
            }
        }
        INVALID_STAGE_IDX
    }

    /// Move the sweep past the next barrier
    ///
    /// With no barrier left the sweep moves to the end of the list.
    pub fn proceed_past_barrier(&mut self) -> Result<()> {
        if self.input_stage.is_some() {
            engine_bail!("nebula3d::RendererState",
                "cannot advance the sweep while stage input is active");
        }
        let barrier = self.find_next_barrier_idx();
        self.current_stage_idx = if barrier == INVALID_STAGE_IDX {
            self.stages.len() as u32
        } else {
            barrier + 1
        };
        Ok(())
    }

    /// Lazily resolve (and cache) the pipeline index of a stage
    ///
    /// The cache lives until the next structural edit.
    ///
    /// # Errors
    ///
    /// Returns an error for barriers, out-of-range stages, or when the
    /// referenced pipeline is not registered.
    pub fn stage_pipeline_idx(&mut self, stage_idx: u32) -> Result<u32> {
        let Some(stage) = self.stages.get(stage_idx as usize) else {
            engine_bail!("nebula3d::RendererState",
                "stage index {} out of range", stage_idx);
        };
        if let Some(cached) = stage.cached_pipeline_idx {
            return Ok(cached);
        }

        let pipeline_name = stage.pipeline();
        let resolved = match stage.kind() {
            StageKind::UserBarrier => {
                engine_bail!("nebula3d::RendererState",
                    "barrier stages reference no pipeline");
            }
            StageKind::RenderPass => self
                .render_pipelines
                .iter()
                .position(|p| p.name == pipeline_name),
            StageKind::ComputePass => self
                .compute_pipelines
                .iter()
                .position(|p| p.name == pipeline_name),
        };
        let Some(idx) = resolved else {
            engine_bail!("nebula3d::RendererState",
                "stage {} references an unregistered pipeline", stage_idx);
        };

        let idx = idx as u32;
        self.stages[stage_idx as usize].cached_pipeline_idx = Some(idx);
        Ok(idx)
    }

    // ===== FRAME ROTATION =====

    /// Start a new frame: advance the rotation exactly once and restart
    /// the sweep at the first stage
    pub fn begin_frame(&mut self) -> Result<()> {
        if self.input_stage.is_some() {
            engine_bail!("nebula3d::RendererState",
                "begin_frame while stage input is active");
        }
        self.frame_idx = (self.frame_idx + 1) % self.num_frames;
        for stage in &mut self.stages {
            for binding in stage.constant_buffers_mut() {
                binding.memory_mut().advance();
            }
        }
        self.current_stage_idx = 0;
        Ok(())
    }

    // ===== STAGE INPUT =====

    /// Enable constant buffer input for a named stage in the active segment
    pub fn begin_stage_input(&mut self, name: &str) -> Result<()> {
        if let Some(active) = self.input_stage {
            engine_bail!("nebula3d::RendererState",
                "stage input already active for stage {}", active);
        }
        let idx = self.find_active_stage_idx(name);
        if idx == INVALID_STAGE_IDX {
            engine_bail!("nebula3d::RendererState",
                "stage '{}' not found in the active segment", name);
        }
        self.input_stage = Some(idx);
        Ok(())
    }

    /// Write constant buffer data for a shader register of the
    /// input-enabled stage
    ///
    /// The write goes to the *next* frame's slot - never the slot the GPU
    /// is currently consuming. Returns `Ok(false)` when the register is not
    /// bound in this stage: a stage may legitimately not populate every
    /// register.
    pub fn set_constant_buffer(
        &mut self,
        shader_register: u32,
        data: &[u8],
        backend: &mut dyn RenderBackend,
    ) -> Result<bool> {
        let Some(stage_idx) = self.input_stage else {
            engine_bail!("nebula3d::RendererState",
                "set_constant_buffer without an input-enabled stage");
        };
        let stage = &mut self.stages[stage_idx as usize];
        let Some(binding) = stage
            .constant_buffers_mut()
            .iter_mut()
            .find(|b| b.shader_register() == shader_register)
        else {
            engine_debug!("nebula3d::RendererState",
                "register {} not bound in stage {}", shader_register, stage_idx);
            return Ok(false);
        };

        let next = binding.memory().next_frame_idx();
        let slot = binding.memory_mut().state_mut(next);
        if data.len() as u64 > slot.size() {
            engine_bail!("nebula3d::RendererState",
                "constant buffer write of {} bytes exceeds slot size {}",
                data.len(), slot.size());
        }
        backend.write_heap(slot.allocation().heap(), slot.allocation().offset(), data)?;
        Ok(true)
    }

    /// The constant buffer slot the GPU reads this frame, if the register
    /// is bound in the given stage
    pub fn current_constant_buffer(
        &self,
        stage_idx: u32,
        shader_register: u32,
    ) -> Option<&ConstantBufferMemory> {
        let stage = self.stages.get(stage_idx as usize)?;
        let binding = stage
            .constant_buffers()
            .iter()
            .find(|b| b.shader_register() == shader_register)?;
        Some(binding.memory().current())
    }

    /// Disable constant buffer input
    pub fn end_stage_input(&mut self) -> Result<()> {
        if self.input_stage.take().is_none() {
            engine_bail!("nebula3d::RendererState", "no stage input active");
        }
        Ok(())
    }

    // ===== TEARDOWN =====

    /// Release every constant buffer region and drop all stages and
    /// pipelines (structural edit)
    pub fn clear(&mut self, allocator: &mut DynamicGpuAllocator) {
        self.input_stage = None;
        let stages = std::mem::take(&mut self.stages);
        for mut stage in stages {
            let bindings = std::mem::take(stage.constant_buffers_mut());
            self.release_bindings(bindings, allocator);
        }
        self.render_pipelines.clear();
        self.compute_pipelines.clear();
        self.mark_structural_edit();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "renderer_state_tests.rs"]
mod tests;
