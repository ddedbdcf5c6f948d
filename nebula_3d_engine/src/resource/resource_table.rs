/// Central resource table for the engine.
///
/// Maps logical names (interned string ids) to generation-checked handles
/// for buffers, textures and framebuffers. The table exclusively owns every
/// resource entry and its GPU allocation; it must be torn down (`clear`)
/// before the backend that created the backing heaps is unloaded.
///
/// Name lookups that find nothing return `Handle::NULL` - a sentinel, not
/// an error. The `allow_replace` policy is uniform across all three
/// resource kinds.
///
/// Single-threaded by design; no internal locking.

use glam::UVec2;
use rustc_hash::FxHashMap;
use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::{engine_bail, engine_error, engine_info, engine_warn};
use crate::renderer::backend::MemoryKind;
use crate::renderer::gpu_allocator::{DynamicGpuAllocator, GpuAllocation};
use crate::resource::handle::{Handle, HandlePool};
use crate::utils::{StringId, StringRegistry};

/// Alignment of plain buffer regions
const BUFFER_ALIGN: u64 = 16;
/// Alignment of constant-buffer regions (shader binding granularity)
const CONSTANT_BUFFER_ALIGN: u64 = 256;
/// Alignment of texture regions
const TEXTURE_ALIGN: u64 = 256;

// ============================================================================
// DESCRIPTORS
// ============================================================================

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferUsage: u32 {
        const VERTEX   = 1 << 0;
        const INDEX    = 1 << 1;
        const CONSTANT = 1 << 2;
        const STORAGE  = 1 << 3;
    }
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureUsage: u32 {
        const SAMPLED       = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
        const STORAGE       = 1 << 3;
    }
}

/// Texture formats supported by the resource table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8_UNORM,
    RG8_UNORM,
    RGBA8_UNORM,
    BGRA8_UNORM,
    RGBA16_FLOAT,
    DEPTH32_FLOAT,
}

impl TextureFormat {
    /// Bytes per pixel of this format
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            TextureFormat::R8_UNORM => 1,
            TextureFormat::RG8_UNORM => 2,
            TextureFormat::RGBA8_UNORM | TextureFormat::BGRA8_UNORM => 4,
            TextureFormat::RGBA16_FLOAT => 8,
            TextureFormat::DEPTH32_FLOAT => 4,
        }
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    /// Upload (CPU-visible) or Device (GPU-only) memory
    pub memory: MemoryKind,
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub name: String,
    /// Pixel extent; ignored when `resolution_dependent`
    pub extent: UVec2,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    /// Recreated by `update_resolution` when true
    pub resolution_dependent: bool,
    /// Extent = screen resolution * scale when `resolution_dependent`
    pub resolution_scale: f32,
}

/// Descriptor for creating a framebuffer
///
/// Attachments reference textures by name and are resolved to handles at
/// creation time.
#[derive(Debug, Clone)]
pub struct FramebufferDesc {
    pub name: String,
    pub color_attachments: Vec<String>,
    pub depth_attachment: Option<String>,
}

// ============================================================================
// RESOURCES
// ============================================================================

/// A buffer entry: one GPU allocation plus CPU metadata
pub struct BufferResource {
    name: StringId,
    size: u64,
    usage: BufferUsage,
    memory: MemoryKind,
    allocation: GpuAllocation,
}

impl BufferResource {
    pub fn name(&self) -> StringId {
        self.name
    }
    pub fn size(&self) -> u64 {
        self.size
    }
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
    pub fn memory(&self) -> MemoryKind {
        self.memory
    }
    pub fn allocation(&self) -> &GpuAllocation {
        &self.allocation
    }
}

/// A texture entry: one GPU allocation plus CPU metadata
///
/// The allocation is `None` only transiently, between destroy and recreate
/// inside `update_resolution`.
pub struct TextureResource {
    name: StringId,
    extent: UVec2,
    format: TextureFormat,
    usage: TextureUsage,
    resolution_dependent: bool,
    resolution_scale: f32,
    allocation: Option<GpuAllocation>,
}

impl TextureResource {
    pub fn name(&self) -> StringId {
        self.name
    }
    pub fn extent(&self) -> UVec2 {
        self.extent
    }
    pub fn format(&self) -> TextureFormat {
        self.format
    }
    pub fn usage(&self) -> TextureUsage {
        self.usage
    }
    pub fn is_resolution_dependent(&self) -> bool {
        self.resolution_dependent
    }
    pub fn allocation(&self) -> Option<&GpuAllocation> {
        self.allocation.as_ref()
    }

    fn byte_size(extent: UVec2, format: TextureFormat) -> u64 {
        extent.x as u64 * extent.y as u64 * format.bytes_per_pixel()
    }
}

/// A framebuffer entry: texture attachments resolved to handles.
///
/// Owns no GPU allocation of its own; the attached textures do.
pub struct FramebufferResource {
    name: StringId,
    color_attachments: Vec<Handle>,
    depth_attachment: Option<Handle>,
    extent: UVec2,
}

impl FramebufferResource {
    pub fn name(&self) -> StringId {
        self.name
    }
    pub fn color_attachments(&self) -> &[Handle] {
        &self.color_attachments
    }
    pub fn depth_attachment(&self) -> Option<Handle> {
        self.depth_attachment
    }
    pub fn extent(&self) -> UVec2 {
        self.extent
    }
}

// ============================================================================
// RESOURCE TABLE
// ============================================================================

/// Named, generation-checked storage for all GPU resources
pub struct ResourceTable {
    buffers: HandlePool<BufferResource>,
    textures: HandlePool<TextureResource>,
    framebuffers: HandlePool<FramebufferResource>,
    buffer_names: FxHashMap<StringId, Handle>,
    texture_names: FxHashMap<StringId, Handle>,
    framebuffer_names: FxHashMap<StringId, Handle>,
    resolution: UVec2,
}

impl ResourceTable {
    /// Create an empty table at the given screen resolution
    pub fn new(resolution: UVec2) -> Self {
        Self {
            buffers: HandlePool::new(),
            textures: HandlePool::new(),
            framebuffers: HandlePool::new(),
            buffer_names: FxHashMap::default(),
            texture_names: FxHashMap::default(),
            framebuffer_names: FxHashMap::default(),
            resolution,
        }
    }

    /// Current screen resolution used for resolution-dependent resources
    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    // ===== BUFFERS =====

    /// Create a named buffer
    ///
    /// Returns `Handle::NULL` (without touching the existing resource) if
    /// the name is taken and `allow_replace` is false; with `allow_replace`
    /// the existing buffer is destroyed first.
    ///
    /// # Errors
    ///
    /// Returns an error on name-hash collision or GPU out-of-memory.
    pub fn add_buffer(
        &mut self,
        desc: &BufferDesc,
        allow_replace: bool,
        strings: &mut StringRegistry,
        allocator: &mut DynamicGpuAllocator,
    ) -> Result<Handle> {
        if desc.size == 0 {
            engine_bail!("nebula3d::ResourceTable", "buffer '{}' has zero size", desc.name);
        }
        let name = strings.intern(&desc.name)?;
        if self.buffer_names.contains_key(&name) {
            if !allow_replace {
                engine_warn!("nebula3d::ResourceTable",
                    "buffer '{}' already exists", desc.name);
                return Ok(Handle::NULL);
            }
            self.remove_buffer(&desc.name, allocator);
        }

        let alignment = if desc.usage.contains(BufferUsage::CONSTANT) {
            CONSTANT_BUFFER_ALIGN
        } else {
            BUFFER_ALIGN
        };
        let allocation = allocator.allocate(desc.memory, desc.size, alignment, name)?;

        let handle = self.buffers.insert(BufferResource {
            name,
            size: desc.size,
            usage: desc.usage,
            memory: desc.memory,
            allocation,
        });
        self.buffer_names.insert(name, handle);
        Ok(handle)
    }

    /// Handle of a named buffer, `Handle::NULL` if absent
    pub fn buffer_handle(&self, name: &str) -> Handle {
        self.buffer_names
            .get(&StringId::of(name))
            .copied()
            .unwrap_or(Handle::NULL)
    }

    /// Look up a buffer (generation-checked)
    pub fn buffer(&self, handle: Handle) -> Option<&BufferResource> {
        self.buffers.get(handle)
    }

    /// Whether a buffer handle still resolves (no staleness assert)
    pub fn buffer_is_valid(&self, handle: Handle) -> bool {
        self.buffers.is_valid(handle)
    }

    /// Destroy a named buffer; a no-op if absent
    ///
    /// The GPU allocation goes back to the allocator and every outstanding
    /// handle to the buffer goes stale.
    pub fn remove_buffer(&mut self, name: &str, allocator: &mut DynamicGpuAllocator) -> bool {
        let Some(handle) = self.buffer_names.remove(&StringId::of(name)) else {
            return false;
        };
        if let Some(buffer) = self.buffers.remove(handle) {
            allocator.deallocate(buffer.allocation);
        }
        true
    }

    /// Number of live buffers
    pub fn buffer_count(&self) -> u32 {
        self.buffers.len()
    }

    // ===== TEXTURES =====

    /// Create a named texture
    ///
    /// Same replace policy as `add_buffer`. Resolution-dependent textures
    /// derive their extent from the current resolution and
    /// `desc.resolution_scale`.
    pub fn add_texture(
        &mut self,
        desc: &TextureDesc,
        allow_replace: bool,
        strings: &mut StringRegistry,
        allocator: &mut DynamicGpuAllocator,
    ) -> Result<Handle> {
        let extent = if desc.resolution_dependent {
            scaled_extent(self.resolution, desc.resolution_scale)
        } else {
            desc.extent
        };
        if extent.x == 0 || extent.y == 0 {
            engine_bail!("nebula3d::ResourceTable",
                "texture '{}' has zero extent {}x{}", desc.name, extent.x, extent.y);
        }
        let name = strings.intern(&desc.name)?;
        if self.texture_names.contains_key(&name) {
            if !allow_replace {
                engine_warn!("nebula3d::ResourceTable",
                    "texture '{}' already exists", desc.name);
                return Ok(Handle::NULL);
            }
            self.remove_texture(&desc.name, allocator);
        }

        let size = TextureResource::byte_size(extent, desc.format);
        let allocation = allocator.allocate(MemoryKind::Device, size, TEXTURE_ALIGN, name)?;

        let handle = self.textures.insert(TextureResource {
            name,
            extent,
            format: desc.format,
            usage: desc.usage,
            resolution_dependent: desc.resolution_dependent,
            resolution_scale: desc.resolution_scale,
            allocation: Some(allocation),
        });
        self.texture_names.insert(name, handle);
        Ok(handle)
    }

    /// Handle of a named texture, `Handle::NULL` if absent
    pub fn texture_handle(&self, name: &str) -> Handle {
        self.texture_names
            .get(&StringId::of(name))
            .copied()
            .unwrap_or(Handle::NULL)
    }

    /// Look up a texture (generation-checked)
    pub fn texture(&self, handle: Handle) -> Option<&TextureResource> {
        self.textures.get(handle)
    }

    /// Whether a texture handle still resolves (no staleness assert)
    pub fn texture_is_valid(&self, handle: Handle) -> bool {
        self.textures.is_valid(handle)
    }

    /// Destroy a named texture; a no-op if absent
    pub fn remove_texture(&mut self, name: &str, allocator: &mut DynamicGpuAllocator) -> bool {
        let Some(handle) = self.texture_names.remove(&StringId::of(name)) else {
            return false;
        };
        if let Some(texture) = self.textures.remove(handle) {
            if let Some(allocation) = texture.allocation {
                allocator.deallocate(allocation);
            }
        }
        true
    }

    /// Number of live textures
    pub fn texture_count(&self) -> u32 {
        self.textures.len()
    }

    // ===== FRAMEBUFFERS =====

    /// Create a named framebuffer from texture attachments
    ///
    /// All attachments must exist and share one extent. Same replace policy
    /// as `add_buffer`.
    pub fn add_framebuffer(
        &mut self,
        desc: &FramebufferDesc,
        allow_replace: bool,
        strings: &mut StringRegistry,
        allocator: &mut DynamicGpuAllocator,
    ) -> Result<Handle> {
        let name = strings.intern(&desc.name)?;
        if self.framebuffer_names.contains_key(&name) {
            if !allow_replace {
                engine_warn!("nebula3d::ResourceTable",
                    "framebuffer '{}' already exists", desc.name);
                return Ok(Handle::NULL);
            }
            self.remove_framebuffer(&desc.name, allocator);
        }

        let (color_attachments, depth_attachment, extent) =
            self.resolve_attachments(&desc.name, &desc.color_attachments, desc.depth_attachment.as_deref())?;

        let handle = self.framebuffers.insert(FramebufferResource {
            name,
            color_attachments,
            depth_attachment,
            extent,
        });
        self.framebuffer_names.insert(name, handle);
        Ok(handle)
    }

    /// Handle of a named framebuffer, `Handle::NULL` if absent
    pub fn framebuffer_handle(&self, name: &str) -> Handle {
        self.framebuffer_names
            .get(&StringId::of(name))
            .copied()
            .unwrap_or(Handle::NULL)
    }

    /// Look up a framebuffer (generation-checked)
    pub fn framebuffer(&self, handle: Handle) -> Option<&FramebufferResource> {
        self.framebuffers.get(handle)
    }

    /// Whether a framebuffer handle still resolves (no staleness assert)
    pub fn framebuffer_is_valid(&self, handle: Handle) -> bool {
        self.framebuffers.is_valid(handle)
    }

    /// Destroy a named framebuffer; a no-op if absent
    ///
    /// The attached textures are not touched.
    pub fn remove_framebuffer(&mut self, name: &str, _allocator: &mut DynamicGpuAllocator) -> bool {
        let Some(handle) = self.framebuffer_names.remove(&StringId::of(name)) else {
            return false;
        };
        self.framebuffers.remove(handle).is_some()
    }

    /// Number of live framebuffers
    pub fn framebuffer_count(&self) -> u32 {
        self.framebuffers.len()
    }

    fn resolve_attachments(
        &self,
        framebuffer_name: &str,
        color_names: &[String],
        depth_name: Option<&str>,
    ) -> Result<(Vec<Handle>, Option<Handle>, UVec2)> {
        let mut extent: Option<UVec2> = None;
        let mut check = |table: &Self, attachment: &str| -> Result<Handle> {
            let handle = table.texture_handle(attachment);
            let Some(texture) = table.texture(handle) else {
                engine_bail!("nebula3d::ResourceTable",
                    "framebuffer '{}': attachment '{}' not found",
                    framebuffer_name, attachment);
            };
            if let Some(expected) = extent {
                if texture.extent() != expected {
                    engine_bail!("nebula3d::ResourceTable",
                        "framebuffer '{}': attachment '{}' extent {}x{} differs from {}x{}",
                        framebuffer_name, attachment,
                        texture.extent().x, texture.extent().y, expected.x, expected.y);
                }
            } else {
                extent = Some(texture.extent());
            }
            Ok(handle)
        };

        let mut colors = Vec::with_capacity(color_names.len());
        for attachment in color_names {
            colors.push(check(self, attachment)?);
        }
        let depth = match depth_name {
            Some(attachment) => Some(check(self, attachment)?),
            None => None,
        };

        let Some(extent) = extent else {
            engine_bail!("nebula3d::ResourceTable",
                "framebuffer '{}' has no attachments", framebuffer_name);
        };
        Ok((colors, depth, extent))
    }

    // ===== RESOLUTION =====

    /// Destroy and recreate all resolution-dependent resources at a new
    /// screen resolution
    ///
    /// Call exactly once after a detected window/backbuffer size change,
    /// never speculatively per frame. Non-resolution-dependent resources
    /// and their handles are untouched; resolution-dependent textures are
    /// recreated in place, so their handles stay valid too.
    ///
    /// # Errors
    ///
    /// A resource whose recreation fails (out of memory) is removed from
    /// the table - never silently substituted - and reported in the
    /// returned error. Remaining resources are still processed.
    pub fn update_resolution(
        &mut self,
        new_resolution: UVec2,
        allocator: &mut DynamicGpuAllocator,
    ) -> Result<()> {
        if new_resolution.x == 0 || new_resolution.y == 0 {
            engine_bail!("nebula3d::ResourceTable",
                "resolution {}x{} is invalid", new_resolution.x, new_resolution.y);
        }
        if new_resolution == self.resolution {
            return Ok(());
        }
        engine_info!("nebula3d::ResourceTable",
            "resolution change {}x{} -> {}x{}",
            self.resolution.x, self.resolution.y, new_resolution.x, new_resolution.y);
        self.resolution = new_resolution;

        let mut failed: Vec<StringId> = Vec::new();

        // Recreate resolution-dependent textures in place (handles stay
        // valid). The old region is freed first so the recreation can
        // reuse it.
        for handle in self.textures.handles() {
            let texture = self.textures.get_mut(handle).expect("live handle");
            if !texture.resolution_dependent {
                continue;
            }
            let name = texture.name;
            let format = texture.format;
            let new_extent = scaled_extent(new_resolution, texture.resolution_scale);

            if let Some(old) = texture.allocation.take() {
                allocator.deallocate(old);
            }
            let size = TextureResource::byte_size(new_extent, format);
            match allocator.allocate(MemoryKind::Device, size, TEXTURE_ALIGN, name) {
                Ok(allocation) => {
                    let texture = self.textures.get_mut(handle).expect("live handle");
                    texture.allocation = Some(allocation);
                    texture.extent = new_extent;
                }
                Err(_) => {
                    // Failed recreation leaves the entry absent.
                    self.textures.remove(handle);
                    self.texture_names.remove(&name);
                    failed.push(name);
                }
            }
        }

        // Refresh framebuffer extents; drop framebuffers whose attachments
        // went away.
        for handle in self.framebuffers.handles() {
            let framebuffer = self.framebuffers.get(handle).expect("live handle");
            let mut extent: Option<UVec2> = None;
            let mut broken = false;
            for attachment in framebuffer
                .color_attachments
                .iter()
                .copied()
                .chain(framebuffer.depth_attachment)
            {
                // An attachment whose texture failed recreation is stale
                // here; that breaks the framebuffer, it is not a
                // programmer error.
                if !self.textures.is_valid(attachment) {
                    broken = true;
                    break;
                }
                let texture = self.textures.get(attachment).expect("valid handle");
                match extent {
                    None => extent = Some(texture.extent),
                    Some(expected) if expected == texture.extent => {}
                    Some(_) => {
                        broken = true;
                        break;
                    }
                }
            }
            match (broken, extent) {
                (false, Some(extent)) => {
                    self.framebuffers.get_mut(handle).expect("live handle").extent = extent;
                }
                _ => {
                    let name = framebuffer.name;
                    self.framebuffers.remove(handle);
                    self.framebuffer_names.remove(&name);
                    failed.push(name);
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            engine_error!("nebula3d::ResourceTable",
                "{} resolution-dependent resource(s) could not be recreated", failed.len());
            Err(Error::InvalidResource(format!(
                "{} resolution-dependent resource(s) not recreated at {}x{}",
                failed.len(),
                new_resolution.x,
                new_resolution.y
            )))
        }
    }

    // ===== TEARDOWN =====

    /// Destroy every resource, releasing all GPU allocations
    ///
    /// Must run before the backend owning the heaps is unloaded.
    pub fn clear(&mut self, allocator: &mut DynamicGpuAllocator) {
        for handle in self.framebuffers.handles() {
            self.framebuffers.remove(handle);
        }
        self.framebuffer_names.clear();
        for handle in self.textures.handles() {
            if let Some(texture) = self.textures.remove(handle) {
                if let Some(allocation) = texture.allocation {
                    allocator.deallocate(allocation);
                }
            }
        }
        self.texture_names.clear();
        for handle in self.buffers.handles() {
            if let Some(buffer) = self.buffers.remove(handle) {
                allocator.deallocate(buffer.allocation);
            }
        }
        self.buffer_names.clear();
    }
}

/// Extent of a resolution-dependent resource at a given screen resolution
fn scaled_extent(resolution: UVec2, scale: f32) -> UVec2 {
    debug_assert!(scale > 0.0, "resolution scale must be positive");
    UVec2::new(
        ((resolution.x as f32 * scale) as u32).max(1),
        ((resolution.y as f32 * scale) as u32).max(1),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "resource_table_tests.rs"]
mod tests;
