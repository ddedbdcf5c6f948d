/// GPU-resident meshes
///
/// Converts CPU-side `MeshData` into device-local vertex/index/material
/// regions. Allocation and population are separate steps: `allocate` only
/// reserves, `upload_blocking` stages the data through an upload-visible
/// region and blocks on the copy queue. Used for initial-load paths, never
/// inside the steady-state per-frame loop.
///
/// A `GpuMesh` borrows the shared allocator per call; it owns its regions
/// but not the allocator, and every region must go back through the same
/// allocator it came from.

use crate::error::Result;
use crate::engine_bail;
use crate::renderer::backend::{CopyRegion, MemoryKind, RenderBackend};
use crate::renderer::gpu_allocator::{DynamicGpuAllocator, GpuAllocation};
use crate::resource::geometry::{MeshComponent, MeshData};
use crate::resource::material::{Material, SHADER_MATERIAL_SIZE};
use crate::utils::StringId;

/// Alignment of mesh buffer regions inside their heap
const MESH_BUFFER_ALIGN: u64 = 16;

/// A mesh resident in device-local memory
///
/// CPU mirrors of the components and materials are kept for UI/debug
/// inspection; `num_materials` always matches both the mirror length and
/// the packed material buffer content.
#[derive(Default)]
pub struct GpuMesh {
    vertex_buffer: Option<GpuAllocation>,
    index_buffer: Option<GpuAllocation>,
    material_buffer: Option<GpuAllocation>,
    components: Vec<MeshComponent>,
    cpu_materials: Vec<Material>,
    num_vertices: u32,
    num_indices: u32,
    num_materials: u32,
}

impl GpuMesh {
    /// Size and reserve device-local regions for a mesh
    ///
    /// Does not populate anything; follow with `upload_blocking`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh data is invalid or a region does not
    /// fit (`Error::OutOfMemory`, recoverable).
    pub fn allocate(
        mesh: &MeshData,
        name: StringId,
        allocator: &mut DynamicGpuAllocator,
    ) -> Result<GpuMesh> {
        mesh.validate()?;

        let vertex_buffer =
            allocator.allocate(MemoryKind::Device, mesh.vertex_bytes(), MESH_BUFFER_ALIGN, name)?;
        let index_buffer = match allocator.allocate(
            MemoryKind::Device,
            mesh.index_bytes(),
            MESH_BUFFER_ALIGN,
            name,
        ) {
            Ok(allocation) => allocation,
            Err(err) => {
                allocator.deallocate(vertex_buffer);
                return Err(err);
            }
        };
        let material_bytes = (mesh.materials.len() * SHADER_MATERIAL_SIZE) as u64;
        let material_buffer =
            match allocator.allocate(MemoryKind::Device, material_bytes, MESH_BUFFER_ALIGN, name) {
                Ok(allocation) => allocation,
                Err(err) => {
                    allocator.deallocate(vertex_buffer);
                    allocator.deallocate(index_buffer);
                    return Err(err);
                }
            };

        Ok(GpuMesh {
            vertex_buffer: Some(vertex_buffer),
            index_buffer: Some(index_buffer),
            material_buffer: Some(material_buffer),
            components: mesh.components.clone(),
            cpu_materials: mesh.materials.clone(),
            num_vertices: mesh.vertices.len() as u32,
            num_indices: mesh.indices.len() as u32,
            num_materials: mesh.materials.len() as u32,
        })
    }

    /// Stage mesh data into upload memory, copy it into the reserved
    /// device regions and block until the copy queue finishes
    ///
    /// `mesh` must be the same data this mesh was allocated for (counts are
    /// checked). The staging region is freed before returning.
    pub fn upload_blocking(
        &mut self,
        mesh: &MeshData,
        allocator: &mut DynamicGpuAllocator,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let (Some(vertex_buffer), Some(index_buffer), Some(material_buffer)) = (
            self.vertex_buffer.as_ref(),
            self.index_buffer.as_ref(),
            self.material_buffer.as_ref(),
        ) else {
            engine_bail!("nebula3d::GpuMesh", "upload into an unallocated mesh");
        };

        if mesh.vertices.len() as u32 != self.num_vertices
            || mesh.indices.len() as u32 != self.num_indices
            || mesh.materials.len() as u32 != self.num_materials
        {
            engine_bail!("nebula3d::GpuMesh",
                "upload data does not match the allocated mesh ({} vertices, {} indices, {} materials)",
                self.num_vertices, self.num_indices, self.num_materials);
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let material_bytes = Material::pack_slice(&mesh.materials);

        let total = (vertex_bytes.len() + index_bytes.len() + material_bytes.len()) as u64;
        let staging = allocator.allocate(
            MemoryKind::Upload,
            total,
            MESH_BUFFER_ALIGN,
            StringId::of("mesh_staging"),
        )?;

        let heap = staging.heap();
        let base = staging.offset();
        let index_src = base + vertex_bytes.len() as u64;
        let material_src = index_src + index_bytes.len() as u64;

        let result = (|| -> Result<()> {
            backend.write_heap(heap, base, vertex_bytes)?;
            backend.write_heap(heap, index_src, index_bytes)?;
            backend.write_heap(heap, material_src, &material_bytes)?;

            backend.submit_copies(&[
                CopyRegion {
                    src: heap,
                    src_offset: base,
                    dst: vertex_buffer.heap(),
                    dst_offset: vertex_buffer.offset(),
                    size: vertex_bytes.len() as u64,
                },
                CopyRegion {
                    src: heap,
                    src_offset: index_src,
                    dst: index_buffer.heap(),
                    dst_offset: index_buffer.offset(),
                    size: index_bytes.len() as u64,
                },
                CopyRegion {
                    src: heap,
                    src_offset: material_src,
                    dst: material_buffer.heap(),
                    dst_offset: material_buffer.offset(),
                    size: material_bytes.len() as u64,
                },
            ])?;

            // Nothing is visible in the device regions until this returns.
            backend.wait_copies()
        })();

        allocator.deallocate(staging);
        result
    }

    /// Release all regions back to the allocator
    ///
    /// Idempotent: safe on a default-constructed (empty) mesh and after a
    /// previous deallocation.
    pub fn deallocate(&mut self, allocator: &mut DynamicGpuAllocator) {
        if let Some(allocation) = self.vertex_buffer.take() {
            allocator.deallocate(allocation);
        }
        if let Some(allocation) = self.index_buffer.take() {
            allocator.deallocate(allocation);
        }
        if let Some(allocation) = self.material_buffer.take() {
            allocator.deallocate(allocation);
        }
        self.components.clear();
        self.cpu_materials.clear();
        self.num_vertices = 0;
        self.num_indices = 0;
        self.num_materials = 0;
    }

    // ===== ACCESSORS =====

    /// Whether the mesh currently owns GPU regions
    pub fn is_allocated(&self) -> bool {
        self.vertex_buffer.is_some()
    }

    /// Device-local vertex region
    pub fn vertex_buffer(&self) -> Option<&GpuAllocation> {
        self.vertex_buffer.as_ref()
    }

    /// Device-local index region
    pub fn index_buffer(&self) -> Option<&GpuAllocation> {
        self.index_buffer.as_ref()
    }

    /// Device-local packed material region
    pub fn material_buffer(&self) -> Option<&GpuAllocation> {
        self.material_buffer.as_ref()
    }

    /// Per-component draw ranges (CPU mirror)
    pub fn components(&self) -> &[MeshComponent] {
        &self.components
    }

    /// CPU copies of the materials, for inspection/editing UIs
    pub fn materials(&self) -> &[Material] {
        &self.cpu_materials
    }

    pub fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    pub fn num_indices(&self) -> u32 {
        self.num_indices
    }

    pub fn num_materials(&self) -> u32 {
        self.num_materials
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "gpu_mesh_tests.rs"]
mod tests;
