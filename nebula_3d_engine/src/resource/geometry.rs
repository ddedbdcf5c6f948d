/// CPU-side mesh data consumed by the GPU mesh manager.
///
/// A `MeshData` groups interleaved vertices, a u32 index buffer, the
/// per-component draw ranges and the materials they reference. Components
/// are validated against buffer sizes before any GPU allocation happens,
/// the same way submesh descriptors are validated against their shared
/// buffers.

use glam::{Vec2, Vec3};
use bytemuck::{Pod, Zeroable};
use crate::error::Result;
use crate::engine_bail;
use crate::resource::material::Material;

// ============================================================================
// VERTEX
// ============================================================================

/// Interleaved vertex as consumed directly by the vertex input stage.
///
/// 3 floats position + 3 floats normal + 2 floats texcoord = 32 bytes,
/// no padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
}

/// Vertex stride in bytes
pub const VERTEX_SIZE: usize = std::mem::size_of::<Vertex>();

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, texcoord: Vec2) -> Self {
        Self {
            position,
            normal,
            texcoord,
        }
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            texcoord: Vec2::ZERO,
        }
    }
}

// ============================================================================
// MESH COMPONENTS
// ============================================================================

/// A drawable range of the shared index buffer with its material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshComponent {
    /// Index into `MeshData::materials`
    pub material_idx: u32,
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Number of indices
    pub num_indices: u32,
}

/// CPU-side mesh: shared buffers plus component ranges and materials
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Interleaved vertex data
    pub vertices: Vec<Vertex>,
    /// u32 indices into `vertices`
    pub indices: Vec<u32>,
    /// Drawable ranges, each referencing a material
    pub components: Vec<MeshComponent>,
    /// Materials referenced by components
    pub materials: Vec<Material>,
}

impl MeshData {
    /// Validate component ranges and material references
    ///
    /// # Errors
    ///
    /// Returns an error if a component's index range overflows or exceeds
    /// the index buffer, or references a material that does not exist.
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() {
            engine_bail!("nebula3d::MeshData", "mesh has no vertices");
        }
        if self.indices.is_empty() {
            engine_bail!("nebula3d::MeshData", "mesh has no indices");
        }
        if self.materials.is_empty() {
            engine_bail!("nebula3d::MeshData", "mesh has no materials");
        }
        for (i, component) in self.components.iter().enumerate() {
            let index_end = component
                .first_index
                .checked_add(component.num_indices)
                .ok_or_else(|| crate::engine_err!("nebula3d::MeshData",
                    "index range overflow in component {}", i))?;

            if index_end > self.indices.len() as u32 {
                engine_bail!("nebula3d::MeshData",
                    "component {} index range [{}, {}) exceeds index count {}",
                    i, component.first_index, index_end, self.indices.len());
            }
            if component.material_idx as usize >= self.materials.len() {
                engine_bail!("nebula3d::MeshData",
                    "component {} references material {} but only {} exist",
                    i, component.material_idx, self.materials.len());
            }
        }
        Ok(())
    }

    /// Size of the vertex data in bytes
    pub fn vertex_bytes(&self) -> u64 {
        (self.vertices.len() * VERTEX_SIZE) as u64
    }

    /// Size of the index data in bytes
    pub fn index_bytes(&self) -> u64 {
        (self.indices.len() * std::mem::size_of::<u32>()) as u64
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod tests;
