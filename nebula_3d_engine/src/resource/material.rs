/// Material resources and their GPU-visible packed layout.
///
/// A `Material` is a pure data description of a surface. The GPU-visible
/// form is NOT a `#[repr(C)]` struct: it is written field by field through
/// an explicit layout descriptor (name, byte offset, width), so the byte
/// image is identical regardless of compiler struct layout and can double
/// as an on-disk form.

use glam::Vec3;
use crate::error::Result;
use crate::engine_bail;

/// Sentinel for an unbound texture slot
pub const NO_TEXTURE: u16 = u16::MAX;

// ============================================================================
// CPU MATERIAL
// ============================================================================

/// Surface description as authored/edited on the CPU
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Base color, RGBA8
    pub albedo: [u8; 4],
    /// Perceptual roughness, 0 = mirror, 255 = fully diffuse
    pub roughness: u8,
    /// Metallic factor, 0 = dielectric, 255 = metal
    pub metallic: u8,
    /// Emissive radiance
    pub emissive: Vec3,
    /// Texture indices into the bound texture array (NO_TEXTURE = unbound)
    pub albedo_tex: u16,
    pub metallic_roughness_tex: u16,
    pub normal_tex: u16,
    pub occlusion_tex: u16,
    pub emissive_tex: u16,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: [255, 255, 255, 255],
            roughness: 255,
            metallic: 0,
            emissive: Vec3::ZERO,
            albedo_tex: NO_TEXTURE,
            metallic_roughness_tex: NO_TEXTURE,
            normal_tex: NO_TEXTURE,
            occlusion_tex: NO_TEXTURE,
            emissive_tex: NO_TEXTURE,
        }
    }
}

// ============================================================================
// GPU LAYOUT DESCRIPTOR
// ============================================================================

/// One field of the packed GPU material layout
#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    pub name: &'static str,
    pub offset: usize,
    pub size: usize,
}

/// Total size of the packed material. A multiple of 4-byte words; the two
/// padding holes (bytes 6-7 and 30-31) are always zero.
pub const SHADER_MATERIAL_SIZE: usize = 32;

/// Field table driving `Material::to_shader_bytes`/`from_shader_bytes`.
///
/// Offsets are part of the shader contract; they never depend on how the
/// compiler would lay out an equivalent struct.
pub const SHADER_MATERIAL_LAYOUT: [FieldLayout; 9] = [
    FieldLayout { name: "albedo",                offset: 0,  size: 4 },
    FieldLayout { name: "roughness",             offset: 4,  size: 1 },
    FieldLayout { name: "metallic",              offset: 5,  size: 1 },
    // bytes 6-7: padding
    FieldLayout { name: "emissive",              offset: 8,  size: 12 },
    FieldLayout { name: "albedo_tex",            offset: 20, size: 2 },
    FieldLayout { name: "metallic_roughness_tex", offset: 22, size: 2 },
    FieldLayout { name: "normal_tex",            offset: 24, size: 2 },
    FieldLayout { name: "occlusion_tex",         offset: 26, size: 2 },
    FieldLayout { name: "emissive_tex",          offset: 28, size: 2 },
    // bytes 30-31: padding
];

fn field(name: &'static str) -> &'static FieldLayout {
    SHADER_MATERIAL_LAYOUT
        .iter()
        .find(|f| f.name == name)
        .expect("unknown shader material field")
}

fn put(dst: &mut [u8; SHADER_MATERIAL_SIZE], name: &'static str, src: &[u8]) {
    let f = field(name);
    debug_assert_eq!(src.len(), f.size, "field '{}' width mismatch", name);
    dst[f.offset..f.offset + f.size].copy_from_slice(src);
}

fn get<'a>(src: &'a [u8; SHADER_MATERIAL_SIZE], name: &'static str) -> &'a [u8] {
    let f = field(name);
    &src[f.offset..f.offset + f.size]
}

impl Material {
    /// Pack into the GPU-visible byte layout (bit-exact, little-endian)
    pub fn to_shader_bytes(&self) -> [u8; SHADER_MATERIAL_SIZE] {
        let mut bytes = [0u8; SHADER_MATERIAL_SIZE];
        put(&mut bytes, "albedo", &self.albedo);
        put(&mut bytes, "roughness", &[self.roughness]);
        put(&mut bytes, "metallic", &[self.metallic]);

        let mut emissive = [0u8; 12];
        emissive[0..4].copy_from_slice(&self.emissive.x.to_le_bytes());
        emissive[4..8].copy_from_slice(&self.emissive.y.to_le_bytes());
        emissive[8..12].copy_from_slice(&self.emissive.z.to_le_bytes());
        put(&mut bytes, "emissive", &emissive);

        put(&mut bytes, "albedo_tex", &self.albedo_tex.to_le_bytes());
        put(&mut bytes, "metallic_roughness_tex", &self.metallic_roughness_tex.to_le_bytes());
        put(&mut bytes, "normal_tex", &self.normal_tex.to_le_bytes());
        put(&mut bytes, "occlusion_tex", &self.occlusion_tex.to_le_bytes());
        put(&mut bytes, "emissive_tex", &self.emissive_tex.to_le_bytes());
        bytes
    }

    /// Unpack from the GPU-visible byte layout
    ///
    /// Inverse of `to_shader_bytes`; round-trips are bit-exact.
    pub fn from_shader_bytes(bytes: &[u8; SHADER_MATERIAL_SIZE]) -> Material {
        let u16_at = |name| {
            let b = get(bytes, name);
            u16::from_le_bytes([b[0], b[1]])
        };
        let emissive = get(bytes, "emissive");
        let f32_at = |i: usize| {
            f32::from_le_bytes([
                emissive[i * 4],
                emissive[i * 4 + 1],
                emissive[i * 4 + 2],
                emissive[i * 4 + 3],
            ])
        };

        let albedo_bytes = get(bytes, "albedo");
        Material {
            albedo: [albedo_bytes[0], albedo_bytes[1], albedo_bytes[2], albedo_bytes[3]],
            roughness: get(bytes, "roughness")[0],
            metallic: get(bytes, "metallic")[0],
            emissive: Vec3::new(f32_at(0), f32_at(1), f32_at(2)),
            albedo_tex: u16_at("albedo_tex"),
            metallic_roughness_tex: u16_at("metallic_roughness_tex"),
            normal_tex: u16_at("normal_tex"),
            occlusion_tex: u16_at("occlusion_tex"),
            emissive_tex: u16_at("emissive_tex"),
        }
    }

    /// Pack a slice of materials into one contiguous GPU buffer image
    pub fn pack_slice(materials: &[Material]) -> Vec<u8> {
        let mut out = Vec::with_capacity(materials.len() * SHADER_MATERIAL_SIZE);
        for material in materials {
            out.extend_from_slice(&material.to_shader_bytes());
        }
        out
    }
}

/// Validate the layout table: in-bounds, ascending, non-overlapping
///
/// Called from `debug_assert!` paths and tests; the table is a constant, so
/// a violation is a build-time authoring mistake.
pub fn validate_shader_material_layout() -> Result<()> {
    if SHADER_MATERIAL_SIZE % 4 != 0 {
        engine_bail!("nebula3d::Material", "packed material size must be a multiple of 4");
    }
    let mut end = 0usize;
    for f in SHADER_MATERIAL_LAYOUT.iter() {
        if f.offset < end {
            engine_bail!("nebula3d::Material",
                "field '{}' overlaps the previous field", f.name);
        }
        if f.offset + f.size > SHADER_MATERIAL_SIZE {
            engine_bail!("nebula3d::Material",
                "field '{}' exceeds the packed material size", f.name);
        }
        end = f.offset + f.size;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
