/// Tests for the named resource table
///
/// These validate name -> handle resolution, the uniform replace policy,
/// generation invalidation on removal and resolution-dependent recreation.

use super::*;
use crate::renderer::backend::{BackendConfig, RenderBackend};
use crate::renderer::mock_backend::MockBackend;

struct Fixture {
    table: ResourceTable,
    strings: StringRegistry,
    allocator: DynamicGpuAllocator,
    #[allow(dead_code)]
    backend: MockBackend,
}

fn fixture() -> Fixture {
    let mut backend = MockBackend::new();
    backend.init(&BackendConfig::default()).unwrap();
    let mut allocator = DynamicGpuAllocator::new();
    allocator
        .add_heap(&mut backend, MemoryKind::Device, 64 * 1024 * 1024)
        .unwrap();
    allocator
        .add_heap(&mut backend, MemoryKind::Upload, 1024 * 1024)
        .unwrap();
    Fixture {
        table: ResourceTable::new(UVec2::new(800, 600)),
        strings: StringRegistry::new(),
        allocator,
        backend,
    }
}

fn camera_cb() -> BufferDesc {
    BufferDesc {
        name: "camera_cb".to_string(),
        size: 256,
        usage: BufferUsage::CONSTANT,
        memory: MemoryKind::Upload,
    }
}

fn gbuffer_albedo() -> TextureDesc {
    TextureDesc {
        name: "gbuffer_albedo".to_string(),
        extent: UVec2::ZERO,
        format: TextureFormat::RGBA8_UNORM,
        usage: TextureUsage::SAMPLED | TextureUsage::RENDER_TARGET,
        resolution_dependent: true,
        resolution_scale: 1.0,
    }
}

// ============================================================================
// Tests: Buffers
// ============================================================================

#[test]
fn test_add_and_get_buffer() {
    let mut f = fixture();
    let handle = f
        .table
        .add_buffer(&camera_cb(), false, &mut f.strings, &mut f.allocator)
        .unwrap();
    assert!(!handle.is_null());

    let looked_up = f.table.buffer_handle("camera_cb");
    assert_eq!(looked_up, handle);

    let buffer = f.table.buffer(handle).unwrap();
    assert_eq!(buffer.size(), 256);
    assert_eq!(buffer.memory(), MemoryKind::Upload);
    // Constant buffers land on shader binding granularity.
    assert_eq!(buffer.allocation().offset() % 256, 0);
}

#[test]
fn test_buffer_handle_absent_is_null_sentinel() {
    let f = fixture();
    assert!(f.table.buffer_handle("nonexistent").is_null());
}

#[test]
fn test_add_duplicate_without_replace_returns_null() {
    let mut f = fixture();
    let first = f
        .table
        .add_buffer(&camera_cb(), false, &mut f.strings, &mut f.allocator)
        .unwrap();
    let second = f
        .table
        .add_buffer(&camera_cb(), false, &mut f.strings, &mut f.allocator)
        .unwrap();

    assert!(second.is_null());
    // The original is untouched.
    assert!(f.table.buffer(first).is_some());
    assert_eq!(f.table.buffer_count(), 1);
}

#[test]
fn test_add_duplicate_with_replace_destroys_old() {
    let mut f = fixture();
    let first = f
        .table
        .add_buffer(&camera_cb(), false, &mut f.strings, &mut f.allocator)
        .unwrap();

    let mut bigger = camera_cb();
    bigger.size = 512;
    let second = f
        .table
        .add_buffer(&bigger, true, &mut f.strings, &mut f.allocator)
        .unwrap();

    assert!(!second.is_null());
    assert_ne!(first, second);
    // The old handle is stale now.
    assert!(!f.table.buffer_is_valid(first));
    assert_eq!(f.table.buffer(second).unwrap().size(), 512);
    assert_eq!(f.table.buffer_count(), 1);
}

#[test]
fn test_remove_buffer_invalidates_handles() {
    let mut f = fixture();
    let handle = f
        .table
        .add_buffer(&camera_cb(), false, &mut f.strings, &mut f.allocator)
        .unwrap();

    assert!(f.table.remove_buffer("camera_cb", &mut f.allocator));
    assert!(f.table.buffer_handle("camera_cb").is_null());
    assert!(!f.table.buffer_is_valid(handle));
    // The GPU region went back to the allocator.
    assert_eq!(f.allocator.stats(MemoryKind::Upload).num_regions, 0);
}

#[test]
fn test_remove_absent_buffer_is_noop() {
    let mut f = fixture();
    assert!(!f.table.remove_buffer("nonexistent", &mut f.allocator));
}

#[test]
fn test_zero_size_buffer_rejected() {
    let mut f = fixture();
    let mut desc = camera_cb();
    desc.size = 0;
    assert!(f
        .table
        .add_buffer(&desc, false, &mut f.strings, &mut f.allocator)
        .is_err());
}

// ============================================================================
// Tests: Textures
// ============================================================================

#[test]
fn test_add_resolution_dependent_texture_uses_screen_extent() {
    let mut f = fixture();
    let handle = f
        .table
        .add_texture(&gbuffer_albedo(), false, &mut f.strings, &mut f.allocator)
        .unwrap();

    let texture = f.table.texture(handle).unwrap();
    assert_eq!(texture.extent(), UVec2::new(800, 600));
    assert!(texture.is_resolution_dependent());
    assert_eq!(
        texture.allocation().unwrap().size(),
        800 * 600 * 4
    );
}

#[test]
fn test_add_fixed_texture_uses_desc_extent() {
    let mut f = fixture();
    let desc = TextureDesc {
        name: "lut".to_string(),
        extent: UVec2::new(64, 64),
        format: TextureFormat::RG8_UNORM,
        usage: TextureUsage::SAMPLED,
        resolution_dependent: false,
        resolution_scale: 1.0,
    };
    let handle = f
        .table
        .add_texture(&desc, false, &mut f.strings, &mut f.allocator)
        .unwrap();
    assert_eq!(f.table.texture(handle).unwrap().extent(), UVec2::new(64, 64));
}

// ============================================================================
// Tests: Framebuffers
// ============================================================================

#[test]
fn test_framebuffer_resolves_attachments() {
    let mut f = fixture();
    f.table
        .add_texture(&gbuffer_albedo(), false, &mut f.strings, &mut f.allocator)
        .unwrap();
    let depth_desc = TextureDesc {
        name: "scene_depth".to_string(),
        extent: UVec2::ZERO,
        format: TextureFormat::DEPTH32_FLOAT,
        usage: TextureUsage::DEPTH_STENCIL,
        resolution_dependent: true,
        resolution_scale: 1.0,
    };
    f.table
        .add_texture(&depth_desc, false, &mut f.strings, &mut f.allocator)
        .unwrap();

    let fb_desc = FramebufferDesc {
        name: "gbuffer_fb".to_string(),
        color_attachments: vec!["gbuffer_albedo".to_string()],
        depth_attachment: Some("scene_depth".to_string()),
    };
    let handle = f
        .table
        .add_framebuffer(&fb_desc, false, &mut f.strings, &mut f.allocator)
        .unwrap();

    let fb = f.table.framebuffer(handle).unwrap();
    assert_eq!(fb.extent(), UVec2::new(800, 600));
    assert_eq!(fb.color_attachments().len(), 1);
    assert!(fb.depth_attachment().is_some());
}

#[test]
fn test_framebuffer_with_missing_attachment_fails() {
    let mut f = fixture();
    let fb_desc = FramebufferDesc {
        name: "broken_fb".to_string(),
        color_attachments: vec!["no_such_texture".to_string()],
        depth_attachment: None,
    };
    assert!(f
        .table
        .add_framebuffer(&fb_desc, false, &mut f.strings, &mut f.allocator)
        .is_err());
}

// ============================================================================
// Tests: Resolution updates
// ============================================================================

#[test]
fn test_update_resolution_leaves_unrelated_buffer_alone() {
    let mut f = fixture();
    let cb = f
        .table
        .add_buffer(&camera_cb(), false, &mut f.strings, &mut f.allocator)
        .unwrap();
    f.table
        .add_texture(&gbuffer_albedo(), false, &mut f.strings, &mut f.allocator)
        .unwrap();

    f.table
        .update_resolution(UVec2::new(1920, 1080), &mut f.allocator)
        .unwrap();

    // The non-resolution-dependent buffer and its handle are unchanged.
    assert_eq!(f.table.buffer_handle("camera_cb"), cb);
    let buffer = f.table.buffer(cb).unwrap();
    assert_eq!(buffer.size(), 256);
}

#[test]
fn test_update_resolution_recreates_dependent_textures() {
    let mut f = fixture();
    let tex = f
        .table
        .add_texture(&gbuffer_albedo(), false, &mut f.strings, &mut f.allocator)
        .unwrap();

    f.table
        .update_resolution(UVec2::new(1920, 1080), &mut f.allocator)
        .unwrap();

    // In-place recreation: same handle, new extent and region size.
    let texture = f.table.texture(tex).unwrap();
    assert_eq!(texture.extent(), UVec2::new(1920, 1080));
    assert_eq!(texture.allocation().unwrap().size(), 1920 * 1080 * 4);
}

#[test]
fn test_update_resolution_respects_scale() {
    let mut f = fixture();
    let mut desc = gbuffer_albedo();
    desc.name = "half_res_ao".to_string();
    desc.resolution_scale = 0.5;
    let handle = f
        .table
        .add_texture(&desc, false, &mut f.strings, &mut f.allocator)
        .unwrap();

    f.table
        .update_resolution(UVec2::new(1000, 500), &mut f.allocator)
        .unwrap();
    assert_eq!(f.table.texture(handle).unwrap().extent(), UVec2::new(500, 250));
}

#[test]
fn test_update_resolution_refreshes_framebuffer_extent() {
    let mut f = fixture();
    f.table
        .add_texture(&gbuffer_albedo(), false, &mut f.strings, &mut f.allocator)
        .unwrap();
    let fb_desc = FramebufferDesc {
        name: "gbuffer_fb".to_string(),
        color_attachments: vec!["gbuffer_albedo".to_string()],
        depth_attachment: None,
    };
    let fb = f
        .table
        .add_framebuffer(&fb_desc, false, &mut f.strings, &mut f.allocator)
        .unwrap();

    f.table
        .update_resolution(UVec2::new(1280, 720), &mut f.allocator)
        .unwrap();
    assert_eq!(f.table.framebuffer(fb).unwrap().extent(), UVec2::new(1280, 720));
}

#[test]
fn test_update_resolution_reports_failed_recreation() {
    let mut backend = MockBackend::new();
    backend.init(&BackendConfig::default()).unwrap();
    let mut allocator = DynamicGpuAllocator::new();
    // Device heap fits an 800x600 RGBA8 target but not 1920x1080.
    allocator
        .add_heap(&mut backend, MemoryKind::Device, 800 * 600 * 4 + 1024)
        .unwrap();

    let mut table = ResourceTable::new(UVec2::new(800, 600));
    let mut strings = StringRegistry::new();
    let handle = table
        .add_texture(&gbuffer_albedo(), false, &mut strings, &mut allocator)
        .unwrap();

    let result = table.update_resolution(UVec2::new(1920, 1080), &mut allocator);
    assert!(result.is_err());
    // The resource is left absent, not silently substituted.
    assert!(table.texture_handle("gbuffer_albedo").is_null());
    assert!(!table.texture_is_valid(handle));
}

#[test]
fn test_update_resolution_same_size_is_noop() {
    let mut f = fixture();
    let tex = f
        .table
        .add_texture(&gbuffer_albedo(), false, &mut f.strings, &mut f.allocator)
        .unwrap();
    f.table
        .update_resolution(UVec2::new(800, 600), &mut f.allocator)
        .unwrap();
    assert_eq!(f.table.texture(tex).unwrap().extent(), UVec2::new(800, 600));
}

// ============================================================================
// Tests: Teardown
// ============================================================================

#[test]
fn test_clear_releases_everything() {
    let mut f = fixture();
    f.table
        .add_buffer(&camera_cb(), false, &mut f.strings, &mut f.allocator)
        .unwrap();
    f.table
        .add_texture(&gbuffer_albedo(), false, &mut f.strings, &mut f.allocator)
        .unwrap();

    f.table.clear(&mut f.allocator);

    assert_eq!(f.table.buffer_count(), 0);
    assert_eq!(f.table.texture_count(), 0);
    assert_eq!(f.allocator.stats(MemoryKind::Device).num_regions, 0);
    assert_eq!(f.allocator.stats(MemoryKind::Upload).num_regions, 0);
}
