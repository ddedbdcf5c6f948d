/// Tests for the engine context object (boot, delegation, teardown)

use super::*;
use crate::renderer::mock_backend::MockBackend;
use crate::resource::resource_table::{BufferUsage, TextureFormat, TextureUsage};

fn registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register("mock", |_config| Ok(Box::new(MockBackend::new())));
    registry
}

fn config() -> EngineConfig {
    EngineConfig {
        backend: "mock".to_string(),
        device_heap_size: 16 * 1024 * 1024,
        upload_heap_size: 4 * 1024 * 1024,
        resolution: UVec2::new(800, 600),
        ..EngineConfig::default()
    }
}

fn engine() -> Engine {
    Engine::new(config(), registry()).unwrap()
}

// ============================================================================
// Tests: Boot
// ============================================================================

#[test]
fn test_new_loads_backend_and_creates_heaps() {
    let engine = engine();
    assert!(engine.is_running());

    let stats = engine.backend_stats().unwrap();
    assert_eq!(stats.heap_count, 2);
    assert_eq!(stats.heap_bytes, 16 * 1024 * 1024 + 4 * 1024 * 1024);
}

#[test]
fn test_new_with_unknown_backend_fails() {
    let mut bad = config();
    bad.backend = "quantum".to_string();
    assert!(Engine::new(bad, registry()).is_err());
}

// ============================================================================
// Tests: Resource delegation
// ============================================================================

#[test]
fn test_buffer_roundtrip_through_engine() {
    let mut engine = engine();
    let desc = BufferDesc {
        name: "camera_cb".to_string(),
        size: 256,
        usage: BufferUsage::CONSTANT,
        memory: MemoryKind::Upload,
    };
    let handle = engine.add_buffer(&desc, false).unwrap();
    assert_eq!(engine.resources().buffer_handle("camera_cb"), handle);

    assert!(engine.remove_buffer("camera_cb"));
    assert!(engine.resources().buffer_handle("camera_cb").is_null());
}

#[test]
fn test_update_resolution_through_engine() {
    let mut engine = engine();
    let desc = TextureDesc {
        name: "scene_color".to_string(),
        extent: UVec2::ZERO,
        format: TextureFormat::RGBA16_FLOAT,
        usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        resolution_dependent: true,
        resolution_scale: 1.0,
    };
    let handle = engine.add_texture(&desc, false).unwrap();

    engine.update_resolution(UVec2::new(1920, 1080)).unwrap();
    assert_eq!(
        engine.resources().texture(handle).unwrap().extent(),
        UVec2::new(1920, 1080)
    );
}

// ============================================================================
// Tests: Frame loop
// ============================================================================

#[test]
fn test_frame_loop_with_stage_input() {
    let mut engine = engine();
    engine
        .register_render_pipeline(RenderPipelineDesc {
            name: "forward".to_string(),
            vertex_shader: "forward_vs".to_string(),
            pixel_shader: "forward_ps".to_string(),
        })
        .unwrap();
    engine
        .add_stage(&StageDesc::render_pass("geometry", "forward").with_constant_buffer(0, 256))
        .unwrap();

    for _ in 0..3 {
        engine.begin_frame().unwrap();
        engine.begin_stage_input("geometry").unwrap();
        assert!(engine.set_constant_buffer(0, &[1u8; 128]).unwrap());
        // Unbound register: a miss, not an error.
        assert!(!engine.set_constant_buffer(5, &[1u8; 16]).unwrap());
        engine.end_stage_input().unwrap();
        engine.proceed_past_barrier().unwrap();
    }
}

// ============================================================================
// Tests: Growth / swap / teardown
// ============================================================================

#[test]
fn test_grow_heap_after_oom() {
    let mut small = config();
    small.device_heap_size = 1024;
    let mut engine = Engine::new(small, registry()).unwrap();

    let desc = TextureDesc {
        name: "big".to_string(),
        extent: UVec2::new(256, 256),
        format: TextureFormat::RGBA8_UNORM,
        usage: TextureUsage::SAMPLED,
        resolution_dependent: false,
        resolution_scale: 1.0,
    };
    assert_eq!(engine.add_texture(&desc, false).unwrap_err(), Error::OutOfMemory);

    engine.grow_heap(MemoryKind::Device, 1024 * 1024).unwrap();
    assert!(!engine.add_texture(&desc, false).unwrap().is_null());
}

#[test]
fn test_swap_backend_clears_resources() {
    let mut engine = engine();
    let desc = BufferDesc {
        name: "camera_cb".to_string(),
        size: 256,
        usage: BufferUsage::CONSTANT,
        memory: MemoryKind::Upload,
    };
    engine.add_buffer(&desc, false).unwrap();

    engine.swap_backend("mock").unwrap();

    // The old backend's resources did not survive the swap.
    assert!(engine.resources().buffer_handle("camera_cb").is_null());
    assert!(engine.is_running());
    // Fresh heaps exist on the new backend.
    assert_eq!(engine.backend_stats().unwrap().heap_count, 2);
}

#[test]
fn test_shutdown_is_idempotent() {
    let mut engine = engine();
    engine.shutdown();
    assert!(!engine.is_running());
    engine.shutdown();
    assert!(engine.backend_stats().is_none());
}

#[test]
fn test_mesh_lifecycle_through_engine() {
    use glam::{Vec2, Vec3};
    use crate::resource::geometry::{MeshComponent, Vertex};
    use crate::resource::material::Material;

    let mut engine = engine();
    let mesh = MeshData {
        vertices: vec![
            Vertex::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO),
            Vertex::new(Vec3::X, Vec3::Z, Vec2::X),
            Vertex::new(Vec3::Y, Vec3::Z, Vec2::Y),
        ],
        indices: vec![0, 1, 2],
        components: vec![MeshComponent {
            material_idx: 0,
            first_index: 0,
            num_indices: 3,
        }],
        materials: vec![Material::default()],
    };

    let mut gpu_mesh = engine.create_gpu_mesh("triangle", &mesh).unwrap();
    assert!(gpu_mesh.is_allocated());
    assert_eq!(gpu_mesh.num_materials(), 1);

    engine.destroy_gpu_mesh(&mut gpu_mesh);
    assert!(!gpu_mesh.is_allocated());
    assert_eq!(engine.memory_stats(MemoryKind::Device).num_regions, 0);
}
