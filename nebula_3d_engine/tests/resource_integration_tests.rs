/// Integration tests: full resource lifecycle on the headless backend
///
/// Walks the paths an application actually takes: boot, populate the
/// resource table, build a stage pipeline, upload meshes, run frames,
/// resize, tear down.

use nebula_3d_engine::nebula3d::render::{BackendRegistry, MemoryKind};
use nebula_3d_engine::nebula3d::resource::{
    BufferDesc, BufferUsage, FramebufferDesc, MeshComponent, MeshData, Material, TextureDesc,
    TextureFormat, TextureUsage, Vertex,
};
use nebula_3d_engine::nebula3d::stage::{RenderPipelineDesc, StageDesc};
use nebula_3d_engine::nebula3d::{Engine, EngineConfig};
use nebula_3d_engine::glam::{UVec2, Vec2, Vec3};

fn engine() -> Engine {
    let mut registry = BackendRegistry::new();
    nebula_3d_engine_renderer_headless::register(&mut registry);
    let config = EngineConfig {
        backend: "headless".to_string(),
        device_heap_size: 64 * 1024 * 1024,
        upload_heap_size: 8 * 1024 * 1024,
        resolution: UVec2::new(800, 600),
        ..EngineConfig::default()
    };
    Engine::new(config, registry).unwrap()
}

fn quad() -> MeshData {
    MeshData {
        vertices: vec![
            Vertex::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::Z, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(1.0, -1.0, 0.0), Vec3::Z, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(1.0, 1.0, 0.0), Vec3::Z, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::Z, Vec2::new(0.0, 1.0)),
        ],
        indices: vec![0, 1, 2, 2, 3, 0],
        components: vec![MeshComponent {
            material_idx: 0,
            first_index: 0,
            num_indices: 6,
        }],
        materials: vec![Material::default()],
    }
}

#[test]
fn test_resource_population_and_lookup() {
    let mut engine = engine();

    let cb = engine
        .add_buffer(
            &BufferDesc {
                name: "camera_cb".to_string(),
                size: 256,
                usage: BufferUsage::CONSTANT,
                memory: MemoryKind::Upload,
            },
            false,
        )
        .unwrap();
    engine
        .add_texture(
            &TextureDesc {
                name: "scene_color".to_string(),
                extent: UVec2::ZERO,
                format: TextureFormat::RGBA16_FLOAT,
                usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                resolution_dependent: true,
                resolution_scale: 1.0,
            },
            false,
        )
        .unwrap();
    engine
        .add_framebuffer(
            &FramebufferDesc {
                name: "scene_fb".to_string(),
                color_attachments: vec!["scene_color".to_string()],
                depth_attachment: None,
            },
            false,
        )
        .unwrap();

    assert_eq!(engine.resources().buffer_handle("camera_cb"), cb);
    assert!(!engine.resources().texture_handle("scene_color").is_null());
    assert!(!engine.resources().framebuffer_handle("scene_fb").is_null());
    assert!(engine.resources().buffer_handle("unknown").is_null());
}

#[test]
fn test_resize_keeps_unrelated_resources_valid() {
    let mut engine = engine();
    let cb = engine
        .add_buffer(
            &BufferDesc {
                name: "camera_cb".to_string(),
                size: 256,
                usage: BufferUsage::CONSTANT,
                memory: MemoryKind::Upload,
            },
            false,
        )
        .unwrap();
    let color = engine
        .add_texture(
            &TextureDesc {
                name: "scene_color".to_string(),
                extent: UVec2::ZERO,
                format: TextureFormat::RGBA8_UNORM,
                usage: TextureUsage::RENDER_TARGET,
                resolution_dependent: true,
                resolution_scale: 1.0,
            },
            false,
        )
        .unwrap();

    engine.update_resolution(UVec2::new(2560, 1440)).unwrap();

    // "camera_cb" is not resolution-dependent: same handle, same data.
    assert_eq!(engine.resources().buffer_handle("camera_cb"), cb);
    assert_eq!(engine.resources().buffer(cb).unwrap().size(), 256);
    // The render target was recreated at the new size under the same handle.
    assert_eq!(
        engine.resources().texture(color).unwrap().extent(),
        UVec2::new(2560, 1440)
    );
}

#[test]
fn test_mesh_upload_and_per_frame_loop() {
    let mut engine = engine();

    let mesh = quad();
    let mut gpu_mesh = engine.create_gpu_mesh("quad", &mesh).unwrap();
    assert_eq!(gpu_mesh.num_vertices(), 4);
    assert_eq!(gpu_mesh.num_indices(), 6);
    assert_eq!(gpu_mesh.num_materials(), 1);
    // Staging memory was released after the blocking upload.
    assert_eq!(engine.memory_stats(MemoryKind::Upload).num_regions, 0);

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
    engine.add_stage(&StageDesc::barrier("present_sync")).unwrap();

    // Steady-state loop: one advance per frame, constant data written to
    // the next frame's slot while this frame's slot stays untouched.
    for frame in 0u32..4 {
        engine.begin_frame().unwrap();
        engine.begin_stage_input("geometry").unwrap();
        let data = frame.to_le_bytes();
        assert!(engine.set_constant_buffer(0, &data).unwrap());
        engine.end_stage_input().unwrap();
        engine.proceed_past_barrier().unwrap();
    }

    engine.destroy_gpu_mesh(&mut gpu_mesh);
    assert_eq!(engine.memory_stats(MemoryKind::Device).num_regions, 0);
}

#[test]
fn test_barrier_scoped_stage_names_via_engine() {
    let mut engine = engine();
    engine
        .register_render_pipeline(RenderPipelineDesc {
            name: "forward".to_string(),
            vertex_shader: "vs".to_string(),
            pixel_shader: "ps".to_string(),
        })
        .unwrap();

    engine.add_stage(&StageDesc::render_pass("blur", "forward")).unwrap();
    engine.add_stage(&StageDesc::barrier("sync")).unwrap();
    engine.add_stage(&StageDesc::render_pass("blur", "forward")).unwrap();

    let state = engine.renderer_state();
    assert_eq!(state.find_active_stage_idx("blur"), 0);

    engine.proceed_past_barrier().unwrap();
    assert_eq!(engine.renderer_state().find_active_stage_idx("blur"), 2);
}

#[test]
fn test_teardown_leaves_no_live_regions() {
    let mut engine = engine();
    engine
        .add_buffer(
            &BufferDesc {
                name: "instance_data".to_string(),
                size: 4096,
                usage: BufferUsage::STORAGE,
                memory: MemoryKind::Device,
            },
            false,
        )
        .unwrap();
    let mesh = quad();
    let mut gpu_mesh = engine.create_gpu_mesh("quad", &mesh).unwrap();
    engine.destroy_gpu_mesh(&mut gpu_mesh);

    engine.shutdown();
    assert!(!engine.is_running());
}
