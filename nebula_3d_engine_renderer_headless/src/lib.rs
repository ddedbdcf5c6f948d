/*!
# Nebula 3D Engine - Headless Renderer Backend

CPU-emulated implementation of the Nebula 3D backend interface.

Heaps are plain byte buffers and the copy queue runs synchronously, which
makes this backend a real device for tools, CI and engine tests: every
resource-lifecycle path (heap creation, staged uploads, blocking copies,
init/deinit idempotency) behaves like a GPU backend without needing one.

The backend registers under the name `"headless"`.
*/

// Implementation modules
mod headless;
mod heap;

pub use headless::HeadlessBackend;

use nebula_3d_engine::nebula3d::render::BackendRegistry;

/// Register the headless backend with a registry
///
/// # Example
///
/// ```
/// use nebula_3d_engine::nebula3d::render::BackendRegistry;
///
/// let mut registry = BackendRegistry::new();
/// nebula_3d_engine_renderer_headless::register(&mut registry);
/// assert!(registry.contains("headless"));
/// ```
pub fn register(registry: &mut BackendRegistry) {
    registry.register("headless", |config| {
        Ok(Box::new(HeadlessBackend::new(config)))
    });
}
