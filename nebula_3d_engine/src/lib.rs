/*!
# Nebula 3D Engine

Core types for the Nebula 3D rendering engine: GPU resource and frame
lifecycle management plus a renderer backend abstraction.

This crate provides the platform-agnostic API. Backend implementations
(headless, Vulkan, etc.) live in separate crates, implement the
`RenderBackend` trait and are selected at runtime through a registry with
an explicit interface-version negotiation step.

## Architecture

- **Engine**: explicit context object owning all subsystems
- **RenderBackend / BackendLoader**: versioned backend interface and
  load/swap/unload lifecycle
- **DynamicGpuAllocator**: first-fit sub-allocation of backend heaps with
  free-range coalescing
- **ResourceTable**: name -> generation-checked handle storage for
  buffers, textures and framebuffers
- **Framed**: N-deep per-frame slot rotation for CPU-written GPU data
- **RendererState**: ordered stage list with barrier segmentation and
  lazily cached name resolution
- **GpuMesh**: blocking initial-load path from CPU mesh data to
  device-local buffers
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod renderer;
pub mod resource;
pub mod stage;
pub mod utils;

// Main nebula3d namespace module
pub mod nebula3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine context
    pub use crate::engine::{Engine, EngineConfig};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        pub use crate::log::{set_logger, reset_logger};
    }

    // Render sub-module with backend, memory and mesh types
    pub mod render {
        pub use crate::renderer::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Stage sub-module
    pub mod stage {
        pub use crate::stage::*;
    }

    // Utility sub-module
    pub mod utils {
        pub use crate::utils::*;
    }
}

// Flat re-exports for the common entry points
pub use crate::error::{Error, Result};
pub use crate::engine::{Engine, EngineConfig};

// Re-export math library at crate root
pub use glam;
