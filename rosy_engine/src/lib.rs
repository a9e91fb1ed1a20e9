/*!
# Rosy Engine

Platform-agnostic core of the Rosy real-time renderer.

This crate holds everything that does not talk to the GPU directly: the
error type and logging facade, the engine configuration, the GPU
orchestration policies (descriptor pool growth, frame pacing, the frame
state machine, deferred retirement) and the scene side (asset model, scene
graph, render objects, camera and shadow cascades).

## Architecture

- **Error / Result**: one error enum shared by every crate of the workspace
- **Engine**: process-wide logging facade used by the `engine_*` macros
- **gpu**: backend-neutral policies, generic over small backend traits
- **scene**: asset model and the breadth-first scene graph

The Vulkan backend lives in `rosy_engine_renderer_vulkan`.
*/

// Internal modules
mod config;
mod engine;
mod error;
pub mod gpu;
pub mod log;
pub mod scene;

// Main rosy namespace module
pub mod rosy {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{
        Config, DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats,
    };

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // GPU orchestration policies
    pub mod gpu {
        pub use crate::gpu::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
