//! Backend-neutral GPU orchestration policy
//!
//! Descriptor pool growth, frame pacing, the frame state machine, deferred
//! resource retirement, per-draw render state and SPIR-V loading. Backends
//! plug in through [`DescriptorPoolBackend`] and [`FenceBackend`].

mod descriptor_allocator;
mod frame_pacer;
mod frame_stage;
mod retirement;
mod render_state;
mod shader_source;

#[cfg(test)]
pub(crate) mod mock_gpu;

pub use descriptor_allocator::{
    DescriptorPoolBackend, GrowableDescriptorAllocator, PoolAllocFailure, PoolSizeRatio,
    descriptor_count, next_pool_size, MAX_SETS_PER_POOL, POOL_GROWTH_FACTOR,
};
pub use frame_pacer::{
    FenceBackend, FramePacer, SlotFences, DEFAULT_FENCE_TIMEOUT_NS, MAX_FRAMES_IN_FLIGHT,
};
pub use frame_stage::{FrameStage, FrameStateMachine, ShadowPassEnd, SHADOW_CASCADE_COUNT};
pub use retirement::RetirementQueue;
pub use render_state::{BlendMode, FrontFace, RenderState};
pub use shader_source::{load_spirv, parse_spirv, SPIRV_MAGIC};
