/*!
# Rosy Engine - Vulkan Renderer Backend

Vulkan 1.3 implementation of the Rosy renderer.

This crate drives the GPU through Ash, with gpu-allocator for memory,
dynamic rendering and shader objects instead of render passes and
pipelines, and buffer device addresses for all per-draw data.

## Frame

```text
begin_frame ─► shadow cascades (×3) ─► render_pass ─► end_frame (blit, UI, present)
```

The shadow and main passes are recorded into two command buffers and
submitted separately, chained by a semaphore.

# Example

```no_run
use rosy_engine_renderer_vulkan::{GraphScene, Rhi, Scene};
use rosy_engine::rosy::{scene::Asset, Config};
# fn run(window: &winit::window::Window, asset: Asset) -> rosy_engine::rosy::Result<()> {
let mut rhi = Rhi::new(window, Config::default())?;
let mut scene = GraphScene::new(asset, "shaders");
scene.build(&mut rhi)?;
rhi.draw_frame(&mut scene, 1.0 / 60.0)?;
scene.deinit(&mut rhi)?;
rhi.deinit();
# Ok(())
# }
```
*/

mod debug;

// Device and memory
mod vulkan_device;
mod vulkan_context;
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_resources;

// Binding and shading
mod vulkan_descriptor;
mod vulkan_shader;
mod vulkan_pipeline;

// Presentation and frame loop
mod vulkan_swapchain;
mod vulkan_frame;
mod vulkan_scene;
mod vulkan_rhi;
mod vulkan_graph_scene;

pub use vulkan_rhi::{Retired, Rhi, DEPTH_FORMAT, DRAW_IMAGE_FORMAT, SHADOW_MAP_FORMAT};
pub use vulkan_scene::{NullOverlay, Scene, UiFrame, UiOverlay, UiWindow};
pub use vulkan_graph_scene::{DrawConstants, GpuMaterial, GpuSceneData, GraphScene};
pub use vulkan_context::GpuContext;
pub use vulkan_buffer::AllocatedBuffer;
pub use vulkan_image::AllocatedImage;
pub use vulkan_resources::{GpuMeshBuffers, GpuResourceManager, TextureContainer, TextureLevel};
pub use vulkan_descriptor::{DescriptorAllocator, DescriptorLayoutBuilder, DescriptorWriter};
pub use vulkan_pipeline::{ShaderPipeline, ShaderSource};
pub use vulkan_shader::{reflect_shader, ShaderReflection};
pub use vulkan_swapchain::Swapchain;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report};
