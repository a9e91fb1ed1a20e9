/// Scene - what the render loop drives each frame, and the UI overlay seam

use ash::vk;
use rosy_engine::rosy::Result;
use winit::event::WindowEvent;

use crate::vulkan_context::GpuContext;
use crate::vulkan_rhi::Rhi;

/// A renderable world driven by [`Rhi::draw_frame`]
///
/// Per frame the RHI calls `update`, then `draw_shadows` once per cascade,
/// then `draw` inside the main pass and finally `draw_ui`.
pub trait Scene {
    /// Upload GPU data and create pipelines
    fn build(&mut self, rhi: &mut Rhi) -> Result<()>;

    fn handle_window_event(&mut self, event: &WindowEvent) -> Result<()>;

    /// Raw device motion, for mouse-look
    fn handle_mouse_motion(&mut self, delta: (f64, f64)) -> Result<()>;

    /// Simulation step; runs after the frame slot is free, before any recording
    fn update(&mut self, rhi: &mut Rhi, dt: f32) -> Result<()>;

    /// Record the depth-only draws of cascade `pass`
    fn draw_shadows(&mut self, rhi: &mut Rhi, pass: u32) -> Result<()>;

    /// Record the main color pass draws
    fn draw(&mut self, rhi: &mut Rhi) -> Result<()>;

    fn draw_ui(&mut self, ui: &mut UiFrame) -> Result<()>;

    /// Release GPU data; the device is idle
    fn deinit(&mut self, rhi: &mut Rhi) -> Result<()>;
}

/// One titled window of text lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiWindow {
    pub title: String,
    pub lines: Vec<String>,
}

/// Immediate-mode UI content for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiFrame {
    pub windows: Vec<UiWindow>,
}

impl UiFrame {
    /// Start a window, returning its line list
    pub fn window(&mut self, title: impl Into<String>) -> &mut Vec<String> {
        self.windows.push(UiWindow { title: title.into(), lines: Vec::new() });
        let last = self.windows.len() - 1;
        &mut self.windows[last].lines
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.windows.iter().all(|w| w.lines.is_empty())
    }
}

/// Draws a [`UiFrame`] onto the swapchain image
///
/// Called inside `end_frame` with the image in COLOR_ATTACHMENT_OPTIMAL.
/// The overlay begins and ends its own rendering with a LOAD load-op.
pub trait UiOverlay {
    fn record(
        &mut self,
        ctx: &GpuContext,
        cmd: vk::CommandBuffer,
        target: vk::ImageView,
        extent: vk::Extent2D,
        frame: &UiFrame,
    ) -> Result<()>;

    fn deinit(&mut self, ctx: &GpuContext);
}

/// Overlay that records nothing
#[derive(Debug, Default)]
pub struct NullOverlay;

impl UiOverlay for NullOverlay {
    fn record(
        &mut self,
        _ctx: &GpuContext,
        _cmd: vk::CommandBuffer,
        _target: vk::ImageView,
        _extent: vk::Extent2D,
        _frame: &UiFrame,
    ) -> Result<()> {
        Ok(())
    }

    fn deinit(&mut self, _ctx: &GpuContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_frame_windows() {
        let mut ui = UiFrame::default();
        assert!(ui.is_empty());

        ui.window("Stats").push("fps: 60".to_string());
        ui.window("Camera");
        assert_eq!(ui.windows.len(), 2);
        assert_eq!(ui.windows[0].lines, vec!["fps: 60".to_string()]);
        assert!(!ui.is_empty());

        ui.clear();
        assert!(ui.is_empty());
    }
}
