/// Rhi - the render orchestrator
///
/// One frame records two command buffers: the shadow buffer (three depth
/// cascades) and the render buffer (main pass, blit to the swapchain, UI).
///
/// ```text
/// begin_frame ─► begin_shadow_pass(0..3) / end_shadow_pass ─► render_pass ─► end_frame
///   wait fences     depth bias on at 0, off after 2          submit shadow    submit render
///   acquire                                                   wait render      present
/// ```
///
/// Call order is checked by a [`FrameStateMachine`]; a call out of order
/// returns `Error::InvalidState` without recording anything.

use ash::vk;
use std::sync::Arc;
use winit::window::Window;
use rosy_engine::rosy::gpu::{
    FrameStage, FramePacer, FrameStateMachine, RenderState, RetirementQueue, SlotFences, PoolSizeRatio,
    MAX_FRAMES_IN_FLIGHT, SHADOW_CASCADE_COUNT,
};
use rosy_engine::rosy::{Config, Engine, Error, Result};
use rosy_engine::{engine_bail, engine_debug, engine_err, engine_info, engine_warn};

use crate::vulkan_buffer::AllocatedBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor::DescriptorAllocator;
use crate::vulkan_frame::FrameData;
use crate::vulkan_image::{self, AllocatedImage};
use crate::vulkan_resources::{self, GpuResourceManager};
use crate::vulkan_scene::{NullOverlay, Scene, UiFrame, UiOverlay};
use crate::vulkan_swapchain::Swapchain;

pub const DRAW_IMAGE_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
pub const SHADOW_MAP_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Shadow acne bias applied to all cascades
const DEPTH_BIAS_CONSTANT: f32 = 1.25;
const DEPTH_BIAS_SLOPE: f32 = 1.75;

/// Sets reserved by the long-lived descriptor allocator's first pool
const GLOBAL_DESCRIPTOR_SETS: u32 = 64;

/// A resource waiting for the GPU to stop using it
#[derive(Debug)]
pub enum Retired {
    Buffer(AllocatedBuffer),
    Image(AllocatedImage),
}

pub struct Rhi {
    config: Config,
    ctx: Arc<GpuContext>,
    swapchain: Swapchain,
    resources: GpuResourceManager,

    frames: Vec<FrameData>,
    pacer: FramePacer<vk::Fence>,
    stage: FrameStateMachine,
    retirement: RetirementQueue<Retired>,

    /// Offscreen color target at the configured maximum extent
    draw_image: AllocatedImage,
    depth_image: AllocatedImage,
    /// One depth layer per cascade
    shadow_map: AllocatedImage,
    shadow_sampler: vk::Sampler,

    /// Sets that live as long as the scene (materials)
    global_descriptors: DescriptorAllocator,

    draw_extent: (u32, u32),
    swapchain_image_index: u32,
    resize_requested: bool,
    render_state: RenderState,

    ui: UiFrame,
    overlay: Box<dyn UiOverlay>,
    deinitialized: bool,
}

impl Rhi {
    /// Bring up the device, swapchain, render targets and frame slots
    ///
    /// # Errors
    ///
    /// The first failing step's error; everything created before it is
    /// released.
    pub fn new(window: &Window, config: Config) -> Result<Self> {
        config.validate()?;
        Engine::set_min_severity(config.min_log_severity);

        let (ctx, surface) = GpuContext::new(window, &config)?;
        let size = window.inner_size();
        let swapchain = Swapchain::new(Arc::clone(&ctx), surface, (size.width, size.height), config.vsync)?;
        let resources = GpuResourceManager::new(Arc::clone(&ctx));

        let (max_width, max_height) = config.max_draw_extent;
        let target_extent = vk::Extent3D { width: max_width, height: max_height, depth: 1 };
        let draw_image = resources.create_image(
            "draw image",
            target_extent,
            DRAW_IMAGE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::STORAGE
                | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            false,
        )?;
        let depth_image = resources.create_image(
            "depth image",
            target_extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            false,
        )?;
        let shadow_map = resources.create_image_array(
            "shadow map",
            vk::Extent2D { width: config.shadow_map_size, height: config.shadow_map_size },
            SHADOW_CASCADE_COUNT,
            SHADOW_MAP_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )?;

        let shadow_sampler = resources.create_sampler("shadow sampler", &vulkan_resources::shadow_sampler_info())?;

        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for index in 0..MAX_FRAMES_IN_FLIGHT {
            match FrameData::new(&ctx, config.frame_descriptor_sets, index) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    for frame in &mut frames {
                        frame.destroy(&ctx);
                    }
                    resources.destroy_sampler(shadow_sampler);
                    return Err(e);
                }
            }
        }

        let global_ratios = [
            PoolSizeRatio { descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER, ratio: 1.0 },
            PoolSizeRatio { descriptor_type: vk::DescriptorType::UNIFORM_BUFFER, ratio: 1.0 },
        ];
        let global_descriptors = match DescriptorAllocator::init(&*ctx, GLOBAL_DESCRIPTOR_SETS, &global_ratios) {
            Ok(allocator) => allocator,
            Err(e) => {
                for frame in &mut frames {
                    frame.destroy(&ctx);
                }
                resources.destroy_sampler(shadow_sampler);
                return Err(e);
            }
        };

        let fences = frames
            .iter()
            .map(|f| SlotFences { shadow: f.shadow_fence, render: f.render_fence })
            .collect();
        let pacer = FramePacer::new(fences, config.fence_timeout_ns);
        let extent = swapchain.extent();
        let draw_extent = config.draw_extent(extent.width, extent.height);

        engine_info!("rosy::rhi", "Renderer ready on {}: draw extent {}x{}, shadow map {}x{}x{}",
            ctx.device_name, draw_extent.0, draw_extent.1,
            config.shadow_map_size, config.shadow_map_size, SHADOW_CASCADE_COUNT);

        Ok(Self {
            ctx,
            swapchain,
            resources,
            frames,
            pacer,
            stage: FrameStateMachine::new(SHADOW_CASCADE_COUNT),
            retirement: RetirementQueue::new(MAX_FRAMES_IN_FLIGHT),
            draw_image,
            depth_image,
            shadow_map,
            shadow_sampler,
            global_descriptors,
            draw_extent,
            swapchain_image_index: 0,
            resize_requested: false,
            render_state: RenderState::main_pass(draw_extent),
            ui: UiFrame::default(),
            overlay: Box::new(NullOverlay),
            deinitialized: false,
            config,
        })
    }

    // ===== Frame =====

    /// Wait for the slot, acquire a swapchain image and start the shadow buffer
    ///
    /// # Errors
    ///
    /// `Error::SwapchainOutOfDate` if the image cannot be acquired; the frame
    /// is abandoned and a resize is requested. `Error::Timeout` if a fence
    /// wait expires.
    pub fn begin_frame(&mut self) -> Result<()> {
        self.stage.begin_frame()?;
        self.pacer.wait_for_slot(&*self.ctx)?;

        // Both fences of the slot are signaled: its old resources are free
        let slot = self.pacer.current_slot();
        let retired = self.retirement.collect(slot);
        if !retired.is_empty() {
            engine_debug!("rosy::rhi", "Destroying {} retired resources of slot {}", retired.len(), slot);
        }
        drop(retired);
        self.frames[slot].descriptors.clear_pools(&*self.ctx)?;

        let frame = &self.frames[slot];
        match self.swapchain.acquire_next_image(frame.image_available, self.config.fence_timeout_ns) {
            Ok(index) => self.swapchain_image_index = index,
            Err(Error::SwapchainOutOfDate) => {
                engine_debug!("rosy::rhi", "Swapchain out of date on acquire");
                self.resize_requested = true;
                self.stage.abort_frame();
                return Err(Error::SwapchainOutOfDate);
            }
            Err(e) => return Err(e),
        }

        self.pacer.reset_shadow(&*self.ctx)?;
        self.begin_command_buffer(self.frames[slot].shadow_command_buffer)
    }

    /// Move the shadow map to depth attachment, enable depth bias and start cascade 0
    pub fn init_shadow_pass(&mut self) -> Result<()> {
        if self.stage.begin_shadow_pass(0)? {
            let cmd = self.frames[self.pacer.current_slot()].shadow_command_buffer;
            vulkan_image::transition_image(
                &self.ctx.device,
                cmd,
                self.shadow_map.handle(),
                vk::ImageAspectFlags::DEPTH,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            );
            unsafe {
                self.ctx.device.cmd_set_depth_bias_enable(cmd, true);
                self.ctx.device.cmd_set_depth_bias(cmd, DEPTH_BIAS_CONSTANT, 0.0, DEPTH_BIAS_SLOPE);
            }
        }
        self.begin_cascade(0)
    }

    /// Start rendering cascade `pass`; pass 0 goes through [`Self::init_shadow_pass`]
    pub fn begin_shadow_pass(&mut self, pass: u32) -> Result<()> {
        if pass == 0 {
            return self.init_shadow_pass();
        }
        self.stage.begin_shadow_pass(pass)?;
        self.begin_cascade(pass)
    }

    fn begin_cascade(&mut self, pass: u32) -> Result<()> {
        let cmd = self.frames[self.pacer.current_slot()].shadow_command_buffer;
        let view = self
            .shadow_map
            .layer_view(pass)
            .ok_or_else(|| engine_err!("rosy::rhi", InvalidResource => "Shadow map has no layer {}", pass))?;
        let size = self.config.shadow_map_size;

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 } });
        let rendering = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: vk::Extent2D { width: size, height: size },
            })
            .layer_count(1)
            .depth_attachment(&depth_attachment);
        unsafe { self.ctx.device.cmd_begin_rendering(cmd, &rendering) };

        self.render_state = RenderState::shadow_pass((size, size));
        Ok(())
    }

    /// End the current cascade; after the last one depth bias is turned off
    pub fn end_shadow_pass(&mut self) -> Result<()> {
        let end = self.stage.end_shadow_pass()?;
        let cmd = self.frames[self.pacer.current_slot()].shadow_command_buffer;
        unsafe { self.ctx.device.cmd_end_rendering(cmd) };
        if end.disable_depth_bias {
            unsafe { self.ctx.device.cmd_set_depth_bias_enable(cmd, false) };
        }
        Ok(())
    }

    /// Submit the shadow work and start the main pass on the render buffer
    pub fn render_pass(&mut self) -> Result<()> {
        self.stage.begin_render_pass()?;
        let slot = self.pacer.current_slot();
        let device = &self.ctx.device;
        let (shadow_cmd, render_cmd) = {
            let frame = &self.frames[slot];
            (frame.shadow_command_buffer, frame.render_command_buffer)
        };

        // Cascades are sampled by the main pass
        vulkan_image::transition_image(
            device,
            shadow_cmd,
            self.shadow_map.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        unsafe { device.end_command_buffer(shadow_cmd) }
            .map_err(|e| engine_err!("rosy::rhi", "Failed to end shadow command buffer: {:?}", e))?;

        let frame = &self.frames[slot];
        self.submit(
            shadow_cmd,
            frame.image_available,
            frame.shadow_complete,
            frame.shadow_fence,
            "shadow",
        )?;

        self.pacer.wait_and_reset_render(&*self.ctx)?;
        self.begin_command_buffer(render_cmd)?;

        let device = &self.ctx.device;
        let draw = self.draw_image.handle();
        vulkan_image::transition_image(
            device,
            render_cmd,
            draw,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::GENERAL,
        );
        let clear = vk::ClearColorValue { float32: CLEAR_COLOR };
        let range = vulkan_image::full_range(vk::ImageAspectFlags::COLOR);
        unsafe { device.cmd_clear_color_image(render_cmd, draw, vk::ImageLayout::GENERAL, &clear, &[range]) };
        vulkan_image::transition_image(
            device,
            render_cmd,
            draw,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        vulkan_image::transition_image(
            device,
            render_cmd,
            self.depth_image.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        );

        let (width, height) = self.draw_extent;
        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(self.draw_image.view())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE)];
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_image.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 } });
        let rendering = vk::RenderingInfo::default()
            .render_area(vk::Rect2D { offset: vk::Offset2D::default(), extent: vk::Extent2D { width, height } })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);
        unsafe {
            device.cmd_begin_rendering(render_cmd, &rendering);
            device.cmd_set_depth_bias_enable(render_cmd, false);
        }

        self.render_state = RenderState::main_pass(self.draw_extent);
        Ok(())
    }

    /// Blit to the swapchain, draw the UI, submit and present
    ///
    /// # Errors
    ///
    /// `Error::SwapchainOutOfDate` if presentation failed; the frame still
    /// counts as submitted and a resize is requested.
    pub fn end_frame(&mut self) -> Result<()> {
        self.stage.end_frame()?;
        let slot = self.pacer.current_slot();
        let index = self.swapchain_image_index;
        let cmd = self.frames[slot].render_command_buffer;
        let swapchain_image = self.swapchain.image(index)?;
        let swapchain_view = self.swapchain.view(index)?;
        let swapchain_extent = self.swapchain.extent();
        let (width, height) = self.draw_extent;
        let device = &self.ctx.device;

        unsafe { device.cmd_end_rendering(cmd) };

        vulkan_image::transition_image(
            device,
            cmd,
            self.draw_image.handle(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        vulkan_image::transition_image(
            device,
            cmd,
            swapchain_image,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        vulkan_image::copy_image_to_image(
            device,
            cmd,
            self.draw_image.handle(),
            swapchain_image,
            vk::Extent2D { width, height },
            swapchain_extent,
        );

        vulkan_image::transition_image(
            device,
            cmd,
            swapchain_image,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        self.overlay.record(&self.ctx, cmd, swapchain_view, swapchain_extent, &self.ui)?;
        vulkan_image::transition_image(
            device,
            cmd,
            swapchain_image,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );

        unsafe { device.end_command_buffer(cmd) }
            .map_err(|e| engine_err!("rosy::rhi", "Failed to end render command buffer: {:?}", e))?;

        let frame = &self.frames[slot];
        let render_finished = self.swapchain.render_finished_semaphore(index)?;
        self.submit(cmd, frame.shadow_complete, render_finished, frame.render_fence, "render")?;

        let presented = self.swapchain.present(self.ctx.graphics_queue, index);
        self.pacer.advance();
        match presented {
            Err(Error::SwapchainOutOfDate) => {
                engine_debug!("rosy::rhi", "Swapchain out of date on present");
                self.resize_requested = true;
                Err(Error::SwapchainOutOfDate)
            }
            other => other,
        }
    }

    /// Run one full frame against `scene`
    pub fn draw_frame(&mut self, scene: &mut dyn Scene, dt: f32) -> Result<()> {
        self.begin_frame()?;
        scene.update(self, dt)?;

        for pass in 0..self.stage.cascade_count() {
            self.begin_shadow_pass(pass)?;
            scene.draw_shadows(self, pass)?;
            self.end_shadow_pass()?;
        }

        self.render_pass()?;
        scene.draw(self)?;

        self.ui.clear();
        scene.draw_ui(&mut self.ui)?;
        self.end_frame()
    }

    /// Recreate the swapchain at the window's size
    ///
    /// A minimized (zero-sized) window keeps the resize pending. Render
    /// targets keep their maximum extent; only the draw extent changes.
    pub fn resize_swapchain(&mut self, window: &Window) -> Result<()> {
        if self.stage.in_frame() {
            engine_bail!("rosy::rhi", InvalidState => "resize_swapchain called inside a frame");
        }
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        self.ctx.wait_idle()?;
        self.swapchain.recreate((size.width, size.height))?;

        let extent = self.swapchain.extent();
        self.draw_extent = self.config.draw_extent(extent.width, extent.height);
        self.resize_requested = false;
        self.stage.abort_frame();
        engine_debug!("rosy::rhi", "Draw extent now {}x{}", self.draw_extent.0, self.draw_extent.1);
        Ok(())
    }

    /// Wait for the GPU and destroy everything the RHI owns directly
    ///
    /// Safe to call more than once; `Drop` calls it too.
    pub fn deinit(&mut self) {
        if self.deinitialized {
            return;
        }
        self.deinitialized = true;
        if let Err(e) = self.ctx.wait_idle() {
            engine_warn!("rosy::rhi", "Device did not go idle before shutdown: {}", e);
        }
        self.stage.deinit();
        drop(self.retirement.drain_all());

        self.overlay.deinit(&self.ctx);
        for frame in &mut self.frames {
            frame.destroy(&self.ctx);
        }
        self.global_descriptors.destroy_pools(&*self.ctx);
        self.resources.destroy_sampler(self.shadow_sampler);
        self.shadow_sampler = vk::Sampler::null();
        engine_info!("rosy::rhi", "Renderer shut down after {} frames", self.pacer.frame_number());
    }

    // ===== Resources =====

    /// Destroy `buffer` once the GPU can no longer be reading it
    pub fn retire_buffer(&mut self, buffer: AllocatedBuffer) {
        let slot = self.retirement_slot();
        self.retirement.retire(slot, Retired::Buffer(buffer));
    }

    /// Destroy `image` once the GPU can no longer be reading it
    pub fn retire_image(&mut self, image: AllocatedImage) {
        let slot = self.retirement_slot();
        self.retirement.retire(slot, Retired::Image(image));
    }

    /// Slot whose next fence wait covers every submission that may use a
    /// resource retired now
    fn retirement_slot(&self) -> usize {
        let current = self.pacer.current_slot();
        if self.stage.in_frame() {
            current
        } else {
            // Between frames the previous frame ran on the other slot
            (current + self.pacer.slot_count() - 1) % self.pacer.slot_count()
        }
    }

    pub fn pending_retirements(&self) -> usize {
        self.retirement.pending()
    }

    /// Set from the current frame's allocator, released at this slot's next frame
    pub fn allocate_frame_set(&mut self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let slot = self.pacer.current_slot();
        self.frames[slot].descriptors.allocate(&*self.ctx, layout)
    }

    /// Set that lives until the RHI is deinitialized
    pub fn allocate_global_set(&mut self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        self.global_descriptors.allocate(&*self.ctx, layout)
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn UiOverlay>) {
        let mut previous = std::mem::replace(&mut self.overlay, overlay);
        previous.deinit(&self.ctx);
    }

    // ===== Accessors =====

    pub fn ctx(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    pub fn resources(&self) -> &GpuResourceManager {
        &self.resources
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stage(&self) -> FrameStage {
        self.stage.stage()
    }

    pub fn current_slot(&self) -> usize {
        self.pacer.current_slot()
    }

    pub fn frame_number(&self) -> u64 {
        self.pacer.frame_number()
    }

    /// Command buffer recording the current pass
    pub fn command_buffer(&self) -> Result<vk::CommandBuffer> {
        let frame = &self.frames[self.pacer.current_slot()];
        match self.stage.stage() {
            FrameStage::FrameBegun | FrameStage::ShadowPass(_) | FrameStage::ShadowPassEnded(_) => {
                Ok(frame.shadow_command_buffer)
            }
            FrameStage::RenderPass => Ok(frame.render_command_buffer),
            other => engine_bail!("rosy::rhi", InvalidState => "No command buffer is recording in stage {:?}", other),
        }
    }

    /// State the current pass starts with
    pub fn render_state(&self) -> RenderState {
        self.render_state
    }

    pub fn draw_extent(&self) -> (u32, u32) {
        self.draw_extent
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.draw_extent.0 as f32 / self.draw_extent.1.max(1) as f32
    }

    pub fn shadow_map(&self) -> &AllocatedImage {
        &self.shadow_map
    }

    pub fn shadow_sampler(&self) -> vk::Sampler {
        self.shadow_sampler
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn resize_requested(&self) -> bool {
        self.resize_requested
    }

    /// Ask for a swapchain recreation before the next frame
    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    // ===== Internals =====

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let device = &self.ctx.device;
        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("rosy::rhi", "Failed to reset command buffer: {:?}", e))?;
            let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| engine_err!("rosy::rhi", "Failed to begin command buffer: {:?}", e))
        }
    }

    fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
        label: &str,
    ) -> Result<()> {
        let command_buffers = [vk::CommandBufferSubmitInfo::default().command_buffer(cmd)];
        let waits = [vk::SemaphoreSubmitInfo::default()
            .semaphore(wait)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let signals = [vk::SemaphoreSubmitInfo::default()
            .semaphore(signal)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals);
        unsafe { self.ctx.device.queue_submit2(self.ctx.graphics_queue, &[submit], fence) }
            .map_err(|e| engine_err!("rosy::rhi", "Failed to submit {} commands: {:?}", label, e))
    }
}

impl Drop for Rhi {
    fn drop(&mut self) {
        self.deinit();
    }
}
