/// Swapchain - presentation surface images, recreated on resize
///
/// Owns the window surface. Rendering never targets swapchain images
/// directly: the draw image is blitted onto them at the end of each frame,
/// so they only need COLOR_ATTACHMENT (UI overlay) and TRANSFER_DST usage.

use ash::vk;
use std::sync::Arc;
use rosy_engine::rosy::{Error, Result};
use rosy_engine::{engine_debug, engine_err, engine_info};

use crate::vulkan_context::GpuContext;

/// Prefer an sRGB swapchain; otherwise take the first advertised format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            (f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// FIFO with vsync, else the lowest-latency mode available
///
/// FIFO is always supported, so it is the fallback.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's fixed extent, or the window size clamped to the allowed range
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
    vk::Extent2D {
        width: window.0.clamp(min.width, max.width),
        height: window.1.clamp(min.height, max.height),
    }
}

/// One image more than the minimum; `max_image_count == 0` means unbounded
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

pub struct Swapchain {
    ctx: Arc<GpuContext>,
    loader: ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    vsync: bool,
    /// One per swapchain image, signaled by the render submission
    render_finished: Vec<vk::Semaphore>,
}

impl Swapchain {
    /// Create the swapchain for `surface`, taking ownership of the surface
    pub fn new(ctx: Arc<GpuContext>, surface: vk::SurfaceKHR, window_extent: (u32, u32), vsync: bool) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
        let mut swapchain = Self {
            ctx,
            loader,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            vsync,
            render_finished: Vec::new(),
        };
        // On failure, drop releases whatever was created, surface included
        swapchain.build(window_extent)?;
        engine_info!("rosy::vulkan", "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            swapchain.extent.width, swapchain.extent.height, swapchain.images.len(),
            swapchain.format.format, swapchain.present_mode);
        Ok(swapchain)
    }

    /// Replace the swapchain and its views; the caller waits for device idle first
    pub fn recreate(&mut self, window_extent: (u32, u32)) -> Result<()> {
        self.build(window_extent)?;
        engine_debug!("rosy::vulkan", "Swapchain recreated: {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    fn build(&mut self, window_extent: (u32, u32)) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let (physical, surface, surface_loader) = (ctx.physical_device, self.surface, &ctx.surface_loader);

        let capabilities = unsafe { surface_loader.get_physical_device_surface_capabilities(physical, surface) }
            .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to get surface capabilities: {:?}", e))?;
        let formats = unsafe { surface_loader.get_physical_device_surface_formats(physical, surface) }
            .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to get surface formats: {:?}", e))?;
        let modes = unsafe { surface_loader.get_physical_device_surface_present_modes(physical, surface) }
            .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to get present modes: {:?}", e))?;

        let format = choose_surface_format(&formats)
            .ok_or_else(|| engine_err!("rosy::vulkan", InitializationFailed => "Surface advertises no formats"))?;
        let present_mode = choose_present_mode(&modes, self.vsync);
        let extent = choose_extent(&capabilities, window_extent);

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        let swapchain = unsafe { self.loader.create_swapchain(&create_info, None) }
            .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to create swapchain: {:?}", e))?;

        // The old swapchain is retired by the create call either way
        self.destroy_views();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.format = format;
        self.extent = extent;
        self.present_mode = present_mode;

        self.images = unsafe { self.loader.get_swapchain_images(swapchain) }
            .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to get swapchain images: {:?}", e))?;
        for (index, &image) in self.images.iter().enumerate() {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { ctx.device.create_image_view(&view_info, None) }
                .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to create swapchain view: {:?}", e))?;
            ctx.set_debug_name(image, &format!("swapchain image {}", index));
            self.views.push(view);
        }

        while self.render_finished.len() < self.images.len() {
            let name = format!("render finished {}", self.render_finished.len());
            self.render_finished.push(ctx.create_semaphore(&name)?);
        }
        Ok(())
    }

    /// Acquire the next image, signaling `image_available` once it is ready
    ///
    /// # Errors
    ///
    /// `Error::SwapchainOutOfDate` when the surface changed, `Error::Timeout`
    /// when no image became available in time.
    pub fn acquire_next_image(&self, image_available: vk::Semaphore, timeout_ns: u64) -> Result<u32> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, timeout_ns, image_available, vk::Fence::null())
        };
        match result {
            // Suboptimal still presents correctly; the next resize event fixes it
            Ok((index, _suboptimal)) => Ok(index),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SwapchainOutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                Err(engine_err!("rosy::vulkan", Timeout => "No swapchain image within {} ns", timeout_ns))
            }
            Err(e) => Err(engine_err!("rosy::vulkan", "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    /// Present `index` once its render-finished semaphore signals
    pub fn present(&self, queue: vk::Queue, index: u32) -> Result<()> {
        let wait = [self.render_finished_semaphore(index)?];
        let swapchains = [self.swapchain];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&indices);
        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(_) => Ok(()),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SwapchainOutOfDate),
            Err(e) => Err(engine_err!("rosy::vulkan", "Failed to present: {:?}", e)),
        }
    }

    pub fn image(&self, index: u32) -> Result<vk::Image> {
        self.images
            .get(index as usize)
            .copied()
            .ok_or_else(|| engine_err!("rosy::vulkan", InvalidResource => "No swapchain image {}", index))
    }

    pub fn view(&self, index: u32) -> Result<vk::ImageView> {
        self.views
            .get(index as usize)
            .copied()
            .ok_or_else(|| engine_err!("rosy::vulkan", InvalidResource => "No swapchain view {}", index))
    }

    pub fn render_finished_semaphore(&self, index: u32) -> Result<vk::Semaphore> {
        self.render_finished
            .get(index as usize)
            .copied()
            .ok_or_else(|| engine_err!("rosy::vulkan", InvalidResource => "No render-finished semaphore {}", index))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    fn destroy_views(&mut self) {
        for view in self.views.drain(..) {
            unsafe { self.ctx.device.destroy_image_view(view, None) };
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_views();
        unsafe {
            for semaphore in self.render_finished.drain(..) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            self.ctx.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
