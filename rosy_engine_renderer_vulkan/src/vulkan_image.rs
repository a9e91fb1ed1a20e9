/// Images: the allocated image type, layout transitions and blits
///
/// Barriers use synchronization2 with full pipeline stage masks. Rosy issues
/// a handful of transitions per frame, so finer masks buy nothing.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Exclusively owned GPU image with its default view, freed on drop
pub struct AllocatedImage {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    /// One 2D view per array layer, for images rendered layer by layer
    layer_views: Vec<vk::ImageView>,
    allocation: Option<Allocation>,
    extent: vk::Extent3D,
    format: vk::Format,
    mip_levels: u32,
    array_layers: u32,
    name: String,
}

impl AllocatedImage {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        layer_views: Vec<vk::ImageView>,
        allocation: Allocation,
        extent: vk::Extent3D,
        format: vk::Format,
        mip_levels: u32,
        array_layers: u32,
        name: String,
    ) -> Self {
        Self {
            ctx,
            image,
            view,
            layer_views,
            allocation: Some(allocation),
            extent,
            format,
            mip_levels,
            array_layers,
            name,
        }
    }

    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// View of a single array layer; the default view for non-array images
    pub fn layer_view(&self, layer: u32) -> Option<vk::ImageView> {
        if self.layer_views.is_empty() && layer == 0 {
            return Some(self.view);
        }
        self.layer_views.get(layer as usize).copied()
    }

    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D { width: self.extent.width, height: self.extent.height }
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    pub fn aspect(&self) -> vk::ImageAspectFlags {
        aspect_for_format(self.format)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for AllocatedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatedImage")
            .field("name", &self.name)
            .field("image", &self.image)
            .field("extent", &self.extent)
            .field("format", &self.format)
            .finish()
    }
}

impl Drop for AllocatedImage {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.layer_views {
                self.ctx.device.destroy_image_view(view, None);
            }
            self.ctx.device.destroy_image_view(self.view, None);
        }
        if let Some(allocation) = self.allocation.take() {
            if let Ok(mut guard) = self.ctx.allocator.lock() {
                if let Some(allocator) = guard.as_mut() {
                    allocator.free(allocation).ok();
                }
            }
        }
        unsafe { self.ctx.device.destroy_image(self.image, None) };
    }
}

/// Aspect implied by a format
pub fn aspect_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Full mip chain length for an image of this size
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Every mip level and array layer of `aspect`
pub fn full_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}

/// Record a layout transition covering the whole image
pub fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    transition_range(device, cmd, image, full_range(aspect), old_layout, new_layout);
}

pub fn transition_range(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let barriers = [vk::ImageMemoryBarrier2::default()
        .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)];
    let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
    unsafe { device.cmd_pipeline_barrier2(cmd, &dependency) };
}

fn blit_offsets(extent: vk::Extent2D) -> [vk::Offset3D; 2] {
    [
        vk::Offset3D { x: 0, y: 0, z: 0 },
        vk::Offset3D { x: extent.width as i32, y: extent.height as i32, z: 1 },
    ]
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Blit `src_size` of `src` (TRANSFER_SRC) onto `dst_size` of `dst` (TRANSFER_DST)
pub fn copy_image_to_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: vk::Image,
    dst: vk::Image,
    src_size: vk::Extent2D,
    dst_size: vk::Extent2D,
) {
    let regions = [vk::ImageBlit2::default()
        .src_subresource(color_layers(0))
        .src_offsets(blit_offsets(src_size))
        .dst_subresource(color_layers(0))
        .dst_offsets(blit_offsets(dst_size))];
    let blit = vk::BlitImageInfo2::default()
        .src_image(src)
        .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
        .dst_image(dst)
        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .filter(vk::Filter::LINEAR)
        .regions(&regions);
    unsafe { device.cmd_blit_image2(cmd, &blit) };
}

/// Size of mip `level` of an image of `extent`
pub fn mip_extent(extent: vk::Extent2D, level: u32) -> vk::Extent2D {
    vk::Extent2D {
        width: (extent.width >> level).max(1),
        height: (extent.height >> level).max(1),
    }
}

/// Fill mips 1.. by successive blits from mip 0
///
/// Expects every level in TRANSFER_DST_OPTIMAL; leaves every level in
/// SHADER_READ_ONLY_OPTIMAL.
pub fn generate_mipmaps(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    extent: vk::Extent2D,
    mip_levels: u32,
) {
    for level in 0..mip_levels {
        let range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        transition_range(
            device,
            cmd,
            image,
            range,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );

        if level + 1 < mip_levels {
            let regions = [vk::ImageBlit2::default()
                .src_subresource(color_layers(level))
                .src_offsets(blit_offsets(mip_extent(extent, level)))
                .dst_subresource(color_layers(level + 1))
                .dst_offsets(blit_offsets(mip_extent(extent, level + 1)))];
            let blit = vk::BlitImageInfo2::default()
                .src_image(image)
                .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .dst_image(image)
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .filter(vk::Filter::LINEAR)
                .regions(&regions);
            unsafe { device.cmd_blit_image2(cmd, &blit) };
        }
    }

    transition_image(
        device,
        cmd,
        image,
        vk::ImageAspectFlags::COLOR,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );
}
