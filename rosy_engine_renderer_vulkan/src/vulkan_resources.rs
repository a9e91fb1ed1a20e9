/// GpuResourceManager - buffer, image and sampler creation
///
/// Every allocation goes through gpu-allocator. Data reaches device-local
/// memory through a host-visible staging buffer copied by one immediate
/// submission, after which the staging buffer is released.

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme};
use std::sync::Arc;
use rosy_engine::rosy::{Error, Result};
use rosy_engine::rosy::scene::{Filter, Sampler, Vertex};
use rosy_engine::{engine_bail, engine_debug, engine_err, engine_error};

use crate::vulkan_buffer::AllocatedBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_image::{self, AllocatedImage};

/// Index and vertex buffers of one uploaded mesh
#[derive(Debug)]
pub struct GpuMeshBuffers {
    pub index_buffer: AllocatedBuffer,
    pub vertex_buffer: AllocatedBuffer,
    pub vertex_buffer_address: u64,
    pub index_count: u32,
}

/// One mip level inside a [`TextureContainer`]'s data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLevel {
    pub offset: u64,
    pub size: u64,
    pub width: u32,
    pub height: u32,
}

/// Pre-decoded (possibly block-compressed) texture with its full mip chain
#[derive(Debug, Clone)]
pub struct TextureContainer {
    pub format: vk::Format,
    pub width: u32,
    pub height: u32,
    pub levels: Vec<TextureLevel>,
    pub data: Vec<u8>,
}

impl TextureContainer {
    /// Check that every level fits inside `data` and halves the previous one
    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() || self.width == 0 || self.height == 0 {
            engine_bail!("rosy::vulkan", InvalidResource => "Texture container has no levels or a zero size");
        }
        for (index, level) in self.levels.iter().enumerate() {
            let expected = vulkan_image::mip_extent(
                vk::Extent2D { width: self.width, height: self.height },
                index as u32,
            );
            if level.width != expected.width || level.height != expected.height {
                engine_bail!("rosy::vulkan", InvalidResource =>
                    "Texture level {} is {}x{}, expected {}x{}",
                    index, level.width, level.height, expected.width, expected.height);
            }
            if level.size == 0 || level.offset + level.size > self.data.len() as u64 {
                engine_bail!("rosy::vulkan", InvalidResource =>
                    "Texture level {} [{}, +{}) exceeds {} bytes of data",
                    index, level.offset, level.size, self.data.len());
            }
        }
        Ok(())
    }
}

/// Sampler create info for an asset sampler
pub fn sampler_info(sampler: &Sampler) -> vk::SamplerCreateInfo<'static> {
    let filter = |f: Filter| match f {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    };
    let mipmap_mode = match sampler.min_filter {
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    };
    vk::SamplerCreateInfo::default()
        .mag_filter(filter(sampler.mag_filter))
        .min_filter(filter(sampler.min_filter))
        .mipmap_mode(mipmap_mode)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
}

/// Depth-compare sampler used to read the shadow cascades
pub fn shadow_sampler_info() -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_BORDER)
        .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_BORDER)
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_BORDER)
        .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
        .compare_enable(true)
        .compare_op(vk::CompareOp::LESS_OR_EQUAL)
        .max_lod(1.0)
}

pub struct GpuResourceManager {
    ctx: Arc<GpuContext>,
}

impl GpuResourceManager {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Create a buffer of `size` bytes
    ///
    /// Host-visible locations come back persistently mapped. The device
    /// address is recorded when `usage` has `SHADER_DEVICE_ADDRESS`.
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` when the allocation fails,
    /// `Error::InvalidResource` for a zero size.
    pub fn create_buffer(
        &self,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<AllocatedBuffer> {
        if size == 0 {
            engine_bail!("rosy::vulkan", InvalidResource => "Buffer '{}' has zero size", name);
        }
        let device = &self.ctx.device;

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&create_info, None) }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to create buffer '{}': {:?}", name, e))?;
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let allocation = match self.allocate(name, requirements, location, true) {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            self.free(allocation);
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(engine_err!("rosy::vulkan", "Failed to bind memory of buffer '{}': {:?}", name, e));
        }

        let device_address = usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS).then(|| {
            let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
            unsafe { device.get_buffer_device_address(&info) }
        });
        self.ctx.set_debug_name(buffer, name);
        Ok(AllocatedBuffer::new(
            Arc::clone(&self.ctx),
            buffer,
            allocation,
            size,
            device_address,
            name.to_string(),
        ))
    }

    /// Device-local buffer filled with `data` through a staging copy
    pub fn upload_buffer(&self, name: &str, data: &[u8], usage: vk::BufferUsageFlags) -> Result<AllocatedBuffer> {
        let buffer = self.create_buffer(
            name,
            data.len() as u64,
            usage | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::GpuOnly,
        )?;
        let mut staging = self.create_buffer(
            &format!("{} staging", name),
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        staging.write(0, data)?;

        let (src, dst, size) = (staging.handle(), buffer.handle(), data.len() as u64);
        self.ctx.immediate_submit(|device, cmd| unsafe {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            device.cmd_copy_buffer(cmd, src, dst, &[region]);
        })?;
        Ok(buffer)
    }

    /// Exact-size index and vertex buffers filled from one staging buffer
    ///
    /// The vertex buffer is a storage buffer read through its device address.
    pub fn upload_mesh(&self, name: &str, indices: &[u32], vertices: &[Vertex]) -> Result<GpuMeshBuffers> {
        if indices.is_empty() || vertices.is_empty() {
            engine_bail!("rosy::vulkan", InvalidResource =>
                "Mesh '{}' has {} indices and {} vertices", name, indices.len(), vertices.len());
        }
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let vertex_size = vertex_bytes.len() as u64;
        let index_size = index_bytes.len() as u64;

        let vertex_buffer = self.create_buffer(
            &format!("{} vertices", name),
            vertex_size,
            vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::GpuOnly,
        )?;
        let index_buffer = self.create_buffer(
            &format!("{} indices", name),
            index_size,
            vk::BufferUsageFlags::INDEX_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::GpuOnly,
        )?;

        let mut staging = self.create_buffer(
            &format!("{} staging", name),
            vertex_size + index_size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        staging.write(0, vertex_bytes)?;
        staging.write(vertex_size, index_bytes)?;

        let (src, vertex_dst, index_dst) = (staging.handle(), vertex_buffer.handle(), index_buffer.handle());
        self.ctx.immediate_submit(|device, cmd| unsafe {
            let vertex_copy = vk::BufferCopy { src_offset: 0, dst_offset: 0, size: vertex_size };
            device.cmd_copy_buffer(cmd, src, vertex_dst, &[vertex_copy]);
            let index_copy = vk::BufferCopy { src_offset: vertex_size, dst_offset: 0, size: index_size };
            device.cmd_copy_buffer(cmd, src, index_dst, &[index_copy]);
        })?;
        drop(staging);

        engine_debug!("rosy::vulkan", "Uploaded mesh '{}': {} vertices, {} indices", name, vertices.len(), indices.len());
        Ok(GpuMeshBuffers {
            vertex_buffer_address: vertex_buffer.device_address(),
            index_count: indices.len() as u32,
            index_buffer,
            vertex_buffer,
        })
    }

    /// Copy a buffer's contents back to the host
    ///
    /// The buffer needs `TRANSFER_SRC` usage unless it is host visible.
    pub fn read_back_buffer(&self, buffer: &AllocatedBuffer) -> Result<Vec<u8>> {
        if buffer.is_mapped() {
            return buffer.read();
        }
        let readback = self.create_buffer(
            &format!("{} readback", buffer.name()),
            buffer.size(),
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuToCpu,
        )?;
        let (src, dst, size) = (buffer.handle(), readback.handle(), buffer.size());
        self.ctx.immediate_submit(|device, cmd| unsafe {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            device.cmd_copy_buffer(cmd, src, dst, &[region]);
        })?;
        readback.read()
    }

    /// Image with undefined contents
    ///
    /// `mipmapped` allocates the full mip chain.
    pub fn create_image(
        &self,
        name: &str,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        mipmapped: bool,
    ) -> Result<AllocatedImage> {
        let mip_levels = if mipmapped { vulkan_image::mip_level_count(extent.width, extent.height) } else { 1 };
        self.create_image_layers(name, extent, format, usage, mip_levels, 1)
    }

    /// 2D array image with one extra view per layer
    pub fn create_image_array(
        &self,
        name: &str,
        extent: vk::Extent2D,
        layers: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> Result<AllocatedImage> {
        let extent = vk::Extent3D { width: extent.width, height: extent.height, depth: 1 };
        self.create_image_layers(name, extent, format, usage, 1, layers.max(1))
    }

    fn create_image_layers(
        &self,
        name: &str,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        mip_levels: u32,
        array_layers: u32,
    ) -> Result<AllocatedImage> {
        if extent.width == 0 || extent.height == 0 {
            engine_bail!("rosy::vulkan", InvalidResource => "Image '{}' has a zero extent", name);
        }
        let device = &self.ctx.device;
        let aspect = vulkan_image::aspect_for_format(format);

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent)
            .mip_levels(mip_levels)
            .array_layers(array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.create_image(&create_info, None) }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to create image '{}': {:?}", name, e))?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let allocation = match self.allocate(name, requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { device.destroy_image(image, None) };
                return Err(err);
            }
        };

        let cleanup = |allocation, views: &[vk::ImageView]| {
            unsafe {
                for &view in views {
                    device.destroy_image_view(view, None);
                }
            }
            self.free(allocation);
            unsafe { device.destroy_image(image, None) };
        };

        if let Err(e) = unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) } {
            cleanup(allocation, &[]);
            return Err(engine_err!("rosy::vulkan", "Failed to bind memory of image '{}': {:?}", name, e));
        }

        let view_type = if array_layers > 1 { vk::ImageViewType::TYPE_2D_ARRAY } else { vk::ImageViewType::TYPE_2D };
        let mut views = Vec::with_capacity(array_layers as usize + 1);
        let layer_ranges = std::iter::once((view_type, 0, array_layers)).chain(
            (0..array_layers)
                .filter(|_| array_layers > 1)
                .map(|layer| (vk::ImageViewType::TYPE_2D, layer, 1)),
        );
        for (view_type, base_layer, layer_count) in layer_ranges {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(view_type)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect,
                    base_mip_level: 0,
                    level_count: mip_levels,
                    base_array_layer: base_layer,
                    layer_count,
                });
            match unsafe { device.create_image_view(&view_info, None) } {
                Ok(view) => views.push(view),
                Err(e) => {
                    cleanup(allocation, &views);
                    return Err(engine_err!("rosy::vulkan", "Failed to create view of image '{}': {:?}", name, e));
                }
            }
        }

        let view = views.remove(0);
        self.ctx.set_debug_name(image, name);
        self.ctx.set_debug_name(view, name);
        Ok(AllocatedImage::new(
            Arc::clone(&self.ctx),
            image,
            view,
            views,
            allocation,
            extent,
            format,
            mip_levels,
            array_layers,
            name.to_string(),
        ))
    }

    /// Sampled image filled from tightly packed RGBA8 pixels
    ///
    /// Leaves the image in SHADER_READ_ONLY_OPTIMAL, with a blit-generated
    /// mip chain when `mipmapped`.
    pub fn create_image_with_data(
        &self,
        name: &str,
        pixels: &[u8],
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        mipmapped: bool,
    ) -> Result<AllocatedImage> {
        let expected = extent.width as u64 * extent.height as u64 * 4;
        if pixels.len() as u64 != expected {
            engine_bail!("rosy::vulkan", InvalidResource =>
                "Image '{}' is {}x{} but {} bytes were given", name, extent.width, extent.height, pixels.len());
        }

        let mut staging = self.create_buffer(
            &format!("{} staging", name),
            pixels.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        staging.write(0, pixels)?;

        let mut usage = usage | vk::ImageUsageFlags::TRANSFER_DST;
        if mipmapped {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        let image = self.create_image(
            name,
            vk::Extent3D { width: extent.width, height: extent.height, depth: 1 },
            format,
            usage,
            mipmapped,
        )?;

        let (src, dst, mip_levels) = (staging.handle(), image.handle(), image.mip_levels());
        self.ctx.immediate_submit(|device, cmd| {
            vulkan_image::transition_image(
                device,
                cmd,
                dst,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 });
            unsafe {
                device.cmd_copy_buffer_to_image(cmd, src, dst, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
            }
            if mip_levels > 1 {
                vulkan_image::generate_mipmaps(device, cmd, dst, extent, mip_levels);
            } else {
                vulkan_image::transition_image(
                    device,
                    cmd,
                    dst,
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                );
            }
        })?;
        Ok(image)
    }

    /// Sampled image with every level of `container` copied from one staging buffer
    pub fn create_image_from_container(
        &self,
        name: &str,
        container: &TextureContainer,
        usage: vk::ImageUsageFlags,
    ) -> Result<AllocatedImage> {
        container.validate()?;
        let mut staging = self.create_buffer(
            &format!("{} staging", name),
            container.data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        staging.write(0, &container.data)?;

        let image = self.create_image_layers(
            name,
            vk::Extent3D { width: container.width, height: container.height, depth: 1 },
            container.format,
            usage | vk::ImageUsageFlags::TRANSFER_DST,
            container.levels.len() as u32,
            1,
        )?;

        let regions: Vec<vk::BufferImageCopy> = container
            .levels
            .iter()
            .enumerate()
            .map(|(mip, level)| {
                vk::BufferImageCopy::default()
                    .buffer_offset(level.offset)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: mip as u32,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image_extent(vk::Extent3D { width: level.width, height: level.height, depth: 1 })
            })
            .collect();

        let (src, dst) = (staging.handle(), image.handle());
        self.ctx.immediate_submit(|device, cmd| {
            vulkan_image::transition_image(
                device,
                cmd,
                dst,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            unsafe {
                device.cmd_copy_buffer_to_image(cmd, src, dst, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &regions);
            }
            vulkan_image::transition_image(
                device,
                cmd,
                dst,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        })?;
        Ok(image)
    }

    pub fn create_sampler(&self, name: &str, info: &vk::SamplerCreateInfo) -> Result<vk::Sampler> {
        let mut info = *info;
        if info.anisotropy_enable == vk::TRUE && !self.ctx.supports_anisotropy {
            info = info.anisotropy_enable(false).max_anisotropy(1.0);
        }
        let sampler = unsafe { self.ctx.device.create_sampler(&info, None) }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to create sampler '{}': {:?}", name, e))?;
        self.ctx.set_debug_name(sampler, name);
        Ok(sampler)
    }

    pub fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.ctx.device.destroy_sampler(sampler, None) };
    }

    /// Destroy now; the caller guarantees the GPU no longer uses it
    pub fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        drop(buffer);
    }

    /// Destroy now; the caller guarantees the GPU no longer uses it
    pub fn destroy_image(&self, image: AllocatedImage) {
        drop(image);
    }

    fn free(&self, allocation: gpu_allocator::vulkan::Allocation) {
        if let Ok(mut guard) = self.ctx.allocator.lock() {
            if let Some(allocator) = guard.as_mut() {
                allocator.free(allocation).ok();
            }
        }
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<gpu_allocator::vulkan::Allocation> {
        let mut guard = self
            .ctx
            .allocator
            .lock()
            .map_err(|_| engine_err!("rosy::vulkan", "GPU allocator lock poisoned"))?;
        let allocator = guard
            .as_mut()
            .ok_or_else(|| engine_err!("rosy::vulkan", InvalidState => "GPU allocator already destroyed"))?;

        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("rosy::vulkan", "Out of GPU memory for '{}' ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })
    }
}

#[cfg(test)]
#[path = "vulkan_resources_tests.rs"]
mod tests;
