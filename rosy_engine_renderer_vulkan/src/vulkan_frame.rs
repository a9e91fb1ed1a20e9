/// FrameData - command buffers, sync objects and descriptors of one frame slot

use ash::vk;
use rosy_engine::rosy::Result;
use rosy_engine::rosy::gpu::PoolSizeRatio;
use rosy_engine::engine_err;

use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor::DescriptorAllocator;

/// Descriptor mix reserved per set by the per-frame allocators
pub fn frame_descriptor_ratios() -> [PoolSizeRatio<vk::DescriptorType>; 4] {
    [
        PoolSizeRatio { descriptor_type: vk::DescriptorType::STORAGE_IMAGE, ratio: 3.0 },
        PoolSizeRatio { descriptor_type: vk::DescriptorType::STORAGE_BUFFER, ratio: 3.0 },
        PoolSizeRatio { descriptor_type: vk::DescriptorType::UNIFORM_BUFFER, ratio: 3.0 },
        PoolSizeRatio { descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER, ratio: 4.0 },
    ]
}

pub struct FrameData {
    pub command_pool: vk::CommandPool,
    pub shadow_command_buffer: vk::CommandBuffer,
    pub render_command_buffer: vk::CommandBuffer,

    /// Signaled by acquire, waited by the shadow submission
    pub image_available: vk::Semaphore,
    /// Signaled by the shadow submission, waited by the render submission
    pub shadow_complete: vk::Semaphore,

    pub shadow_fence: vk::Fence,
    pub render_fence: vk::Fence,

    /// Cleared at the start of every frame using this slot
    pub descriptors: DescriptorAllocator,
}

impl FrameData {
    /// Create slot `index`; both fences start signaled
    pub fn new(ctx: &GpuContext, max_sets: u32, index: usize) -> Result<Self> {
        let device = &ctx.device;
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(ctx.graphics_queue_family);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to create frame {} command pool: {:?}", index, e))?;

        let descriptors = match DescriptorAllocator::init(ctx, max_sets, &frame_descriptor_ratios()) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(e);
            }
        };

        // Partially built frames are torn down through `destroy`
        let mut frame = Self {
            command_pool,
            shadow_command_buffer: vk::CommandBuffer::null(),
            render_command_buffer: vk::CommandBuffer::null(),
            image_available: vk::Semaphore::null(),
            shadow_complete: vk::Semaphore::null(),
            shadow_fence: vk::Fence::null(),
            render_fence: vk::Fence::null(),
            descriptors,
        };
        if let Err(e) = frame.create_objects(ctx, index) {
            frame.destroy(ctx);
            return Err(e);
        }
        Ok(frame)
    }

    fn create_objects(&mut self, ctx: &GpuContext, index: usize) -> Result<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(2);
        let buffers = unsafe { ctx.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to allocate frame {} command buffers: {:?}", index, e))?;
        let &[shadow, render] = buffers.as_slice() else {
            return Err(engine_err!("rosy::vulkan", InitializationFailed => "Driver returned {} command buffers", buffers.len()));
        };
        self.shadow_command_buffer = shadow;
        self.render_command_buffer = render;
        ctx.set_debug_name(shadow, &format!("frame {} shadow commands", index));
        ctx.set_debug_name(render, &format!("frame {} render commands", index));

        self.image_available = ctx.create_semaphore(&format!("frame {} image available", index))?;
        self.shadow_complete = ctx.create_semaphore(&format!("frame {} shadow complete", index))?;
        self.shadow_fence = ctx.create_fence(true, &format!("frame {} shadow fence", index))?;
        self.render_fence = ctx.create_fence(true, &format!("frame {} render fence", index))?;
        Ok(())
    }

    /// Destroy every object; the device must be idle
    pub fn destroy(&mut self, ctx: &GpuContext) {
        self.descriptors.destroy_pools(ctx);
        let device = &ctx.device;
        unsafe {
            for fence in [self.shadow_fence, self.render_fence] {
                if fence != vk::Fence::null() {
                    device.destroy_fence(fence, None);
                }
            }
            for semaphore in [self.image_available, self.shadow_complete] {
                if semaphore != vk::Semaphore::null() {
                    device.destroy_semaphore(semaphore, None);
                }
            }
            // Frees the command buffers with it
            if self.command_pool != vk::CommandPool::null() {
                device.destroy_command_pool(self.command_pool, None);
            }
        }
        self.shadow_fence = vk::Fence::null();
        self.render_fence = vk::Fence::null();
        self.image_available = vk::Semaphore::null();
        self.shadow_complete = vk::Semaphore::null();
        self.command_pool = vk::CommandPool::null();
    }
}
