/// Descriptor set layouts, writes and the growable Vulkan allocator

use ash::vk;
use rosy_engine::rosy::Result;
use rosy_engine::rosy::gpu::GrowableDescriptorAllocator;
use rosy_engine::engine_err;

use crate::vulkan_context::GpuContext;

/// Growable descriptor allocator over real Vulkan pools
pub type DescriptorAllocator = GrowableDescriptorAllocator<GpuContext>;

/// Collects bindings, then creates one set layout
#[derive(Debug, Default)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binding(mut self, binding: u32, descriptor_type: vk::DescriptorType) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1),
        );
        self
    }

    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'static>] {
        &self.bindings
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Create the layout with every binding visible to `stages`
    pub fn build(&self, ctx: &GpuContext, stages: vk::ShaderStageFlags, name: &str) -> Result<vk::DescriptorSetLayout> {
        let bindings: Vec<_> = self.bindings.iter().map(|b| b.stage_flags(stages)).collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { ctx.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to create descriptor set layout '{}': {:?}", name, e))?;
        ctx.set_debug_name(layout, name);
        Ok(layout)
    }
}

#[derive(Debug, Clone, Copy)]
enum PendingInfo {
    Image(usize),
    Buffer(usize),
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    info: PendingInfo,
}

/// Batches image and buffer writes for one `vkUpdateDescriptorSets` call
#[derive(Debug, Default)]
pub struct DescriptorWriter {
    images: Vec<vk::DescriptorImageInfo>,
    buffers: Vec<vk::DescriptorBufferInfo>,
    writes: Vec<PendingWrite>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_image(
        &mut self,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
        descriptor_type: vk::DescriptorType,
    ) -> &mut Self {
        self.images.push(vk::DescriptorImageInfo { sampler, image_view: view, image_layout: layout });
        self.writes.push(PendingWrite {
            binding,
            descriptor_type,
            info: PendingInfo::Image(self.images.len() - 1),
        });
        self
    }

    pub fn write_buffer(
        &mut self,
        binding: u32,
        buffer: vk::Buffer,
        size: u64,
        offset: u64,
        descriptor_type: vk::DescriptorType,
    ) -> &mut Self {
        self.buffers.push(vk::DescriptorBufferInfo { buffer, offset, range: size });
        self.writes.push(PendingWrite {
            binding,
            descriptor_type,
            info: PendingInfo::Buffer(self.buffers.len() - 1),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.buffers.clear();
        self.writes.clear();
    }

    /// Apply every pending write to `set`
    pub fn update_set(&self, device: &ash::Device, set: vk::DescriptorSet) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|pending| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(pending.binding)
                    .descriptor_type(pending.descriptor_type);
                match pending.info {
                    PendingInfo::Image(i) => write.image_info(std::slice::from_ref(&self.images[i])),
                    PendingInfo::Buffer(i) => write.buffer_info(std::slice::from_ref(&self.buffers[i])),
                }
            })
            .collect();
        unsafe { device.update_descriptor_sets(&writes, &[]) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_builder_keeps_binding_order() {
        let builder = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER)
            .add_binding(2, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        let bindings = builder.bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[1].binding, 2);
        assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[0].descriptor_count, 1);
    }

    #[test]
    fn test_writer_indexes_its_own_infos() {
        let mut writer = DescriptorWriter::new();
        writer
            .write_buffer(0, vk::Buffer::null(), 64, 0, vk::DescriptorType::UNIFORM_BUFFER)
            .write_image(
                1,
                vk::ImageView::null(),
                vk::Sampler::null(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            )
            .write_buffer(2, vk::Buffer::null(), 16, 32, vk::DescriptorType::STORAGE_BUFFER);

        assert_eq!(writer.len(), 3);
        assert!(matches!(writer.writes[2].info, PendingInfo::Buffer(1)));
        assert!(matches!(writer.writes[1].info, PendingInfo::Image(0)));

        writer.clear();
        assert!(writer.is_empty());
        assert!(writer.buffers.is_empty());
    }
}
