/// AllocatedBuffer - a VkBuffer and its gpu-allocator allocation

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;
use rosy_engine::rosy::Result;
use rosy_engine::{engine_bail, engine_err};

use crate::vulkan_context::GpuContext;

/// Exclusively owned GPU buffer, freed on drop
pub struct AllocatedBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    device_address: Option<vk::DeviceAddress>,
    name: String,
}

impl AllocatedBuffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
        device_address: Option<vk::DeviceAddress>,
        name: String,
    ) -> Self {
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            device_address,
            name,
        }
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device address, 0 for buffers created without `SHADER_DEVICE_ADDRESS`
    pub fn device_address(&self) -> u64 {
        self.device_address.unwrap_or(0)
    }

    /// True when the memory is host visible and persistently mapped
    pub fn is_mapped(&self) -> bool {
        self.allocation.as_ref().is_some_and(|a| a.mapped_ptr().is_some())
    }

    /// Copy `data` into the mapped memory at `offset`
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` if the buffer is not host visible or the
    /// range does not fit.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.is_none_or(|end| end > self.size) {
            engine_bail!("rosy::vulkan", InvalidResource =>
                "Write of {} bytes at {} overflows buffer '{}' ({} bytes)", data.len(), offset, self.name, self.size);
        }
        let Some(mapped) = self.allocation.as_mut().and_then(|a| a.mapped_slice_mut()) else {
            engine_bail!("rosy::vulkan", InvalidResource => "Buffer '{}' is not host visible", self.name);
        };
        let start = offset as usize;
        mapped[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Write a slice of plain-old-data values at `offset`
    pub fn write_pod<T: Pod>(&mut self, offset: u64, values: &[T]) -> Result<()> {
        self.write(offset, bytemuck::cast_slice(values))
    }

    /// Copy the whole mapped contents out
    pub fn read(&self) -> Result<Vec<u8>> {
        let mapped = self
            .allocation
            .as_ref()
            .and_then(|a| a.mapped_slice())
            .ok_or_else(|| engine_err!("rosy::vulkan", InvalidResource => "Buffer '{}' is not host visible", self.name))?;
        Ok(mapped[..self.size as usize].to_vec())
    }
}

impl std::fmt::Debug for AllocatedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatedBuffer")
            .field("name", &self.name)
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .field("device_address", &self.device_address)
            .finish()
    }
}

impl Drop for AllocatedBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            // Don't panic if the lock fails, the buffer still has to go
            if let Ok(mut guard) = self.ctx.allocator.lock() {
                if let Some(allocator) = guard.as_mut() {
                    allocator.free(allocation).ok();
                }
            }
        }
        unsafe { self.ctx.device.destroy_buffer(self.buffer, None) };
    }
}
