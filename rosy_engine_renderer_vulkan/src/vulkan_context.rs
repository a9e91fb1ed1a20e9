/// GpuContext - shared Vulkan device state
///
/// Owns the instance, the logical device, the memory allocator, the graphics
/// queue and the immediate-submit command buffer. Every GPU resource keeps an
/// `Arc<GpuContext>`, so the device outlives all of them: the context is
/// destroyed when the last resource is dropped.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::sync::{Arc, Mutex};
use rosy_engine::rosy::{Config, Error, Result};
use rosy_engine::rosy::gpu::{DescriptorPoolBackend, FenceBackend, PoolAllocFailure, PoolSizeRatio, descriptor_count};
use rosy_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_device::{self, PhysicalDeviceChoice, REQUIRED_DEVICE_EXTENSIONS};

const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

/// One-shot command buffer for load-time uploads
struct ImmediateSubmit {
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
}

pub struct GpuContext {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Taken on drop, before the device is destroyed
    pub allocator: Mutex<Option<Allocator>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    pub surface_loader: ash::khr::surface::Instance,
    pub shader_object: ash::ext::shader_object::Device,

    pub(crate) debug_utils_instance: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    debug_utils_device: Option<ash::ext::debug_utils::Device>,

    pub device_name: String,
    pub supports_tessellation: bool,
    pub supports_geometry: bool,
    pub supports_wireframe: bool,
    pub supports_anisotropy: bool,

    /// Bound on every fence wait issued through the context
    pub fence_timeout_ns: u64,

    immediate: Mutex<ImmediateSubmit>,
}

impl GpuContext {
    /// Create the instance, the window surface and the device
    ///
    /// The surface is returned separately; the swapchain takes ownership of it.
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` on the first failing step. Objects
    /// created before the failure are destroyed.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: &Config,
    ) -> Result<(Arc<Self>, vk::SurfaceKHR)> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            engine_err!("rosy::vulkan", InitializationFailed => "Failed to load Vulkan library: {:?}", e)
        })?;

        let display_handle = window.display_handle().map_err(|e| {
            engine_err!("rosy::vulkan", InitializationFailed => "Failed to get display handle: {}", e)
        })?;
        let window_handle = window.window_handle().map_err(|e| {
            engine_err!("rosy::vulkan", InitializationFailed => "Failed to get window handle: {}", e)
        })?;

        let enable_validation = config.enable_validation && validation_layer_available(&entry);
        if config.enable_validation && !enable_validation {
            engine_warn!("rosy::vulkan", "Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }

        let instance = create_instance(&entry, display_handle.as_raw(), &config.app_name, enable_validation)?;

        let (debug_utils_instance, debug_messenger) = if enable_validation {
            match create_debug_messenger(&entry, &instance, config) {
                Ok((loader, messenger)) => (Some(loader), Some(messenger)),
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            }
        } else {
            (None, None)
        };

        let destroy_instance = |instance: &ash::Instance| unsafe {
            if let (Some(loader), Some(messenger)) = (&debug_utils_instance, debug_messenger) {
                crate::debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            instance.destroy_instance(None);
        };

        let surface = match unsafe {
            ash_window::create_surface(&entry, &instance, display_handle.as_raw(), window_handle.as_raw(), None)
        } {
            Ok(surface) => surface,
            Err(e) => {
                destroy_instance(&instance);
                return Err(engine_err!("rosy::vulkan", InitializationFailed => "Failed to create surface: {:?}", e));
            }
        };
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let device_parts = vulkan_device::select_physical_device(
            &instance,
            &surface_loader,
            surface,
            config.preferred_vendor_id,
        )
        .and_then(|choice| create_device(&instance, &choice).map(|device| (choice, device)));

        let (choice, device) = match device_parts {
            Ok(parts) => parts,
            Err(err) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                destroy_instance(&instance);
                return Err(err);
            }
        };

        let context = Self::finish(
            entry,
            instance,
            device,
            choice,
            surface_loader,
            debug_utils_instance,
            debug_messenger,
            config.fence_timeout_ns,
        );
        match context {
            Ok(context) => Ok((Arc::new(context), surface)),
            Err((err, instance, surface_loader, device, debug)) => {
                unsafe {
                    device.destroy_device(None);
                    surface_loader.destroy_surface(surface, None);
                    if let (Some(loader), Some(messenger)) = debug {
                        crate::debug::cleanup_debug_config();
                        loader.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                }
                Err(err)
            }
        }
    }

    /// Allocator, immediate-submit objects and extension loaders
    #[allow(clippy::type_complexity, clippy::too_many_arguments)]
    fn finish(
        entry: ash::Entry,
        instance: ash::Instance,
        device: ash::Device,
        choice: PhysicalDeviceChoice,
        surface_loader: ash::khr::surface::Instance,
        debug_utils_instance: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
        fence_timeout_ns: u64,
    ) -> std::result::Result<
        Self,
        (
            Error,
            ash::Instance,
            ash::khr::surface::Instance,
            ash::Device,
            (Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>),
        ),
    > {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device: choice.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                let err = engine_err!("rosy::vulkan", InitializationFailed => "Failed to create GPU allocator: {:?}", e);
                return Err((err, instance, surface_loader, device, (debug_utils_instance, debug_messenger)));
            }
        };

        let immediate = match create_immediate_submit(&device, choice.queue_family) {
            Ok(immediate) => immediate,
            Err(err) => {
                drop(allocator);
                return Err((err, instance, surface_loader, device, (debug_utils_instance, debug_messenger)));
            }
        };

        let graphics_queue = unsafe { device.get_device_queue(choice.queue_family, 0) };
        let shader_object = ash::ext::shader_object::Device::new(&instance, &device);
        let debug_utils_device = debug_utils_instance
            .as_ref()
            .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));

        engine_info!("rosy::vulkan", "Vulkan device ready on '{}'", choice.name);

        Ok(Self {
            entry,
            instance,
            physical_device: choice.physical_device,
            device,
            allocator: Mutex::new(Some(allocator)),
            graphics_queue,
            graphics_queue_family: choice.queue_family,
            surface_loader,
            shader_object,
            debug_utils_instance,
            debug_messenger,
            debug_utils_device,
            device_name: choice.name,
            supports_tessellation: choice.features.tessellation_shader,
            supports_geometry: choice.features.geometry_shader,
            supports_wireframe: choice.features.fill_mode_non_solid,
            supports_anisotropy: choice.features.sampler_anisotropy,
            fence_timeout_ns,
            immediate: Mutex::new(immediate),
        })
    }

    /// Attach a debug name to a Vulkan handle (no-op without debug utils)
    pub fn set_debug_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(debug_utils) = &self.debug_utils_device else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&name);
        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            engine_debug!("rosy::vulkan", "Failed to set debug name {:?}: {:?}", name, e);
        }
    }

    /// Record `record` into the immediate command buffer, submit it and
    /// block until the GPU has executed it
    ///
    /// Only for load and build time work; frames never call it.
    pub fn immediate_submit<F: FnOnce(&ash::Device, vk::CommandBuffer)>(&self, record: F) -> Result<()> {
        let immediate = self
            .immediate
            .lock()
            .map_err(|_| engine_err!("rosy::vulkan", "Immediate submit lock poisoned"))?;
        let cmd = immediate.command_buffer;

        unsafe {
            self.device.reset_fences(&[immediate.fence]).map_err(|e| {
                engine_err!("rosy::vulkan", "Failed to reset immediate fence: {:?}", e)
            })?;
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("rosy::vulkan", "Failed to reset immediate command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device.begin_command_buffer(cmd, &begin_info).map_err(|e| {
                engine_err!("rosy::vulkan", "Failed to begin immediate command buffer: {:?}", e)
            })?;

            record(&self.device, cmd);

            self.device.end_command_buffer(cmd).map_err(|e| {
                engine_err!("rosy::vulkan", "Failed to end immediate command buffer: {:?}", e)
            })?;

            let command_buffers = [vk::CommandBufferSubmitInfo::default().command_buffer(cmd)];
            let submit = vk::SubmitInfo2::default().command_buffer_infos(&command_buffers);
            self.device
                .queue_submit2(self.graphics_queue, &[submit], immediate.fence)
                .map_err(|e| engine_err!("rosy::vulkan", "Failed to submit immediate commands: {:?}", e))?;
        }

        settle_submission(self.wait_fence(immediate.fence, self.fence_timeout_ns), || self.wait_idle())
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to wait for device idle: {:?}", e))
    }

    pub fn create_fence(&self, signaled: bool, name: &str) -> Result<vk::Fence> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to create fence '{}': {:?}", name, e))?;
        self.set_debug_name(fence, name);
        Ok(fence)
    }

    pub fn create_semaphore(&self, name: &str) -> Result<vk::Semaphore> {
        let semaphore = unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to create semaphore '{}': {:?}", name, e))?;
        self.set_debug_name(semaphore, name);
        Ok(semaphore)
    }
}

impl DescriptorPoolBackend for GpuContext {
    type Pool = vk::DescriptorPool;
    type Layout = vk::DescriptorSetLayout;
    type Set = vk::DescriptorSet;
    type DescriptorType = vk::DescriptorType;

    fn create_pool(&self, max_sets: u32, ratios: &[PoolSizeRatio<vk::DescriptorType>]) -> Result<vk::DescriptorPool> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = ratios
            .iter()
            .map(|r| vk::DescriptorPoolSize {
                ty: r.descriptor_type,
                descriptor_count: descriptor_count(r.ratio, max_sets),
            })
            .collect();
        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        unsafe { self.device.create_descriptor_pool(&info, None) }.map_err(|e| match e {
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                engine_error!("rosy::descriptor", "Out of memory creating a pool of {} sets", max_sets);
                Error::OutOfMemory
            }
            other => engine_err!("rosy::descriptor", "Failed to create descriptor pool: {:?}", other),
        })
    }

    fn allocate_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> std::result::Result<vk::DescriptorSet, PoolAllocFailure> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        match unsafe { self.device.allocate_descriptor_sets(&info) } {
            Ok(sets) => sets
                .first()
                .copied()
                .ok_or_else(|| PoolAllocFailure::Fatal(engine_err!("rosy::descriptor", "Driver returned no descriptor set"))),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) => Err(PoolAllocFailure::OutOfPoolMemory),
            Err(vk::Result::ERROR_FRAGMENTED_POOL) => Err(PoolAllocFailure::FragmentedPool),
            Err(e) => Err(PoolAllocFailure::Fatal(engine_err!(
                "rosy::descriptor", "Failed to allocate descriptor set: {:?}", e
            ))),
        }
    }

    fn reset_pool(&self, pool: vk::DescriptorPool) -> Result<()> {
        unsafe { self.device.reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty()) }
            .map_err(|e| engine_err!("rosy::descriptor", "Failed to reset descriptor pool: {:?}", e))
    }

    fn destroy_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) };
    }
}

impl FenceBackend for GpuContext {
    type Fence = vk::Fence;

    fn wait_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        match unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => {
                engine_error!("rosy::vulkan", "Fence wait exceeded {} ns", timeout_ns);
                Err(Error::Timeout(format!("fence not signaled after {} ns", timeout_ns)))
            }
            Err(e) => Err(engine_err!("rosy::vulkan", "Failed to wait for fence: {:?}", e)),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe { self.device.reset_fences(&[fence]) }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to reset fence: {:?}", e))
    }
}

/// Result of a submitted batch whose fence wait is `wait`
///
/// A failed wait leaves the batch possibly in flight, so the device is
/// drained before the caller drops the buffers it reads.
fn settle_submission(wait: Result<()>, wait_idle: impl FnOnce() -> Result<()>) -> Result<()> {
    if let Err(e) = &wait {
        engine_warn!("rosy::vulkan", "Immediate submit did not complete ({}), waiting for device idle", e);
        if let Err(idle) = wait_idle() {
            engine_error!("rosy::vulkan", "Device idle after failed submit: {}", idle);
        }
    }
    wait
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(immediate) = self.immediate.get_mut() {
                self.device.destroy_fence(immediate.fence, None);
                self.device.destroy_command_pool(immediate.pool, None);
            }

            // Free device memory pages while the device is still alive
            if let Ok(allocator) = self.allocator.get_mut() {
                drop(allocator.take());
            }

            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils_instance, self.debug_messenger) {
                crate::debug::cleanup_debug_config();
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

fn validation_layer_available(entry: &ash::Entry) -> bool {
    unsafe { entry.enumerate_instance_layer_properties() }
        .unwrap_or_default()
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER))
}

fn create_instance(
    entry: &ash::Entry,
    display_handle: raw_window_handle::RawDisplayHandle,
    app_name: &str,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name).map_err(|e| {
        engine_err!("rosy::vulkan", InitializationFailed => "Invalid application name: {}", e)
    })?;
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(c"Rosy")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);

    let mut extension_names = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| engine_err!("rosy::vulkan", InitializationFailed => "Failed to get required extensions: {}", e))?
        .to_vec();
    if enable_validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    let layer_names = if enable_validation { vec![VALIDATION_LAYER.as_ptr()] } else { vec![] };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_layer_names(&layer_names)
        .enabled_extension_names(&extension_names);

    unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        engine_err!("rosy::vulkan", InitializationFailed => "Failed to create Vulkan instance: {:?}", e)
    })
}

fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    config: &Config,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    crate::debug::init_debug_config(crate::debug::Config::from(config));

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(crate::debug::severity_flags(config.debug_severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&debug_info, None) }.map_err(|e| {
        crate::debug::cleanup_debug_config();
        engine_err!("rosy::vulkan", InitializationFailed => "Failed to create debug messenger: {:?}", e)
    })?;
    Ok((debug_utils, messenger))
}

fn create_device(instance: &ash::Instance, choice: &PhysicalDeviceChoice) -> Result<ash::Device> {
    let queue_priorities = [1.0];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(choice.queue_family)
        .queue_priorities(&queue_priorities)];

    let extension_names: Vec<*const std::ffi::c_char> =
        REQUIRED_DEVICE_EXTENSIONS.iter().map(|name| name.as_ptr()).collect();

    let core_features = vk::PhysicalDeviceFeatures::default()
        .tessellation_shader(choice.features.tessellation_shader)
        .geometry_shader(choice.features.geometry_shader)
        .fill_mode_non_solid(choice.features.fill_mode_non_solid)
        .sampler_anisotropy(choice.features.sampler_anisotropy);
    let mut features11 = vk::PhysicalDeviceVulkan11Features::default().multiview(true);
    let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
        .buffer_device_address(true)
        .descriptor_indexing(true);
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);
    let mut shader_object = vk::PhysicalDeviceShaderObjectFeaturesEXT::default().shader_object(true);
    let mut depth_clip = vk::PhysicalDeviceDepthClipEnableFeaturesEXT::default().depth_clip_enable(true);
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .features(core_features)
        .push_next(&mut features11)
        .push_next(&mut features12)
        .push_next(&mut features13)
        .push_next(&mut shader_object)
        .push_next(&mut depth_clip);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    unsafe { instance.create_device(choice.physical_device, &create_info, None) }.map_err(|e| {
        engine_err!("rosy::vulkan", InitializationFailed => "Failed to create logical device: {:?}", e)
    })
}

fn create_immediate_submit(device: &ash::Device, queue_family: u32) -> Result<ImmediateSubmit> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family)
        .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    unsafe {
        let pool = device.create_command_pool(&pool_info, None).map_err(|e| {
            engine_err!("rosy::vulkan", InitializationFailed => "Failed to create immediate command pool: {:?}", e)
        })?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = match device.allocate_command_buffers(&alloc_info) {
            Ok(buffers) => buffers[0],
            Err(e) => {
                device.destroy_command_pool(pool, None);
                return Err(engine_err!("rosy::vulkan", InitializationFailed =>
                    "Failed to allocate immediate command buffer: {:?}", e));
            }
        };

        let fence = match device.create_fence(&vk::FenceCreateInfo::default(), None) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_command_pool(pool, None);
                return Err(engine_err!("rosy::vulkan", InitializationFailed =>
                    "Failed to create immediate fence: {:?}", e));
            }
        };

        Ok(ImmediateSubmit { pool, command_buffer, fence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_completed_submission_skips_idle() {
        let idled = Cell::new(false);
        let result = settle_submission(Ok(()), || {
            idled.set(true);
            Ok(())
        });
        assert!(result.is_ok());
        assert!(!idled.get());
    }

    #[test]
    fn test_timed_out_submission_drains_device() {
        let idled = Cell::new(false);
        let result = settle_submission(Err(Error::Timeout("fence".to_string())), || {
            idled.set(true);
            Ok(())
        });
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(idled.get());
    }

    #[test]
    fn test_original_error_kept_when_idle_fails() {
        let result = settle_submission(Err(Error::Timeout("fence".to_string())), || {
            Err(Error::BackendError("device lost".to_string()))
        });
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
