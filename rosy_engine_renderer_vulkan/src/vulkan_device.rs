/// Physical device selection
///
/// A device qualifies when it supports every required feature and extension
/// and exposes a queue family with graphics, compute, transfer and sparse
/// binding, 64 timestamp bits and presentation to the window surface. Among
/// qualifying families the one with the most queues wins. The selection
/// rules are plain functions over queried data so they can be tested
/// without a GPU.

use ash::vk;
use std::ffi::CStr;
use rosy_engine::rosy::Result;
use rosy_engine::{engine_bail, engine_debug, engine_err, engine_info};

/// Queue capabilities every frame submission relies on
pub const REQUIRED_QUEUE_FLAGS: vk::QueueFlags = vk::QueueFlags::from_raw(
    vk::QueueFlags::GRAPHICS.as_raw()
        | vk::QueueFlags::COMPUTE.as_raw()
        | vk::QueueFlags::TRANSFER.as_raw()
        | vk::QueueFlags::SPARSE_BINDING.as_raw(),
);

pub const REQUIRED_TIMESTAMP_BITS: u32 = 64;

pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 3] = [
    ash::khr::swapchain::NAME,
    ash::ext::shader_object::NAME,
    ash::ext::depth_clip_enable::NAME,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub index: u32,
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    pub timestamp_valid_bits: u32,
    pub supports_present: bool,
}

impl QueueFamilyInfo {
    pub fn qualifies(&self) -> bool {
        self.flags.contains(REQUIRED_QUEUE_FLAGS)
            && self.timestamp_valid_bits >= REQUIRED_TIMESTAMP_BITS
            && self.supports_present
            && self.queue_count > 0
    }
}

/// Qualifying family with the most queues; the lowest index wins ties
pub fn pick_queue_family(families: &[QueueFamilyInfo]) -> Option<u32> {
    families
        .iter()
        .filter(|f| f.qualifies())
        .fold(None::<&QueueFamilyInfo>, |best, family| match best {
            Some(b) if b.queue_count >= family.queue_count => Some(b),
            _ => Some(family),
        })
        .map(|f| f.index)
}

/// Feature bits read from the physical device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFeatureSupport {
    pub shader_object: bool,
    pub depth_clip_enable: bool,
    pub buffer_device_address: bool,
    pub descriptor_indexing: bool,
    pub dynamic_rendering: bool,
    pub synchronization2: bool,
    pub multiview: bool,
    pub tessellation_shader: bool,
    pub geometry_shader: bool,
    /// Wireframe rasterization
    pub fill_mode_non_solid: bool,
    pub sampler_anisotropy: bool,
}

impl DeviceFeatureSupport {
    /// Required features the device lacks
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.shader_object, "shaderObject"),
            (self.depth_clip_enable, "depthClipEnable"),
            (self.buffer_device_address, "bufferDeviceAddress"),
            (self.descriptor_indexing, "descriptorIndexing"),
            (self.dynamic_rendering, "dynamicRendering"),
            (self.synchronization2, "synchronization2"),
            (self.multiview, "multiview"),
        ]
        .into_iter()
        .filter(|(supported, _)| !supported)
        .map(|(_, name)| name)
        .collect()
    }
}

/// Summary of a qualifying device used for ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub vendor_id: u32,
    pub discrete: bool,
}

/// Index of the candidate to use
///
/// With a vendor filter only that vendor's devices are eligible. Discrete GPUs
/// are preferred over integrated ones.
pub fn choose_candidate(candidates: &[DeviceCandidate], vendor_filter: Option<u32>) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| vendor_filter.is_none_or(|v| v == c.vendor_id))
        // earlier candidates win ties
        .max_by_key(|(index, c)| (c.discrete, std::cmp::Reverse(*index)))
        .map(|(index, _)| index)
}

/// The device picked by [`select_physical_device`]
#[derive(Debug, Clone)]
pub struct PhysicalDeviceChoice {
    pub physical_device: vk::PhysicalDevice,
    pub queue_family: u32,
    pub name: String,
    pub vendor_id: u32,
    pub features: DeviceFeatureSupport,
}

/// Query every feature Rosy enables or checks
///
/// # Safety
///
/// `physical_device` must come from `instance`.
pub unsafe fn query_features(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> DeviceFeatureSupport {
    let mut features11 = vk::PhysicalDeviceVulkan11Features::default();
    let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut shader_object = vk::PhysicalDeviceShaderObjectFeaturesEXT::default();
    let mut depth_clip = vk::PhysicalDeviceDepthClipEnableFeaturesEXT::default();

    let core = {
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut features11)
            .push_next(&mut features12)
            .push_next(&mut features13)
            .push_next(&mut shader_object)
            .push_next(&mut depth_clip);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        features2.features
    };

    DeviceFeatureSupport {
        shader_object: shader_object.shader_object == vk::TRUE,
        depth_clip_enable: depth_clip.depth_clip_enable == vk::TRUE,
        buffer_device_address: features12.buffer_device_address == vk::TRUE,
        descriptor_indexing: features12.descriptor_indexing == vk::TRUE,
        dynamic_rendering: features13.dynamic_rendering == vk::TRUE,
        synchronization2: features13.synchronization2 == vk::TRUE,
        multiview: features11.multiview == vk::TRUE,
        tessellation_shader: core.tessellation_shader == vk::TRUE,
        geometry_shader: core.geometry_shader == vk::TRUE,
        fill_mode_non_solid: core.fill_mode_non_solid == vk::TRUE,
        sampler_anisotropy: core.sampler_anisotropy == vk::TRUE,
    }
}

unsafe fn query_queue_families(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Vec<QueueFamilyInfo> {
    let properties = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    properties
        .iter()
        .enumerate()
        .map(|(index, family)| {
            let index = index as u32;
            let supports_present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(physical_device, index, surface)
                    .unwrap_or(false)
            };
            QueueFamilyInfo {
                index,
                flags: family.queue_flags,
                queue_count: family.queue_count,
                timestamp_valid_bits: family.timestamp_valid_bits,
                supports_present,
            }
        })
        .collect()
}

unsafe fn missing_extensions(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Vec<String> {
    let available = unsafe { instance.enumerate_device_extension_properties(physical_device) }
        .unwrap_or_default();
    REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .filter(|required| {
            !available
                .iter()
                .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == **required))
        })
        .map(|required| required.to_string_lossy().into_owned())
        .collect()
}

/// Pick the physical device and queue family to render with
///
/// # Errors
///
/// `Error::InitializationFailed` when no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    preferred_vendor: Option<u32>,
) -> Result<PhysicalDeviceChoice> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        engine_err!("rosy::vulkan", InitializationFailed => "Failed to enumerate physical devices: {:?}", e)
    })?;

    let mut choices = Vec::new();
    let mut candidates = Vec::new();

    for physical_device in devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unknown device".to_string());

        if properties.api_version < vk::API_VERSION_1_3 {
            engine_debug!("rosy::vulkan", "Skipping '{}': Vulkan 1.3 not supported", name);
            continue;
        }
        let missing_ext = unsafe { missing_extensions(instance, physical_device) };
        if !missing_ext.is_empty() {
            engine_debug!("rosy::vulkan", "Skipping '{}': missing extensions {:?}", name, missing_ext);
            continue;
        }
        let features = unsafe { query_features(instance, physical_device) };
        let missing = features.missing();
        if !missing.is_empty() {
            engine_debug!("rosy::vulkan", "Skipping '{}': missing features {:?}", name, missing);
            continue;
        }
        let families = unsafe { query_queue_families(instance, surface_loader, surface, physical_device) };
        let Some(queue_family) = pick_queue_family(&families) else {
            engine_debug!("rosy::vulkan", "Skipping '{}': no qualifying queue family", name);
            continue;
        };

        candidates.push(DeviceCandidate {
            vendor_id: properties.vendor_id,
            discrete: properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
        });
        choices.push(PhysicalDeviceChoice {
            physical_device,
            queue_family,
            name,
            vendor_id: properties.vendor_id,
            features,
        });
    }

    let index = match (choose_candidate(&candidates, preferred_vendor), preferred_vendor) {
        (Some(index), _) => index,
        (None, Some(vendor)) if !candidates.is_empty() => engine_bail!("rosy::vulkan", InitializationFailed =>
            "No qualifying GPU from vendor {:#06x} ({} other device(s) qualify)", vendor, candidates.len()),
        (None, _) => engine_bail!("rosy::vulkan", InitializationFailed =>
            "No GPU supports shader objects, dynamic rendering, synchronization2, buffer device address and multiview"),
    };
    let choice = choices.swap_remove(index);

    engine_info!("rosy::vulkan", "Using GPU '{}' (queue family {})", choice.name, choice.queue_family);
    Ok(choice)
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
