use ash::vk;
use super::*;

fn family(index: u32, queue_count: u32) -> QueueFamilyInfo {
    QueueFamilyInfo {
        index,
        flags: REQUIRED_QUEUE_FLAGS,
        queue_count,
        timestamp_valid_bits: 64,
        supports_present: true,
    }
}

// ============================================================================
// Queue family selection
// ============================================================================

#[test]
fn test_family_with_most_queues_wins() {
    let families = [family(0, 1), family(1, 16), family(2, 8)];
    assert_eq!(pick_queue_family(&families), Some(1));
}

#[test]
fn test_tie_keeps_lowest_index() {
    let families = [family(0, 4), family(1, 4)];
    assert_eq!(pick_queue_family(&families), Some(0));
}

#[test]
fn test_family_without_sparse_binding_rejected() {
    let mut graphics_only = family(0, 16);
    graphics_only.flags = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
    let families = [graphics_only, family(1, 2)];
    assert_eq!(pick_queue_family(&families), Some(1));
}

#[test]
fn test_family_needs_timestamps_and_present() {
    let mut short_timestamps = family(0, 16);
    short_timestamps.timestamp_valid_bits = 36;
    let mut no_present = family(1, 16);
    no_present.supports_present = false;

    assert_eq!(pick_queue_family(&[short_timestamps, no_present]), None);
}

#[test]
fn test_no_families() {
    assert_eq!(pick_queue_family(&[]), None);
}

// ============================================================================
// Features
// ============================================================================

#[test]
fn test_missing_features_listed() {
    let support = DeviceFeatureSupport {
        shader_object: true,
        depth_clip_enable: true,
        buffer_device_address: true,
        descriptor_indexing: true,
        dynamic_rendering: true,
        synchronization2: false,
        multiview: false,
        tessellation_shader: false,
        geometry_shader: false,
        fill_mode_non_solid: false,
        sampler_anisotropy: false,
    };
    assert_eq!(support.missing(), vec!["synchronization2", "multiview"]);
}

#[test]
fn test_optional_stages_not_required() {
    let support = DeviceFeatureSupport {
        shader_object: true,
        depth_clip_enable: true,
        buffer_device_address: true,
        descriptor_indexing: true,
        dynamic_rendering: true,
        synchronization2: true,
        multiview: true,
        ..Default::default()
    };
    assert!(support.missing().is_empty());
}

// ============================================================================
// Device ranking
// ============================================================================

const INTEGRATED: DeviceCandidate = DeviceCandidate { vendor_id: 0x8086, discrete: false };
const DISCRETE: DeviceCandidate = DeviceCandidate { vendor_id: 0x10DE, discrete: true };

#[test]
fn test_discrete_preferred_without_vendor() {
    assert_eq!(choose_candidate(&[INTEGRATED, DISCRETE], None), Some(1));
}

#[test]
fn test_vendor_preference_beats_discrete() {
    assert_eq!(choose_candidate(&[DISCRETE, INTEGRATED], Some(0x8086)), Some(1));
}

#[test]
fn test_unknown_vendor_selects_nothing() {
    assert_eq!(choose_candidate(&[INTEGRATED, DISCRETE], Some(0x1002)), None);
}

#[test]
fn test_vendor_filter_keeps_discrete_preference() {
    let second_discrete = DeviceCandidate { vendor_id: 0x8086, discrete: true };
    assert_eq!(choose_candidate(&[INTEGRATED, DISCRETE, second_discrete], Some(0x8086)), Some(2));
}

#[test]
fn test_first_of_equal_candidates() {
    assert_eq!(choose_candidate(&[INTEGRATED, INTEGRATED], None), Some(0));
    assert_eq!(choose_candidate(&[], None), None);
}
