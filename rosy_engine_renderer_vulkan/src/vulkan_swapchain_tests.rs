use ash::vk;
use super::*;

fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR { format, color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR }
}

fn capabilities(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 8,
        current_extent: vk::Extent2D { width: current.0, height: current.1 },
        min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
        max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
        ..Default::default()
    }
}

// ============================================================================
// Surface format
// ============================================================================

#[test]
fn test_srgb_format_preferred() {
    let formats = [
        surface_format(vk::Format::B8G8R8A8_UNORM),
        surface_format(vk::Format::B8G8R8A8_SRGB),
    ];
    assert_eq!(choose_surface_format(&formats).map(|f| f.format), Some(vk::Format::B8G8R8A8_SRGB));
}

#[test]
fn test_first_format_fallback() {
    let formats = [
        surface_format(vk::Format::A2B10G10R10_UNORM_PACK32),
        surface_format(vk::Format::B8G8R8A8_UNORM),
    ];
    assert_eq!(
        choose_surface_format(&formats).map(|f| f.format),
        Some(vk::Format::A2B10G10R10_UNORM_PACK32)
    );
    assert!(choose_surface_format(&[]).is_none());
}

// ============================================================================
// Present mode
// ============================================================================

#[test]
fn test_vsync_always_fifo() {
    let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_mailbox_before_immediate() {
    let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);

    let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::IMMEDIATE);
}

#[test]
fn test_fifo_when_nothing_else() {
    assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
}

// ============================================================================
// Extent and image count
// ============================================================================

#[test]
fn test_fixed_surface_extent_wins() {
    let caps = capabilities((800, 600), (1, 1), (4096, 4096));
    assert_eq!(choose_extent(&caps, (1920, 1080)), vk::Extent2D { width: 800, height: 600 });
}

#[test]
fn test_window_extent_clamped() {
    let caps = capabilities((u32::MAX, u32::MAX), (64, 64), (2048, 2048));
    assert_eq!(choose_extent(&caps, (4000, 10)), vk::Extent2D { width: 2048, height: 64 });
    assert_eq!(choose_extent(&caps, (1280, 720)), vk::Extent2D { width: 1280, height: 720 });
}

#[test]
fn test_image_count() {
    let mut caps = capabilities((1, 1), (1, 1), (1, 1));
    assert_eq!(choose_image_count(&caps), 3);

    caps.max_image_count = 2;
    assert_eq!(choose_image_count(&caps), 2);

    caps.max_image_count = 0;
    caps.min_image_count = 5;
    assert_eq!(choose_image_count(&caps), 6);
}
