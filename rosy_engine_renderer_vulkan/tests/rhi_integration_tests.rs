//! Integration tests for the frame loop with a real Vulkan backend
//!
//! These tests run whole frames against a hidden window.
//! All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test rhi_integration_tests -- --ignored


use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_test_utils::{create_test_rhi, quad_asset, test_window, CountingScene};
use rosy_engine::rosy::gpu::{FrameStage, SHADOW_CASCADE_COUNT};
use rosy_engine::rosy::Error;
use rosy_engine_renderer_vulkan::{GraphScene, Rhi, Scene};
use serial_test::serial;

/// Draw a frame, tolerating one out-of-date swapchain
fn draw(rhi: &mut Rhi, scene: &mut dyn Scene) {
    match rhi.draw_frame(scene, 1.0 / 60.0) {
        Ok(()) => {}
        Err(Error::SwapchainOutOfDate) => {
            rhi.resize_swapchain(test_window()).unwrap();
            rhi.draw_frame(scene, 1.0 / 60.0).unwrap();
        }
        Err(e) => panic!("frame failed: {}", e),
    }
}

// ============================================================================
// FRAME LOOP
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_frames_run_every_pass() {
    let mut rhi = create_test_rhi();
    let mut scene = CountingScene::default();
    scene.build(&mut rhi).unwrap();

    for _ in 0..4 {
        draw(&mut rhi, &mut scene);
    }
    assert!(scene.draws >= 4);
    assert_eq!(scene.shadow_passes.len(), scene.draws * SHADOW_CASCADE_COUNT as usize);
    assert_eq!(&scene.shadow_passes[..3], &[0, 1, 2]);
    assert_eq!(rhi.stage(), FrameStage::Presented);
    assert!(rhi.frame_number() >= 4);

    rhi.deinit();
    assert_eq!(rhi.stage(), FrameStage::Deinitialized);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_frame_stages_are_enforced() {
    let mut rhi = create_test_rhi();
    assert!(rhi.render_pass().is_err(), "render pass before begin_frame must fail");
    assert!(rhi.end_frame().is_err(), "end_frame before begin_frame must fail");
    assert!(rhi.command_buffer().is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_resize_keeps_rendering() {
    let mut rhi = create_test_rhi();
    let mut scene = CountingScene::default();

    draw(&mut rhi, &mut scene);
    rhi.resize_swapchain(test_window()).unwrap();
    assert!(!rhi.resize_requested());
    draw(&mut rhi, &mut scene);

    let (width, height) = rhi.draw_extent();
    assert!(width > 0 && height > 0);
    assert!(scene.draws >= 2);
}

// ============================================================================
// RETIREMENT
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_retired_buffer_outlives_two_frames() {
    let mut rhi = create_test_rhi();
    let mut scene = CountingScene::default();
    draw(&mut rhi, &mut scene);

    let buffer = rhi.resources()
        .create_buffer("retired", 64, vk::BufferUsageFlags::STORAGE_BUFFER, MemoryLocation::CpuToGpu)
        .unwrap();
    rhi.retire_buffer(buffer);
    assert_eq!(rhi.pending_retirements(), 1);

    draw(&mut rhi, &mut scene);
    draw(&mut rhi, &mut scene);
    draw(&mut rhi, &mut scene);
    assert_eq!(rhi.pending_retirements(), 0);
}

// ============================================================================
// GRAPH SCENE
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_graph_scene_missing_shaders() {
    let mut rhi = create_test_rhi();
    let mut scene = GraphScene::new(quad_asset(), "does/not/exist");

    let result = scene.build(&mut rhi);
    assert!(matches!(result, Err(Error::ShaderLoad(_))));
    assert!(!scene.is_built());
    assert!(scene.graph().is_empty());
    scene.deinit(&mut rhi).unwrap();
}
