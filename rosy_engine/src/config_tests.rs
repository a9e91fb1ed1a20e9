//! Unit tests for config.rs

use super::*;

#[test]
fn test_default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.fence_timeout_ns, 1_000_000_000);
    assert_eq!(config.render_scale, 1.0);
}

#[test]
fn test_render_scale_bounds() {
    let mut config = Config::default();

    config.render_scale = 0.0;
    assert!(config.validate().is_err());

    config.render_scale = 1.5;
    assert!(config.validate().is_err());

    config.render_scale = 0.5;
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_values_rejected() {
    let mut config = Config::default();
    config.max_draw_extent = (0, 1080);
    assert!(matches!(config.validate(), Err(Error::InitializationFailed(msg)) if msg.contains("max_draw_extent")));

    let mut config = Config::default();
    config.fence_timeout_ns = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.shadow_map_size = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_draw_extent_scales_and_clamps() {
    let mut config = Config::default();
    config.max_draw_extent = (1920, 1080);
    config.render_scale = 0.5;

    assert_eq!(config.draw_extent(1280, 720), (640, 360));
    // larger than the draw image: clamped first, then scaled
    assert_eq!(config.draw_extent(3840, 2160), (960, 540));
}

#[test]
fn test_draw_extent_never_zero() {
    let mut config = Config::default();
    config.render_scale = 0.1;
    assert_eq!(config.draw_extent(1, 1), (1, 1));
}

#[test]
fn test_validation_stats_total() {
    let stats = ValidationStats { errors: 1, warnings: 2, info: 3, verbose: 4 };
    assert_eq!(stats.total(), 10);
    assert!(stats.has_errors());
    assert!(!ValidationStats::default().has_errors());
}
