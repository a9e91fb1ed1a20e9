use ash::vk;
use rosy_engine::rosy::Error;
use rosy_engine::rosy::scene::{Filter, Sampler};
use super::*;

fn container(width: u32, height: u32, level_sizes: &[(u32, u32, u64)]) -> TextureContainer {
    let mut offset = 0;
    let levels = level_sizes
        .iter()
        .map(|&(width, height, size)| {
            let level = TextureLevel { offset, size, width, height };
            offset += size;
            level
        })
        .collect();
    TextureContainer {
        format: vk::Format::BC7_SRGB_BLOCK,
        width,
        height,
        levels,
        data: vec![0; offset as usize],
    }
}

// ============================================================================
// TextureContainer
// ============================================================================

#[test]
fn test_full_chain_is_valid() {
    let texture = container(8, 4, &[(8, 4, 32), (4, 2, 16), (2, 1, 16), (1, 1, 16)]);
    assert!(texture.validate().is_ok());
}

#[test]
fn test_empty_container_rejected() {
    let texture = container(8, 8, &[]);
    assert!(matches!(texture.validate(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_wrong_level_size_rejected() {
    let texture = container(8, 8, &[(8, 8, 64), (8, 8, 64)]);
    assert!(matches!(texture.validate(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_level_past_data_rejected() {
    let mut texture = container(4, 4, &[(4, 4, 16)]);
    texture.data.truncate(8);
    assert!(matches!(texture.validate(), Err(Error::InvalidResource(_))));
}

// ============================================================================
// Samplers
// ============================================================================

#[test]
fn test_sampler_filters_follow_asset() {
    let info = sampler_info(&Sampler { mag_filter: Filter::Nearest, min_filter: Filter::Linear });
    assert_eq!(info.mag_filter, vk::Filter::NEAREST);
    assert_eq!(info.min_filter, vk::Filter::LINEAR);
    assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
    assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
}

#[test]
fn test_shadow_sampler_compares_depth() {
    let info = shadow_sampler_info();
    assert_eq!(info.compare_enable, vk::TRUE);
    assert_eq!(info.compare_op, vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(info.border_color, vk::BorderColor::FLOAT_OPAQUE_WHITE);
}
