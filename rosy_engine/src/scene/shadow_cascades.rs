/// Cascaded shadow map math.
///
/// The camera depth range is split with the practical split scheme and each
/// slice is covered by an orthographic light projection fitted around the
/// slice's bounding sphere. Sphere fitting keeps the projection size constant
/// while the camera turns; snapping the center to shadow-map texels keeps
/// edges stable while it moves.

use glam::{Mat4, Vec3};
use crate::gpu::SHADOW_CASCADE_COUNT;
use super::camera::Camera;

const CASCADES: usize = SHADOW_CASCADE_COUNT as usize;

/// Blend between uniform (0) and logarithmic (1) splits
pub const DEFAULT_SPLIT_LAMBDA: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCascades {
    /// View-space far distance of each cascade
    pub splits: [f32; CASCADES],
    pub view_projections: [Mat4; CASCADES],
}

/// Far distance of each cascade; the last one is always `far`
pub fn cascade_splits(near: f32, far: f32, lambda: f32) -> [f32; CASCADES] {
    let mut splits = [far; CASCADES];
    for (i, split) in splits.iter_mut().enumerate() {
        let p = (i + 1) as f32 / CASCADES as f32;
        let log = near * (far / near).powf(p);
        let uniform = near + (far - near) * p;
        *split = lambda * log + (1.0 - lambda) * uniform;
    }
    splits[CASCADES - 1] = far;
    splits
}

/// World-space corners of the camera frustum between two view distances
pub fn frustum_slice_corners(camera: &Camera, aspect: f32, slice_near: f32, slice_far: f32) -> [Vec3; 8] {
    let tan_half = (camera.fov_y * 0.5).tan();
    let camera_world = camera.view().inverse();

    let mut corners = [Vec3::ZERO; 8];
    for (face, distance) in [slice_near, slice_far].into_iter().enumerate() {
        let h = tan_half * distance;
        let w = h * aspect;
        let face_corners = [
            Vec3::new(-w, -h, -distance),
            Vec3::new(w, -h, -distance),
            Vec3::new(w, h, -distance),
            Vec3::new(-w, h, -distance),
        ];
        for (i, corner) in face_corners.into_iter().enumerate() {
            corners[face * 4 + i] = camera_world.transform_point3(corner);
        }
    }
    corners
}

/// Center and radius enclosing every corner
pub fn bounding_sphere(corners: &[Vec3; 8]) -> (Vec3, f32) {
    let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
    let radius = corners
        .iter()
        .map(|c| c.distance(center))
        .fold(0.0f32, f32::max);
    (center, radius)
}

/// Orthographic light view-projection covering the sphere
pub fn fit_sphere(light_direction: Vec3, center: Vec3, radius: f32, shadow_map_size: u32) -> Mat4 {
    let direction = light_direction.try_normalize().unwrap_or(Vec3::NEG_Y);
    let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
    let radius = radius.max(f32::EPSILON);

    // snap the center to whole texels in light space
    let light_rotation = Mat4::look_at_rh(Vec3::ZERO, direction, up);
    let texel = 2.0 * radius / shadow_map_size.max(1) as f32;
    let mut light_center = light_rotation.transform_point3(center);
    light_center.x = (light_center.x / texel).floor() * texel;
    light_center.y = (light_center.y / texel).floor() * texel;
    let center = light_rotation.inverse().transform_point3(light_center);

    let eye = center - direction * radius * 2.0;
    let view = Mat4::look_at_rh(eye, center, up);
    let projection = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, radius * 4.0);
    projection * view
}

impl ShadowCascades {
    pub fn compute(camera: &Camera, aspect: f32, light_direction: Vec3, shadow_map_size: u32) -> Self {
        let splits = cascade_splits(camera.near, camera.far, DEFAULT_SPLIT_LAMBDA);
        let mut view_projections = [Mat4::IDENTITY; CASCADES];

        let mut slice_near = camera.near;
        for (i, &slice_far) in splits.iter().enumerate() {
            let corners = frustum_slice_corners(camera, aspect, slice_near, slice_far);
            let (center, radius) = bounding_sphere(&corners);
            view_projections[i] = fit_sphere(light_direction, center, radius, shadow_map_size);
            slice_near = slice_far;
        }

        Self { splits, view_projections }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_splits_increase_and_end_at_far() {
        let splits = cascade_splits(0.1, 200.0, DEFAULT_SPLIT_LAMBDA);
        assert!(splits[0] > 0.1);
        assert!(splits[0] < splits[1] && splits[1] < splits[2]);
        assert_eq!(splits[2], 200.0);
    }

    #[test]
    fn test_uniform_splits() {
        let splits = cascade_splits(0.0001, 30.0, 0.0);
        assert!((splits[0] - 10.0).abs() < 1e-2);
        assert!((splits[1] - 20.0).abs() < 1e-2);
    }

    #[test]
    fn test_logarithmic_splits() {
        let splits = cascade_splits(1.0, 1000.0, 1.0);
        assert!((splits[0] - 10.0).abs() < 1e-3);
        assert!((splits[1] - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_slice_corners_lie_in_front_of_camera() {
        let camera = Camera::new(Vec3::ZERO);
        let corners = frustum_slice_corners(&camera, 1.0, 1.0, 10.0);
        for corner in &corners[..4] {
            assert!((corner.z + 1.0).abs() < 1e-4);
        }
        for corner in &corners[4..] {
            assert!((corner.z + 10.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_cascade_contains_its_slice() {
        let camera = Camera::new(Vec3::new(0.0, 2.0, 0.0));
        let light = Vec3::new(-0.5, -1.0, -0.3);
        let cascades = ShadowCascades::compute(&camera, 16.0 / 9.0, light, 2048);

        let mut slice_near = camera.near;
        for (i, &slice_far) in cascades.splits.iter().enumerate() {
            for corner in frustum_slice_corners(&camera, 16.0 / 9.0, slice_near, slice_far) {
                let clip = cascades.view_projections[i] * Vec4::from((corner, 1.0));
                let ndc = clip.truncate() / clip.w;
                assert!(ndc.x.abs() <= 1.01 && ndc.y.abs() <= 1.01, "cascade {}", i);
                assert!((-1e-3..=1.0 + 1e-3).contains(&ndc.z), "cascade {}", i);
            }
            slice_near = slice_far;
        }
    }

    #[test]
    fn test_straight_down_light_is_handled() {
        let m = fit_sphere(Vec3::NEG_Y, Vec3::ZERO, 5.0, 1024);
        assert!(m.is_finite());
    }
}
