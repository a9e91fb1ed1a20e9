/// Free-flight camera driven by winit input.
///
/// WASD moves in the view plane, Q/E move down/up, mouse motion turns. The
/// camera only stores input; `integrate` applies it once per frame.

use glam::{Mat4, Quat, Vec3};
use winit::keyboard::KeyCode;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Movement direction in camera space, each axis in [-1, 1]
    pub velocity: Vec3,
    /// Radians, positive looks up
    pub pitch: f32,
    /// Radians, positive turns left
    pub yaw: f32,
    /// World units per second
    pub speed: f32,
    /// Radians per mouse count
    pub sensitivity: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 8.0),
            velocity: Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            speed: 5.0,
            sensitivity: 0.002,
            fov_y: 70f32.to_radians(),
            near: 0.1,
            far: 200.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self { position, ..Default::default() }
    }

    /// Update the movement direction; returns false for unbound keys
    pub fn handle_key(&mut self, code: KeyCode, pressed: bool) -> bool {
        let amount = if pressed { 1.0 } else { 0.0 };
        match code {
            KeyCode::KeyW => self.velocity.z = -amount,
            KeyCode::KeyS => self.velocity.z = amount,
            KeyCode::KeyA => self.velocity.x = -amount,
            KeyCode::KeyD => self.velocity.x = amount,
            KeyCode::KeyQ => self.velocity.y = -amount,
            KeyCode::KeyE => self.velocity.y = amount,
            _ => return false,
        }
        true
    }

    pub fn handle_mouse_motion(&mut self, delta_x: f64, delta_y: f64) {
        self.yaw -= delta_x as f32 * self.sensitivity;
        self.pitch -= delta_y as f32 * self.sensitivity;
        let limit = std::f32::consts::FRAC_PI_2 - 0.01;
        self.pitch = self.pitch.clamp(-limit, limit);
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }

    /// Direction the camera looks at
    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    /// Move along the current velocity for `dt` seconds
    pub fn integrate(&mut self, dt: f32) {
        let movement = self.rotation() * self.velocity;
        if movement.length_squared() > 0.0 {
            self.position += movement.normalize() * self.speed * dt;
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation(), self.position).inverse()
    }

    /// Right-handed perspective with a flipped Y axis for Vulkan clip space
    pub fn projection(&self, aspect: f32) -> Mat4 {
        let mut projection = Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far);
        projection.y_axis.y *= -1.0;
        projection
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
