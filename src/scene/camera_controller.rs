//! Camera controller system
//!
//! Controllers translate per-frame [`InputState`] into camera motion.

use glam::{Quat, Vec2, Vec3};

use super::Camera;
use crate::input::InputState;

/// Drives a camera from user input
pub trait CameraController {
    /// Update the camera based on input and delta time
    fn update(&mut self, camera: &mut Camera, input: &InputState, dt: f32);

    /// Get the controller name for debugging
    fn name(&self) -> &'static str;

    /// Reset the controller and put the camera back where it started
    fn reset(&mut self, camera: &mut Camera);
}

/// Orbit camera controller
///
/// Dragging rotates the camera around `focus`: horizontal motion turns
/// around the world Y axis, vertical motion around the world X axis. The
/// camera's orientation turns with it, so a camera looking at the focus
/// keeps looking at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitController {
    /// Point the camera orbits around
    pub focus: Vec3,
    /// Radians per pixel of drag
    pub sensitivity: f32,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            focus: Vec3::new(0.0, 0.0, -7.0),
            sensitivity: 0.01,
        }
    }
}

impl OrbitController {
    pub fn new(focus: Vec3) -> Self {
        Self {
            focus,
            ..Default::default()
        }
    }

    /// Rotate the camera about the focus for a drag of `delta` pixels.
    pub fn orbit(&self, camera: &mut Camera, delta: Vec2) {
        if delta.abs().max_element() <= 1e-4 {
            return;
        }
        let yaw = -delta.x * self.sensitivity;
        let pitch = delta.y * self.sensitivity;
        let rotation = Quat::from_rotation_y(yaw) * Quat::from_rotation_x(pitch);

        let offset = camera.transform.position - self.focus;
        camera.transform.position = self.focus + rotation * offset;
        camera.transform.rotation = (rotation * camera.transform.rotation).normalize();
    }
}

impl CameraController for OrbitController {
    fn update(&mut self, camera: &mut Camera, input: &InputState, _dt: f32) {
        self.orbit(camera, input.drag_delta());
    }

    fn name(&self) -> &'static str {
        "Orbit"
    }

    fn reset(&mut self, camera: &mut Camera) {
        camera.reset();
    }
}
