//! Camera system

use glam::{Mat4, Vec3};

use super::Transform;
use crate::context::UniformMap;

/// Vertical field of view in radians
pub const DEFAULT_FOV_Y: f32 = 0.785;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 100.0;

/// Perspective camera placed by a [`Transform`].
///
/// The view matrix is the inverse of the transform; the camera looks down
/// its local -Z axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::from_position(Self::HOME),
            fov_y: DEFAULT_FOV_Y,
            aspect: 16.0 / 9.0,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }
}

impl Camera {
    /// Initial position, looking at the origin's -Z side.
    pub const HOME: Vec3 = Vec3::new(0.0, 0.0, 2.0);

    pub fn new(position: Vec3) -> Self {
        Self {
            transform: Transform::from_position(position),
            ..Default::default()
        }
    }

    /// Update the aspect ratio; ignored for a degenerate viewport.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Move back to [`Camera::HOME`] with no rotation.
    pub fn reset(&mut self) {
        self.transform = Transform::from_position(Self::HOME);
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.transform.inverse_matrix()
    }

    /// OpenGL clip space (depth in -1..1)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Write `viewPosition`.
    pub fn write_uniforms(&self, uniforms: &mut UniformMap) {
        uniforms.set("viewPosition", self.position());
    }
}
