//! Perspective camera

use glam::{Mat4, Vec3};

/// Right-handed perspective camera.
///
/// The view matrix is refreshed via [`update`](Self::update); the projection
/// matrix only changes through [`update_projection_matrix`](Self::update_projection_matrix),
/// so an aspect-ratio change takes effect only once that is called.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    fovy: f32,
    aspect: f32,
    near: f32,
    far: f32,
    view: Mat4,
    proj: Mat4,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        let mut camera = Self {
            position,
            target,
            up: Vec3::Y,
            fovy: 45.0_f32.to_radians(),
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        };
        camera.update();
        camera.update_projection_matrix();
        camera
    }

    /// Recompute the view matrix from position, target, and up
    pub fn update(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.target, self.up);
    }

    /// Store a new aspect ratio without touching the projection matrix
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Recompute the projection matrix from the stored parameters
    pub fn update_projection_matrix(&mut self) {
        self.proj = Mat4::perspective_rh(self.fovy, self.aspect, self.near, self.far);
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn view_matrix_inverse_recovers_eye_position() {
        let position = Vec3::new(0.0, 0.0, 5.0);
        let mut camera = Camera::new(position, Vec3::ZERO);
        camera.update();
        let eye = camera.view_matrix().inverse().w_axis.truncate();
        assert_relative_eq!(eye.x, position.x, epsilon = 1e-5);
        assert_relative_eq!(eye.y, position.y, epsilon = 1e-5);
        assert_relative_eq!(eye.z, position.z, epsilon = 1e-5);
    }

    #[test]
    fn aspect_change_is_deferred_until_projection_update() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let before = camera.projection_matrix();
        camera.set_aspect_ratio(2.0);
        assert_eq!(
            camera.projection_matrix().to_cols_array(),
            before.to_cols_array()
        );
        camera.update_projection_matrix();
        assert_ne!(
            camera.projection_matrix().to_cols_array(),
            before.to_cols_array()
        );
    }

    #[test]
    fn projection_update_is_idempotent() {
        let mut camera = Camera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO);
        camera.set_aspect_ratio(16.0 / 9.0);
        camera.update_projection_matrix();
        let first = camera.projection_matrix().to_cols_array();
        camera.update_projection_matrix();
        assert_eq!(camera.projection_matrix().to_cols_array(), first);
    }

    #[test]
    fn view_looks_toward_target() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        camera.update();
        // In a right-handed view space the camera looks down -Z, so the
        // target ends up in front of the eye with negative view-space z.
        let target_view = camera.view_matrix() * Vec3::ZERO.extend(1.0);
        assert!(target_view.z < 0.0);
    }
}
