//! Camera and view management.

use glam::{Mat4, Vec2, Vec3};

use molscope_core::{BoundingBox, CameraType};

/// Camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    /// Perspective projection.
    #[default]
    Perspective,
    /// Orthographic projection sized to match the perspective view at the target.
    Orthographic,
}

impl From<CameraType> for ProjectionMode {
    fn from(camera_type: CameraType) -> Self {
        match camera_type {
            CameraType::Orthographic => ProjectionMode::Orthographic,
            CameraType::Perspective | CameraType::Stereo => ProjectionMode::Perspective,
        }
    }
}

/// A 3D camera for viewing the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Projection mode.
    pub projection_mode: ProjectionMode,
    /// Sub-pixel jitter in pixels of a `viewport`-sized target.
    pub view_offset: Option<Vec2>,
    /// Size of the target the camera renders into, in device pixels.
    pub viewport: Vec2,
}

impl Camera {
    /// Creates a camera at `(0, 0, camera_z)` looking at the origin.
    #[must_use]
    pub fn new(camera_z: f32, fov_degrees: f32, width: u32, height: u32) -> Self {
        let viewport = Vec2::new(width.max(1) as f32, height.max(1) as f32);
        Self {
            position: Vec3::new(0.0, 0.0, camera_z),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: fov_degrees.to_radians(),
            aspect_ratio: viewport.x / viewport.y,
            near: 0.1,
            far: 10_000.0,
            projection_mode: ProjectionMode::Perspective,
            view_offset: None,
            viewport,
        }
    }

    /// Sets the target size and the aspect ratio that follows from it.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Vec2::new(width.max(1) as f32, height.max(1) as f32);
        self.aspect_ratio = self.viewport.x / self.viewport.y;
    }

    /// Shifts the projection by `offset` pixels.
    pub fn set_view_offset(&mut self, offset: Vec2) {
        self.view_offset = Some(offset);
    }

    /// Removes the jitter.
    pub fn clear_view_offset(&mut self) {
        self.view_offset = None;
    }

    /// Distance from the camera to its target.
    #[must_use]
    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the projection matrix, including any view offset.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        let base = match self.projection_mode {
            ProjectionMode::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let half_height = (self.fov / 2.0).tan() * self.distance().max(f32::EPSILON);
                let half_width = half_height * self.aspect_ratio;
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        };
        match self.view_offset {
            // a positive offset moves the view window right and down
            Some(offset) => {
                let ndc = Vec2::new(
                    -2.0 * offset.x / self.viewport.x,
                    2.0 * offset.y / self.viewport.y,
                );
                Mat4::from_translation(ndc.extend(0.0)) * base
            }
            None => base,
        }
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Returns the camera's right direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize()
    }

    /// Left and right eye cameras for side-by-side stereo.
    ///
    /// Each eye renders into half the width and is shifted by half the eye
    /// separation along the camera's right vector.
    #[must_use]
    pub fn stereo_pair(&self, eye_separation: f32) -> (Camera, Camera) {
        let shift = self.right() * (eye_separation * 0.5);
        let eye = |sign: f32| {
            let mut cam = self.clone();
            cam.projection_mode = ProjectionMode::Perspective;
            cam.position += shift * sign;
            cam.target += shift * sign;
            cam.viewport.x = (self.viewport.x * 0.5).max(1.0);
            cam.aspect_ratio = cam.viewport.x / cam.viewport.y;
            cam
        };
        (eye(-1.0), eye(1.0))
    }

    /// Orbits the camera around the target.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.position - self.target;
        let yaw = glam::Quat::from_axis_angle(self.up, -delta_x);
        let offset = yaw * offset;
        let right = offset.cross(self.up).normalize_or_zero();
        let pitched = glam::Quat::from_axis_angle(right, delta_y) * offset;
        // keep clear of the poles
        let offset = if pitched.normalize_or_zero().dot(self.up).abs() < 0.99 {
            pitched
        } else {
            offset
        };
        self.position = self.target + offset;
    }

    /// Pans the camera.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let right = self.right();
        let up = right.cross(self.forward());
        let offset = right * delta_x + up * delta_y;
        self.position += offset;
        self.target += offset;
    }

    /// Moves toward (positive `delta`) or away from the target.
    pub fn zoom(&mut self, delta: f32) {
        let direction = self.forward();
        let distance = self.distance();
        let new_distance = (distance - delta).max(0.1);
        self.position = self.target - direction * new_distance;
    }

    /// Camera distance that fits `bounds` in view, as a negative z offset.
    ///
    /// `clip_dist` is added so the near plane stays clear of the box.
    #[must_use]
    pub fn zoom_for_box(&self, bounds: &BoundingBox, clip_dist: f32) -> f32 {
        let size = bounds.size();
        let max_size = size.max_element();
        let min_size = size.min_element();
        let distance = max_size + min_size.sqrt();

        let aspect = self.viewport.x / self.viewport.y;
        let aspect_factor = if self.viewport.y < self.viewport.x {
            1.0
        } else {
            aspect
        };
        let distance = ((distance * 0.5 / aspect_factor) / (self.fov / 2.0).sin()).abs();
        -(distance + clip_dist)
    }

    /// Points the camera at the center of `bounds` from the fitting distance.
    pub fn frame_box(&mut self, bounds: &BoundingBox, clip_dist: f32) {
        if bounds.is_empty() {
            return;
        }
        let back = (self.position - self.target).normalize_or(Vec3::NEG_Z);
        let distance = -self.zoom_for_box(bounds, clip_dist);
        self.target = bounds.center();
        self.position = self.target + back * distance;
    }

    /// Sets the field of view in radians.
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(0.1, std::f32::consts::PI - 0.1);
    }

    /// Returns FOV in degrees.
    #[must_use]
    pub fn fov_degrees(&self) -> f32 {
        self.fov.to_degrees()
    }

    /// Sets FOV from degrees.
    pub fn set_fov_degrees(&mut self, degrees: f32) {
        self.set_fov(degrees.to_radians());
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(-800.0, 40.0, 640, 480)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::default();
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, -800.0));
        assert_eq!(camera.projection_mode, ProjectionMode::Perspective);
        assert!((camera.fov_degrees() - 40.0).abs() < 1e-4);
        assert!((camera.distance() - 800.0).abs() < 1e-3);
    }

    #[test]
    fn test_projection_mode_perspective() {
        let camera = Camera::default();
        let proj = camera.projection_matrix();
        assert!(proj.w_axis.z != 0.0);
        assert!(proj.z_axis.w != 0.0);
    }

    #[test]
    fn test_projection_mode_orthographic() {
        let mut camera = Camera::default();
        camera.projection_mode = ProjectionMode::Orthographic;
        let proj = camera.projection_matrix();
        assert!((proj.w_axis.w - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_view_offset_shifts_ndc() {
        let mut camera = Camera::new(-10.0, 40.0, 100, 100);
        let p = Vec3::ZERO;
        let before = camera.view_projection_matrix().project_point3(p);
        camera.set_view_offset(Vec2::new(1.0, 0.0));
        let after = camera.view_projection_matrix().project_point3(p);
        assert!((after.x - before.x + 0.02).abs() < 1e-5);
        camera.clear_view_offset();
        assert_eq!(camera.view_projection_matrix().project_point3(p), before);
    }

    #[test]
    fn test_set_fov_clamping() {
        let mut camera = Camera::default();
        camera.set_fov(0.0);
        assert!(camera.fov >= 0.1);
        camera.set_fov(std::f32::consts::PI);
        assert!(camera.fov < std::f32::consts::PI);
    }

    #[test]
    fn test_zoom_for_box() {
        let camera = Camera::new(-800.0, 60.0, 200, 100);
        let bounds = BoundingBox::new(Vec3::ZERO, Vec3::new(4.0, 2.0, 1.0));
        // (4 + 1) * 0.5 / sin(30 deg) = 5, plus the clip distance
        assert!((camera.zoom_for_box(&bounds, 10.0) + 15.0).abs() < 1e-4);

        let tall = Camera::new(-800.0, 60.0, 100, 200);
        assert!((tall.zoom_for_box(&bounds, 0.0) + 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_frame_box_centers() {
        let mut camera = Camera::default();
        let bounds = BoundingBox::new(Vec3::splat(1.0), Vec3::splat(3.0));
        camera.frame_box(&bounds, 10.0);
        assert_eq!(camera.target, Vec3::splat(2.0));
        assert!(camera.distance() > 10.0);
    }

    #[test]
    fn test_stereo_pair_halves_viewport() {
        let camera = Camera::new(-50.0, 40.0, 200, 100);
        let (left, right) = camera.stereo_pair(2.0);
        assert_eq!(left.viewport, Vec2::new(100.0, 100.0));
        assert!(((left.position - right.position).length() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_zoom_perspective() {
        let mut camera = Camera::default();
        let initial = camera.distance();
        camera.zoom(100.0);
        assert!(camera.distance() < initial);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::default();
        camera.orbit(0.3, 0.2);
        assert!((camera.distance() - 800.0).abs() < 1e-2);
    }
}
