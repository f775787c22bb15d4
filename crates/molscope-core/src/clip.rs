//! Clip plane and fog distances.
//!
//! Recomputed for every frame from the scene bounds and the camera position.
//! Nothing here is persisted between frames.

use glam::Vec3;

use crate::options::{CameraType, ClipMode, ClipScale, ViewerParameters};

/// Lower bound of the bounding radius.
pub const MIN_BOUNDING_RADIUS: f32 = 10.0;

/// Bounding radius used when the scene extent is not finite.
pub const FALLBACK_BOUNDING_RADIUS: f32 = 50.0;

/// Smallest near-plane distance handed to a projection.
pub const NEAR_EPSILON: f32 = 0.001;

/// Derived clipping state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipState {
    /// Near clip distance from the camera.
    pub near: f32,
    /// Far clip distance from the camera.
    pub far: f32,
    /// Fog start distance.
    pub fog_near: f32,
    /// Fog end distance.
    pub fog_far: f32,
    /// Half of the scene diagonal, at least [`MIN_BOUNDING_RADIUS`].
    pub b_radius: f32,
    /// Distance of the camera from the origin.
    pub c_dist: f32,
}

impl ClipState {
    /// Computes the clip state.
    ///
    /// `bbox_length` is the diagonal of the scene bounds, `camera_position` the
    /// camera's world position with the scene centered at the origin.
    #[must_use]
    pub fn compute(params: &ViewerParameters, bbox_length: f32, camera_position: Vec3) -> Self {
        let b_radius = bounding_radius(bbox_length);

        let mut c_dist = camera_position.length();
        if c_dist == 0.0 || !c_dist.is_finite() {
            c_dist = params.camera_z.abs();
        }

        let (mut near, mut far, mut fog_near, mut fog_far) = match params.clip_mode {
            ClipMode::Camera => (
                params.clip_near,
                params.clip_far,
                params.fog_near,
                params.fog_far,
            ),
            ClipMode::Scene => match params.clip_scale {
                ClipScale::Absolute => (
                    c_dist - params.clip_near,
                    c_dist + params.clip_far,
                    c_dist - params.fog_near,
                    c_dist + params.fog_far,
                ),
                ClipScale::Relative => {
                    let near_factor = (50.0 - params.clip_near) / 50.0;
                    let far_factor = -(50.0 - params.clip_far) / 50.0;
                    let fog_near_factor = (50.0 - params.fog_near) / 50.0;
                    let fog_far_factor = -(50.0 - params.fog_far) / 50.0;
                    (
                        c_dist - b_radius * near_factor,
                        c_dist + b_radius * far_factor,
                        c_dist - b_radius * fog_near_factor,
                        c_dist + b_radius * fog_far_factor,
                    )
                }
            },
        };

        if params.clip_mode != ClipMode::Camera {
            match params.camera_type {
                CameraType::Perspective | CameraType::Stereo => {
                    near = near.max(params.clip_dist).max(0.1);
                    far = far.max(1.0);
                    fog_near = fog_near.max(0.1);
                    fog_far = fog_far.max(1.0);
                }
                CameraType::Orthographic => {
                    if params.clip_dist > 0.0 {
                        near = near.max(params.clip_dist);
                    }
                }
            }
        }

        if near.is_nan() || near < NEAR_EPSILON {
            near = NEAR_EPSILON;
        }
        if far.is_nan() || far <= near {
            far = near + (near * 1e-3).max(NEAR_EPSILON);
        }

        Self {
            near,
            far,
            fog_near,
            fog_far,
            b_radius,
            c_dist,
        }
    }

    /// Converts an absolute offset from the scene center into a clip percentage.
    #[must_use]
    pub fn absolute_to_relative(&self, d: f32) -> f32 {
        50.0 * (1.0 - d / self.b_radius)
    }

    /// Converts a clip percentage into an absolute offset from the scene center.
    #[must_use]
    pub fn relative_to_absolute(&self, d: f32) -> f32 {
        self.b_radius * (1.0 - d / 50.0)
    }
}

/// Bounding radius for a scene diagonal, floored and finite.
#[must_use]
pub fn bounding_radius(bbox_length: f32) -> f32 {
    let r = MIN_BOUNDING_RADIUS.max(bbox_length * 0.5);
    if r.is_finite() {
        r
    } else {
        FALLBACK_BOUNDING_RADIUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn camera_at(z: f32) -> Vec3 {
        Vec3::new(0.0, 0.0, z)
    }

    #[test]
    fn test_bounding_radius_floor() {
        assert_eq!(bounding_radius(0.0), 10.0);
        assert_eq!(bounding_radius(100.0), 50.0);
        assert_eq!(bounding_radius(f32::INFINITY), 50.0);
        assert_eq!(bounding_radius(f32::NAN), 10.0);
    }

    #[test]
    fn test_relative_defaults() {
        let params = ViewerParameters::default();
        let clip = ClipState::compute(&params, 200.0, camera_at(300.0));
        // clip_near 0 puts the near plane one bounding radius in front of the center
        assert_eq!(clip.b_radius, 100.0);
        assert_eq!(clip.c_dist, 300.0);
        assert!((clip.near - 200.0).abs() < 1e-4);
        assert!((clip.far - 400.0).abs() < 1e-4);
        // fog 50/100 spans center to back
        assert!((clip.fog_near - 300.0).abs() < 1e-4);
        assert!((clip.fog_far - 400.0).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_camera_falls_back() {
        let params = ViewerParameters::default();
        let clip = ClipState::compute(&params, 0.0, Vec3::ZERO);
        assert_eq!(clip.c_dist, 800.0);
        let clip = ClipState::compute(&params, 0.0, Vec3::splat(f32::NAN));
        assert_eq!(clip.c_dist, 800.0);
    }

    #[test]
    fn test_absolute_scene() {
        let params = ViewerParameters {
            clip_scale: ClipScale::Absolute,
            clip_near: 5.0,
            clip_far: 20.0,
            ..ViewerParameters::default()
        };
        let clip = ClipState::compute(&params, 10.0, camera_at(100.0));
        assert!((clip.near - 95.0).abs() < 1e-4);
        assert!((clip.far - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_camera_mode_is_direct() {
        let params = ViewerParameters {
            clip_mode: ClipMode::Camera,
            clip_near: 2.0,
            clip_far: 30.0,
            ..ViewerParameters::default()
        };
        let clip = ClipState::compute(&params, 1000.0, camera_at(100.0));
        assert_eq!(clip.near, 2.0);
        assert_eq!(clip.far, 30.0);
    }

    #[test]
    fn test_camera_mode_zero_near_clamped() {
        let params = ViewerParameters {
            clip_mode: ClipMode::Camera,
            clip_near: 0.0,
            clip_far: 0.0,
            ..ViewerParameters::default()
        };
        let clip = ClipState::compute(&params, 0.0, camera_at(1.0));
        assert_eq!(clip.near, NEAR_EPSILON);
        assert!(clip.far > clip.near);
    }

    #[test]
    fn test_perspective_respects_clip_dist() {
        let params = ViewerParameters {
            clip_near: 50.0,
            ..ViewerParameters::default()
        };
        // near = cDist = 5 before clamping, clip_dist raises it to 10
        let clip = ClipState::compute(&params, 0.0, camera_at(5.0));
        assert_eq!(clip.near, 10.0);
    }

    #[test]
    fn test_absolute_relative_inverse() {
        let clip = ClipState::compute(&ViewerParameters::default(), 80.0, camera_at(100.0));
        for d in [0.0, 10.0, 40.0, 77.5] {
            let back = clip.relative_to_absolute(clip.absolute_to_relative(d));
            assert!((back - d).abs() < 1e-4);
        }
    }

    fn arb_params() -> impl Strategy<Value = ViewerParameters> {
        (
            prop_oneof![Just(ClipMode::Scene), Just(ClipMode::Camera)],
            prop_oneof![Just(ClipScale::Relative), Just(ClipScale::Absolute)],
            prop_oneof![
                Just(CameraType::Perspective),
                Just(CameraType::Orthographic),
                Just(CameraType::Stereo)
            ],
            -1000.0f32..1000.0,
            -1000.0f32..1000.0,
            0.0f32..100.0,
        )
            .prop_map(|(mode, scale, camera, near, far, dist)| ViewerParameters {
                clip_mode: mode,
                clip_scale: scale,
                camera_type: camera,
                clip_near: near,
                clip_far: far,
                clip_dist: dist,
                ..ViewerParameters::default()
            })
    }

    proptest! {
        #[test]
        fn near_always_below_far(
            params in arb_params(),
            bbox_length in 0.0f32..1.0e5,
            c_dist in 0.0f32..1.0e5,
        ) {
            let clip = ClipState::compute(&params, bbox_length, camera_at(c_dist));
            prop_assert!(clip.near >= NEAR_EPSILON);
            prop_assert!(clip.near < clip.far, "near {} far {}", clip.near, clip.far);
            prop_assert!(clip.b_radius >= MIN_BOUNDING_RADIUS);
        }
    }
}
