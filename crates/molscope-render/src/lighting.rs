//! Light placement and the shading model shared by both backends.

use glam::Vec3;

use molscope_core::{ClipState, ViewerParameters};

/// Specular exponent of the default material.
pub const SHININESS: f32 = 30.0;
/// Specular strength of the default material.
pub const SPECULAR: f32 = 0.1;
/// Brightness kept by back faces when `dull_interior` is set.
pub const INTERIOR_DULLING: f32 = 0.5;

/// Lights for one frame, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    /// Point light behind the camera, far out along the camera direction.
    pub position: Vec3,
    /// Light color times intensity.
    pub color: Vec3,
    /// Ambient color times intensity.
    pub ambient: Vec3,
}

impl LightState {
    /// Places the light `bbox_length * 100` beyond the camera, as seen from its target.
    #[must_use]
    pub fn follow_camera(
        params: &ViewerParameters,
        camera_position: Vec3,
        camera_target: Vec3,
        bbox_length: f32,
    ) -> Self {
        let length = if bbox_length.is_finite() && bbox_length > 0.0 {
            bbox_length * 100.0
        } else {
            1.0
        };
        let away = (camera_position - camera_target).normalize_or(Vec3::NEG_Z) * length;
        Self {
            position: camera_position + away,
            color: params.light_color * params.light_intensity,
            ambient: params.ambient_color * params.ambient_intensity,
        }
    }

    /// Shades a surface point.
    ///
    /// `normal` must face the viewer. `dull` darkens back faces of
    /// dull-interior buffers.
    #[must_use]
    pub fn shade(&self, base: Vec3, point: Vec3, normal: Vec3, eye: Vec3, dull: bool) -> Vec3 {
        let to_light = (self.position - point).normalize_or_zero();
        let to_eye = (eye - point).normalize_or_zero();
        let diffuse = normal.dot(to_light).max(0.0);
        let half = (to_light + to_eye).normalize_or_zero();
        let specular = normal.dot(half).max(0.0).powf(SHININESS) * SPECULAR;
        let lit = base * (self.ambient + self.color * diffuse) + self.color * specular;
        if dull {
            lit * INTERIOR_DULLING
        } else {
            lit
        }
    }

    /// GPU layout of the light.
    #[must_use]
    pub fn to_gpu(&self, clip: &ClipState, fog_color: Vec3, camera_position: Vec3) -> GpuLightUniforms {
        GpuLightUniforms {
            light_position: self.position.extend(1.0).to_array(),
            light_color: self.color.extend(0.0).to_array(),
            ambient: self.ambient.extend(0.0).to_array(),
            fog_color: fog_color.extend(0.0).to_array(),
            camera_position: camera_position.extend(1.0).to_array(),
            fog_near: clip.fog_near,
            fog_far: clip.fog_far,
            shininess: SHININESS,
            specular: SPECULAR,
        }
    }
}

/// Linear fog factor at view depth `depth`: 0 before `fog_near`, 1 past `fog_far`.
#[must_use]
pub fn fog_factor(depth: f32, clip: &ClipState) -> f32 {
    let span = clip.fog_far - clip.fog_near;
    if span.abs() <= f32::EPSILON {
        return if depth >= clip.fog_far { 1.0 } else { 0.0 };
    }
    ((depth - clip.fog_near) / span).clamp(0.0, 1.0)
}

/// Mixes `color` towards the fog color.
#[must_use]
pub fn apply_fog(color: Vec3, depth: f32, clip: &ClipState, fog_color: Vec3) -> Vec3 {
    color.lerp(fog_color, fog_factor(depth, clip))
}

/// Light and fog uniforms for WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLightUniforms {
    pub light_position: [f32; 4],
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
    pub fog_color: [f32; 4],
    pub camera_position: [f32; 4],
    pub fog_near: f32,
    pub fog_far: f32,
    pub shininess: f32,
    pub specular: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(fog_near: f32, fog_far: f32) -> ClipState {
        ClipState {
            near: 1.0,
            far: 100.0,
            fog_near,
            fog_far,
            b_radius: 10.0,
            c_dist: 50.0,
        }
    }

    #[test]
    fn test_light_behind_camera() {
        let params = ViewerParameters::default();
        let light = LightState::follow_camera(&params, Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO, 2.0);
        assert_eq!(light.position, Vec3::new(0.0, 0.0, -210.0));
        assert!((light.ambient - params.ambient_color * 0.2).length() < 1e-6);
    }

    #[test]
    fn test_fog_factor_ramp() {
        let c = clip(10.0, 20.0);
        assert_eq!(fog_factor(5.0, &c), 0.0);
        assert_eq!(fog_factor(15.0, &c), 0.5);
        assert_eq!(fog_factor(25.0, &c), 1.0);
    }

    #[test]
    fn test_shade_facing_light_is_brighter() {
        let params = ViewerParameters::default();
        let light = LightState::follow_camera(&params, Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO, 1.0);
        let eye = Vec3::new(0.0, 0.0, -10.0);
        let lit = light.shade(Vec3::ONE, Vec3::ZERO, Vec3::NEG_Z, eye, false);
        let grazing = light.shade(Vec3::ONE, Vec3::ZERO, Vec3::X, eye, false);
        assert!(lit.x > grazing.x);
        let dulled = light.shade(Vec3::ONE, Vec3::ZERO, Vec3::NEG_Z, eye, true);
        assert!(dulled.x < lit.x);
    }
}
