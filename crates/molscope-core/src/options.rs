//! Viewer configuration.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Converts a `0xRRGGBB` color to RGB floats in [0, 1].
#[must_use]
pub fn hex_color(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >> 8) & 0xFF) as f32 / 255.0,
        (hex & 0xFF) as f32 / 255.0,
    )
}

/// Configuration of a viewer, serializable to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerParameters {
    /// Fog color.
    pub fog_color: Vec3,
    /// Fog start, interpreted through `clip_mode`/`clip_scale`.
    pub fog_near: f32,
    /// Fog end, interpreted through `clip_mode`/`clip_scale`.
    pub fog_far: f32,

    /// Background color.
    pub background_color: Vec3,

    /// Camera projection.
    pub camera_type: CameraType,
    /// Vertical field of view in degrees.
    pub camera_fov: f32,
    /// Stereo eye separation.
    pub camera_eye_sep: f32,
    /// Initial camera z; its magnitude is the fallback camera distance.
    pub camera_z: f32,

    /// Near clip, percent or absolute depending on `clip_scale`.
    pub clip_near: f32,
    /// Far clip, percent or absolute depending on `clip_scale`.
    pub clip_far: f32,
    /// Minimum near-plane distance from the camera.
    pub clip_dist: f32,
    /// Where clip distances are measured from.
    pub clip_mode: ClipMode,
    /// How clip distances are scaled.
    pub clip_scale: ClipScale,

    /// Directional light color.
    pub light_color: Vec3,
    /// Directional light intensity.
    pub light_intensity: f32,
    /// Ambient light color.
    pub ambient_color: Vec3,
    /// Ambient light intensity.
    pub ambient_intensity: f32,

    /// Supersampling level, 0 disables, -1 also disables the still-frame pass.
    pub sample_level: i32,
    /// Device pixels per canvas unit.
    pub pixel_ratio: f32,
    /// Picking target precision.
    pub pick_precision: PickPrecision,
    /// Draw a line box around the scene bounds.
    pub show_bounding_box: bool,

    /// Outline used for highlighted primitives.
    pub outline: OutlineParams,
    /// How long a highlight stays before it is cleared, in milliseconds. 0 keeps it.
    pub highlight_timeout_ms: u64,
}

impl Default for ViewerParameters {
    fn default() -> Self {
        Self {
            fog_color: hex_color(0x22_22_22),
            fog_near: 50.0,
            fog_far: 100.0,
            background_color: Vec3::ZERO,
            camera_type: CameraType::Perspective,
            camera_fov: 40.0,
            camera_eye_sep: 0.3,
            camera_z: -800.0,
            clip_near: 0.0,
            clip_far: 100.0,
            clip_dist: 10.0,
            clip_mode: ClipMode::Scene,
            clip_scale: ClipScale::Relative,
            light_color: hex_color(0xdd_dd_dd),
            light_intensity: 1.0,
            ambient_color: hex_color(0xdd_dd_dd),
            ambient_intensity: 0.2,
            sample_level: 0,
            pixel_ratio: 1.0,
            pick_precision: PickPrecision::Float,
            show_bounding_box: false,
            outline: OutlineParams::default(),
            highlight_timeout_ms: 3000,
        }
    }
}

impl ViewerParameters {
    /// Parses parameters from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the parameters to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Camera projection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    #[default]
    Perspective,
    Orthographic,
    /// Side-by-side stereo; each half uses a perspective camera offset by the eye separation.
    Stereo,
}

/// Reference point of clip and fog distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClipMode {
    /// Relative to the scene center as seen from the camera.
    #[default]
    Scene,
    /// Absolute distances from the camera.
    Camera,
}

/// Units of clip and fog distances in scene mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClipScale {
    /// Percent of the bounding radius, 50 at the scene center.
    #[default]
    Relative,
    /// Scene units offset from the scene center.
    Absolute,
}

/// Precision of the picking render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PickPrecision {
    /// 32-bit float channels; object ids stored raw.
    #[default]
    Float,
    /// 8-bit channels; object ids stored as `id / 255`, limiting them to 255.
    Byte,
}

/// Edge outline composed over highlighted primitives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineParams {
    pub edge_strength: f32,
    pub edge_glow: f32,
    /// Edge width in device pixels.
    pub edge_thickness: f32,
    /// Edge color where the highlighted primitive is visible.
    pub visible_edge_color: Vec3,
    /// Edge color where it is occluded.
    pub hidden_edge_color: Vec3,
}

impl Default for OutlineParams {
    fn default() -> Self {
        Self {
            edge_strength: 5.0,
            edge_glow: 0.5,
            edge_thickness: 2.0,
            visible_edge_color: Vec3::ONE,
            hidden_edge_color: hex_color(0x19_0a_05),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        let c = hex_color(0xff_80_00);
        assert_eq!(c.x, 1.0);
        assert!((c.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.z, 0.0);
    }

    #[test]
    fn test_defaults() {
        let p = ViewerParameters::default();
        assert_eq!(p.camera_z, -800.0);
        assert_eq!(p.clip_mode, ClipMode::Scene);
        assert_eq!(p.clip_scale, ClipScale::Relative);
        assert_eq!(p.sample_level, 0);
        assert_eq!(p.fog_color, hex_color(0x222222));
    }

    #[test]
    fn test_json_partial() {
        let p = ViewerParameters::from_json(r#"{ "clip_mode": "camera", "sample_level": 2 }"#)
            .unwrap();
        assert_eq!(p.clip_mode, ClipMode::Camera);
        assert_eq!(p.sample_level, 2);
        assert_eq!(p.camera_fov, 40.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut p = ViewerParameters::default();
        p.camera_type = CameraType::Orthographic;
        let back = ViewerParameters::from_json(&p.to_json().unwrap()).unwrap();
        assert_eq!(back, p);
    }
}
