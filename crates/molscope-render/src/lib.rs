//! Render and pick pipeline for molscope.
//!
//! This crate provides:
//! - [`Buffer`]s of spheres, cylinders and ellipsoids drawn as impostors or instanced meshes
//! - the [`Viewer`] state machine: scene groups, frame loop, supersampling, picking
//! - the [`RenderBackend`] seam with a CPU [`SoftwareBackend`] and the wgpu [`WgpuBackend`]
//! - camera, lighting and screenshot helpers

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Pixel coordinates and counts are well below f32 precision limits
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod buffer;
pub mod camera;
pub mod engine;
pub mod error;
pub mod lighting;
pub mod pick;
pub mod screenshot;
pub mod software;
pub mod uniforms;
pub mod viewer;

pub use backend::{DrawItem, FrameState, RenderBackend, RenderTarget, Viewport};
pub use buffer::{
    Buffer, BufferHandle, BufferId, BufferKind, BufferMode, BufferParams, MeshTarget, MeshView,
};
pub use camera::{Camera, ProjectionMode};
pub use engine::WgpuBackend;
pub use error::{RenderError, RenderResult};
pub use lighting::LightState;
pub use pick::{color_to_index, index_to_color, PickPixel, PICK_NEIGHBORHOOD};
pub use screenshot::{save_image, save_to_buffer, ImageParams, ScreenshotError};
pub use software::SoftwareBackend;
pub use uniforms::{ObjectUniforms, UniformNeeds};
pub use viewer::{Clock, FrameStats, Group, ManualClock, SceneGraph, SystemClock, Viewer};
