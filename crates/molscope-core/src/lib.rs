//! Core data model for molscope.
//!
//! This crate holds everything that does not touch the GPU:
//! - [`AttributeArrays`] produced by representations and consumed by buffers
//! - [`BoundingBox`] and the per-frame [`ClipState`]
//! - supersampling jitter tables and weights
//! - picking metadata ([`Picker`], [`PickingData`]) and the [`PickingProxy`]
//! - [`Signal`] observer lists, [`ViewerParameters`], and the [`StructureView`] interface

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Counts and indices are well below f32 precision limits
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod attributes;
pub mod bounds;
pub mod clip;
pub mod error;
pub mod options;
pub mod picking;
pub mod proxy;
pub mod signal;
pub mod structure;
pub mod supersample;

pub use attributes::{AttributeArrays, AttributeUpdate, Channel, DataFields};
pub use bounds::BoundingBox;
pub use clip::ClipState;
pub use error::{MolscopeError, Result};
pub use options::{
    hex_color, CameraType, ClipMode, ClipScale, OutlineParams, PickPrecision, ViewerParameters,
};
pub use picking::{OwnerId, PickOutcome, Picker, PickerKind, PickingData};
pub use proxy::{BaseInfo, PickedPrimitive, PickingProxy};
pub use signal::{Signal, Subscription};
pub use structure::{
    AtomParams, AtomRecord, BondParams, ColorScheme, MultipleBond, RadiusPolicy, RadiusType,
    Selection, StructureView,
};

// Re-export glam types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
