//! molscope: interactive molecular scenes with exact GPU picking.
//!
//! A [`Stage`] owns a [`Viewer`] and the structures shown in it. Each structure
//! gets one or more representations (`"spacefill"`, `"ball+stick"`, `"base"`),
//! which turn atoms and bonds into sphere, cylinder and ellipsoid buffers.
//! Clicking resolves the pixel back to the atom, bond or base under it.
//!
//! # Quick Start
//!
//! ```no_run
//! use molscope::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let mut structure = MemoryStructure::new("water");
//!     let o = structure.add_atom(Atom::new("O", "HOH", 1, "A", Vec3::ZERO));
//!     let h = structure.add_atom(Atom::new("H1", "HOH", 1, "A", Vec3::new(0.96, 0.0, 0.0)));
//!     structure.add_bond(o, h, 1)?;
//!
//!     let mut stage = software_stage(640, 480, ViewerParameters::default());
//!     let id = stage.add_structure(structure);
//!     stage.add_representation(id, "ball+stick", "", &RepresentationParameters::default())?;
//!     stage.auto_view();
//!     render_to_file(&mut stage, "water.png", &ImageParams::default())?;
//!
//!     if let Some(picked) = stage.pick(320.0, 240.0)? {
//!         println!("{}", picked.label());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`SoftwareBackend`]: CPU rasterizer, always available, used by tests
//! - [`WgpuBackend`]: offscreen via [`gpu_stage`] or windowed via [`run_app`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Pointer coordinates are well below f32 precision limits
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

mod app;
mod controls;
mod headless;
mod init;
mod stage;

pub use app::{run_app, App, AppError, AppOptions, SetupFn};
pub use controls::PickingControls;
pub use headless::{gpu_stage, render_to_file, render_to_rgba, software_stage};
pub use init::{init_logging, load_parameters, save_parameters};
pub use stage::{Component, ComponentId, ReprId, Stage};

// Re-export core types
pub use molscope_core::{
    BoundingBox, CameraType, ClipMode, ClipScale, ColorScheme, DataFields, MolscopeError,
    MultipleBond, PickOutcome, PickPrecision, PickedPrimitive, PickerKind, PickingProxy, RadiusType,
    Result,
    Selection, ViewerParameters,
};
pub use molscope_core::{Mat4, Vec2, Vec3, Vec4};

// Re-export render types
pub use molscope_render::{
    Buffer, BufferHandle, BufferKind, BufferMode, BufferParams, Clock, FrameStats, ImageParams, ManualClock,
    RenderBackend, SoftwareBackend, Viewer, WgpuBackend,
};

// Re-export structures
pub use molscope_structures::{
    Atom, Bond, MemoryStructure, Rebuild, RepresentationParameters, RepresentationRegistry,
    StructureRepresentation,
};
