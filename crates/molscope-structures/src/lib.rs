//! Molecular structures and representations for molscope.
//!
//! This crate provides:
//! - [`MemoryStructure`], an in-memory atom/bond/residue store with rung detection
//! - a small selection grammar ([`Filter`])
//! - representations turning a structure view into buffers:
//!   spacefill, ball+stick and nucleotide base ellipsoids
//! - the [`RepresentationRegistry`] factory map and the [`StructureRepresentation`]
//!   binding that keeps a representation's buffers attached to a viewer

// Graphics code intentionally uses casts for indices, colors, and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

pub mod elements;
pub mod representation;
pub mod selection;
pub mod structure;

pub use representation::{
    BallStickRepresentation, BaseRepresentation, Rebuild, Representation, RepresentationData,
    RepresentationFactory, RepresentationParameters, RepresentationRegistry,
    SpacefillRepresentation, StructureRepresentation,
};
pub use selection::{AtomSpec, Filter};
pub use structure::{Atom, Bond, MemoryStructure, StructureSubset};
