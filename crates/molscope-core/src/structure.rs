//! The interface representations use to pull data out of a structure.
//!
//! Parsing and topology live outside this crate; a [`StructureView`] only has to
//! hand out attribute arrays for the atoms and bonds matching a selection.

use glam::Vec3;

use crate::attributes::{AttributeArrays, DataFields};
use crate::bounds::BoundingBox;
use crate::error::Result;
use crate::picking::OwnerId;

/// A selection string with a change counter.
///
/// Its grammar belongs to the structure implementation. Representations only
/// compare versions to decide whether topology changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    string: String,
    version: u64,
}

impl Selection {
    /// Creates a selection.
    #[must_use]
    pub fn new(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            version: 0,
        }
    }

    /// The selection string.
    #[must_use]
    pub fn string(&self) -> &str {
        &self.string
    }

    /// Incremented on every change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replaces the string. Returns true if it changed.
    pub fn set_string(&mut self, string: impl Into<String>) -> bool {
        let string = string.into();
        if string == self.string {
            return false;
        }
        self.string = string;
        self.version += 1;
        true
    }

    /// Returns true for the empty or match-all selection.
    #[must_use]
    pub fn is_all(&self) -> bool {
        let s = self.string.trim();
        s.is_empty() || s == "*" || s.eq_ignore_ascii_case("all")
    }
}

/// How atoms and bonds are colored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ColorScheme {
    /// One color for everything.
    Uniform(Vec3),
    /// CPK-style element colors.
    #[default]
    Element,
    /// Nucleotide colors by residue name, element colors elsewhere.
    ResidueName,
    /// Rainbow over residue numbers.
    ResidueIndex,
}

/// Source of per-atom radii.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RadiusType {
    /// Van der Waals radius of the element.
    #[default]
    Vdw,
    /// Covalent radius of the element.
    Covalent,
    /// The same radius for every atom.
    Size(f32),
}

/// Radius source plus a scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusPolicy {
    pub kind: RadiusType,
    pub scale: f32,
}

impl Default for RadiusPolicy {
    fn default() -> Self {
        Self {
            kind: RadiusType::Vdw,
            scale: 1.0,
        }
    }
}

/// How bonds of order > 1 are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultipleBond {
    /// One cylinder per bond.
    #[default]
    Off,
    /// Parallel cylinders centered on the bond axis.
    Symmetric,
    /// The main cylinder plus thinner ones offset to one side.
    Offset,
}

/// Parameters for [`StructureView::atom_data`].
#[derive(Debug, Clone, PartialEq)]
pub struct AtomParams {
    pub what: DataFields,
    pub color: ColorScheme,
    pub radius: RadiusPolicy,
    /// Owner id written into the picker.
    pub owner: OwnerId,
}

/// Parameters for [`StructureView::bond_data`] and [`StructureView::rung_bond_data`].
#[derive(Debug, Clone, PartialEq)]
pub struct BondParams {
    pub what: DataFields,
    pub color: ColorScheme,
    pub radius: RadiusPolicy,
    pub multiple_bond: MultipleBond,
    /// Distance between parallel cylinders, in bond radii.
    pub bond_spacing: f32,
    /// Radius of the extra cylinders relative to the main one.
    pub bond_scale: f32,
    pub owner: OwnerId,
}

/// Per-atom facts used by picking proxies.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    pub index: u32,
    pub name: String,
    pub element: String,
    pub resname: String,
    pub resno: i32,
    pub chain: String,
    pub position: Vec3,
}

/// Read access to a structure restricted to a selection.
pub trait StructureView {
    /// Human readable name.
    fn name(&self) -> &str;

    /// Number of selected atoms.
    fn atom_count(&self) -> usize;

    /// Number of selected bonds.
    fn bond_count(&self) -> usize;

    /// Attribute arrays with one sphere per selected atom.
    ///
    /// Fields not requested in `params.what` are left empty.
    fn atom_data(&self, params: &AtomParams) -> Result<AttributeArrays>;

    /// Attribute arrays with one cylinder per selected bond (more with multiple bonds).
    fn bond_data(&self, params: &BondParams) -> Result<AttributeArrays>;

    /// Attribute arrays for the rung bond of each selected nucleotide.
    ///
    /// The rung runs from the sugar carbon to the base nitrogen. Position2 is the
    /// base end.
    fn rung_bond_data(&self, params: &BondParams) -> Result<AttributeArrays>;

    /// Looks up an atom by structure index.
    fn atom(&self, index: u32) -> Option<AtomRecord>;

    /// The two atoms of a bond.
    fn bond_atoms(&self, bond: u32) -> Option<[u32; 2]>;

    /// Atoms bonded to `atom`.
    fn bonded_neighbors(&self, atom: u32) -> Vec<u32>;

    /// Bounds of the selected atoms.
    fn bounding_box(&self) -> BoundingBox;
}
