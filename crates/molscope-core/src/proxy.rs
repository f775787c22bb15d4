//! Classifies decoded picks into atoms, bonds and ellipsoids.

use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::picking::{OwnerId, PickerKind, PickingData};
use crate::structure::{AtomRecord, StructureView};

/// Residue reported for an ellipsoid built around a nucleotide rung.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseInfo {
    pub resno: i32,
    pub resname: String,
}

/// A picked domain primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum PickedPrimitive {
    Atom {
        owner: OwnerId,
        atom: AtomRecord,
        /// Position after the instance transform.
        position: Vec3,
    },
    Bond {
        owner: OwnerId,
        bond: u32,
        atoms: [AtomRecord; 2],
        /// Bond midpoint after the instance transform.
        position: Vec3,
    },
    Ellipsoid {
        owner: OwnerId,
        bond: u32,
        atoms: [AtomRecord; 2],
        position: Vec3,
        base: Option<BaseInfo>,
    },
}

impl PickedPrimitive {
    /// Owner of the picked primitive.
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        match self {
            PickedPrimitive::Atom { owner, .. }
            | PickedPrimitive::Bond { owner, .. }
            | PickedPrimitive::Ellipsoid { owner, .. } => *owner,
        }
    }

    /// World position of the pick.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        match self {
            PickedPrimitive::Atom { position, .. }
            | PickedPrimitive::Bond { position, .. }
            | PickedPrimitive::Ellipsoid { position, .. } => *position,
        }
    }

    /// Short text label.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            PickedPrimitive::Atom { atom, .. } => atom_label(atom),
            PickedPrimitive::Bond { atoms, .. } => {
                format!("{} = {}", atom_label(&atoms[0]), atom_label(&atoms[1]))
            }
            PickedPrimitive::Ellipsoid {
                base: Some(base), ..
            } => format!("{}: {}", base.resno, base.resname),
            PickedPrimitive::Ellipsoid { atoms, .. } => {
                format!("{} - {}", atom_label(&atoms[0]), atom_label(&atoms[1]))
            }
        }
    }
}

fn atom_label(atom: &AtomRecord) -> String {
    format!(
        "[{}]{}:{}.{}",
        atom.resname, atom.resno, atom.chain, atom.name
    )
}

/// Wraps one decoded pick.
#[derive(Debug, Clone)]
pub struct PickingProxy {
    data: PickingData,
    row: u32,
}

impl PickingProxy {
    /// Validates the pick against its picker and wraps it.
    pub fn new(data: PickingData) -> Result<Self> {
        let row = data.row()?;
        Ok(Self { data, row })
    }

    /// The kind of primitive picked.
    #[must_use]
    pub fn kind(&self) -> PickerKind {
        self.data.picker.kind
    }

    /// Primitive slot inside the buffer.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.data.pid
    }

    /// Domain row.
    #[must_use]
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Owner of the picker.
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.data.picker.owner
    }

    /// Instance matrix of the picked copy.
    #[must_use]
    pub fn instance(&self) -> Option<Mat4> {
        self.data.instance
    }

    /// The underlying pick.
    #[must_use]
    pub fn data(&self) -> &PickingData {
        &self.data
    }

    /// Resolves the pick against the owner's structure.
    ///
    /// Returns `None` for ignored pickers or rows the structure does not know.
    #[must_use]
    pub fn resolve(&self, view: &dyn StructureView) -> Option<PickedPrimitive> {
        let owner = self.owner();
        let transform = self.instance().unwrap_or(Mat4::IDENTITY);
        match self.kind() {
            PickerKind::Atom => {
                let atom = view.atom(self.row)?;
                let position = transform.transform_point3(atom.position);
                Some(PickedPrimitive::Atom {
                    owner,
                    atom,
                    position,
                })
            }
            PickerKind::Bond => {
                let atoms = bond_records(view, self.row)?;
                let position = transform.transform_point3(midpoint(&atoms));
                Some(PickedPrimitive::Bond {
                    owner,
                    bond: self.row,
                    atoms,
                    position,
                })
            }
            PickerKind::Ellipsoid => {
                let atoms = bond_records(view, self.row)?;
                let position = transform.transform_point3(midpoint(&atoms));
                let base = rung_base(&atoms);
                Some(PickedPrimitive::Ellipsoid {
                    owner,
                    bond: self.row,
                    atoms,
                    position,
                    base,
                })
            }
            PickerKind::Ignore => None,
        }
    }
}

fn bond_records(view: &dyn StructureView, bond: u32) -> Option<[AtomRecord; 2]> {
    let [a, b] = view.bond_atoms(bond)?;
    Some([view.atom(a)?, view.atom(b)?])
}

fn midpoint(atoms: &[AtomRecord; 2]) -> Vec3 {
    (atoms[0].position + atoms[1].position) * 0.5
}

/// A rung bond joins the C4' (or C3') sugar carbon to the N1 or N3 base nitrogen of the
/// same residue.
fn rung_base(atoms: &[AtomRecord; 2]) -> Option<BaseInfo> {
    let [a1, a2] = atoms;
    let is_rung = a1.resno == a2.resno
        && (a1.name.contains("C4'") || a1.name.contains("C3'"))
        && (a2.name.contains("N1") || a2.name.contains("N3"));
    is_rung.then(|| BaseInfo {
        resno: a1.resno,
        resname: a1.resname.clone(),
    })
}
