//! An in-memory structure: atoms, bonds and the nucleotide rungs derived from them.

use std::cell::OnceCell;
use std::sync::Arc;

use glam::Vec3;
use molscope_core::{
    AtomParams, AtomRecord, AttributeArrays, BondParams, BoundingBox, Channel, ColorScheme, DataFields,
    MolscopeError, MultipleBond, OwnerId, Picker, PickerKind, RadiusPolicy, RadiusType, Result,
    Selection, StructureView,
};

use crate::elements::{
    covalent_radius, element_color, element_from_name, nucleotide_color, rainbow, vdw_radius,
    Nucleobase,
};
use crate::selection::Filter;

/// Highest bond order drawn with parallel cylinders.
const MAX_DRAWN_ORDER: u8 = 3;
/// Fraction of the bond trimmed from each end of offset cylinders.
const OFFSET_SHORTEN: f32 = 0.15;

/// One atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub name: String,
    pub element: String,
    pub resname: String,
    pub resno: i32,
    pub chain: String,
    pub position: Vec3,
}

impl Atom {
    /// Creates an atom, guessing the element from its name.
    #[must_use]
    pub fn new(name: &str, resname: &str, resno: i32, chain: &str, position: Vec3) -> Self {
        Self {
            name: name.to_string(),
            element: element_from_name(name),
            resname: resname.to_string(),
            resno,
            chain: chain.to_string(),
            position,
        }
    }

    /// Overrides the guessed element.
    #[must_use]
    pub fn with_element(mut self, element: &str) -> Self {
        self.element = element.to_string();
        self
    }
}

/// A bond between two atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub atoms: [u32; 2],
    pub order: u8,
}

/// Atoms and bonds held in memory.
///
/// Bond rows `0..bonds().len()` are real bonds. Rows past them address the virtual
/// rung bonds, one per nucleotide, in residue order.
#[derive(Debug, Default)]
pub struct MemoryStructure {
    name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    neighbors: Vec<Vec<u32>>,
    rungs: OnceCell<Vec<[u32; 2]>>,
}

impl MemoryStructure {
    /// Creates an empty structure.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends an atom and returns its index.
    pub fn add_atom(&mut self, atom: Atom) -> u32 {
        let index = self.atoms.len() as u32;
        self.atoms.push(atom);
        self.neighbors.push(Vec::new());
        self.rungs = OnceCell::new();
        index
    }

    /// Appends a bond of `order` (at least 1) and returns its row.
    pub fn add_bond(&mut self, a: u32, b: u32, order: u8) -> Result<u32> {
        for index in [a, b] {
            if index as usize >= self.atoms.len() {
                log::error!("bond to missing atom {index}");
                return Err(MolscopeError::IndexOutOfRange {
                    what: "atom",
                    index: index as usize,
                    len: self.atoms.len(),
                });
            }
        }
        let row = self.bonds.len() as u32;
        self.bonds.push(Bond {
            atoms: [a, b],
            order: order.max(1),
        });
        self.neighbors[a as usize].push(b);
        self.neighbors[b as usize].push(a);
        Ok(row)
    }

    /// Moves every atom. `positions` must have one entry per atom.
    pub fn set_positions(&mut self, positions: &[Vec3]) -> Result<()> {
        if positions.len() != self.atoms.len() {
            log::error!(
                "{} positions for {} atoms",
                positions.len(),
                self.atoms.len()
            );
            return Err(MolscopeError::SizeMismatch {
                channel: Channel::Position,
                expected: self.atoms.len(),
                actual: positions.len(),
            });
        }
        for (atom, p) in self.atoms.iter_mut().zip(positions) {
            atom.position = *p;
        }
        Ok(())
    }

    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    #[must_use]
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Sugar carbon and base nitrogen of each nucleotide that has both.
    pub fn rungs(&self) -> &[[u32; 2]] {
        self.rungs.get_or_init(|| find_rungs(&self.atoms))
    }

    /// Restricts the structure to a selection.
    pub fn view(&self, selection: &Selection) -> Result<StructureSubset<'_>> {
        let filter = if selection.is_all() {
            Filter::All
        } else {
            Filter::parse(selection.string())?
        };
        Ok(self.subset(&filter))
    }

    fn subset(&self, filter: &Filter) -> StructureSubset<'_> {
        let mask: Vec<bool> = self.atoms.iter().map(|a| filter.matches(a)).collect();
        let both = |[a, b]: [u32; 2]| mask[a as usize] && mask[b as usize];
        let bond_offset = self.bonds.len() as u32;
        StructureSubset {
            structure: self,
            atoms: (0..self.atoms.len() as u32)
                .filter(|&i| mask[i as usize])
                .collect(),
            bonds: (0..bond_offset)
                .filter(|&i| both(self.bonds[i as usize].atoms))
                .collect(),
            rungs: self
                .rungs()
                .iter()
                .enumerate()
                .filter(|(_, rung)| both(**rung))
                .map(|(k, _)| bond_offset + k as u32)
                .collect(),
        }
    }

    fn full(&self) -> StructureSubset<'_> {
        self.subset(&Filter::All)
    }

    fn record(&self, index: u32) -> Option<AtomRecord> {
        let atom = self.atoms.get(index as usize)?;
        Some(AtomRecord {
            index,
            name: atom.name.clone(),
            element: atom.element.clone(),
            resname: atom.resname.clone(),
            resno: atom.resno,
            chain: atom.chain.clone(),
            position: atom.position,
        })
    }

    /// The two atoms of a real or rung bond row.
    fn pair(&self, row: u32) -> Option<[u32; 2]> {
        let row = row as usize;
        match self.bonds.get(row) {
            Some(bond) => Some(bond.atoms),
            None => self.rungs().get(row - self.bonds.len()).copied(),
        }
    }

    fn resno_span(&self) -> (i32, i32) {
        let lo = self.atoms.iter().map(|a| a.resno).min().unwrap_or(0);
        let hi = self.atoms.iter().map(|a| a.resno).max().unwrap_or(0);
        (lo, hi)
    }

    fn atom_color(&self, index: u32, scheme: ColorScheme, span: (i32, i32)) -> Vec3 {
        let atom = &self.atoms[index as usize];
        match scheme {
            ColorScheme::Uniform(color) => color,
            ColorScheme::Element => element_color(&atom.element),
            ColorScheme::ResidueName => {
                nucleotide_color(&atom.resname).unwrap_or_else(|| element_color(&atom.element))
            }
            ColorScheme::ResidueIndex => {
                let (lo, hi) = span;
                let t = if hi > lo {
                    (atom.resno - lo) as f32 / (hi - lo) as f32
                } else {
                    0.0
                };
                rainbow(t)
            }
        }
    }

    fn atom_radius(&self, index: u32, policy: RadiusPolicy) -> f32 {
        let element = &self.atoms[index as usize].element;
        let base = match policy.kind {
            RadiusType::Vdw => vdw_radius(element),
            RadiusType::Covalent => covalent_radius(element),
            RadiusType::Size(size) => size,
        };
        (base * policy.scale).max(0.0)
    }

    /// Unit vector across the bond, in the plane of a neighboring bond when there is one.
    fn bond_shift(&self, [a, b]: [u32; 2], axis: Vec3) -> Vec3 {
        let origin = self.atoms[a as usize].position;
        let in_plane = self.neighbors[a as usize]
            .iter()
            .filter(|&&n| n != b)
            .chain(self.neighbors[b as usize].iter().filter(|&&n| n != a))
            .map(|&n| {
                let v = self.atoms[n as usize].position - origin;
                (v - axis * v.dot(axis)).normalize_or_zero()
            })
            .find(|v| *v != Vec3::ZERO);
        in_plane.unwrap_or_else(|| {
            if axis == Vec3::ZERO {
                Vec3::X
            } else {
                axis.any_orthonormal_vector()
            }
        })
    }
}

/// Sugar carbon to base nitrogen, one per nucleotide residue.
fn find_rungs(atoms: &[Atom]) -> Vec<[u32; 2]> {
    let mut rungs = Vec::new();
    let mut start = 0;
    while start < atoms.len() {
        let first = &atoms[start];
        let end = atoms[start..]
            .iter()
            .position(|a| a.resno != first.resno || a.chain != first.chain || a.resname != first.resname)
            .map_or(atoms.len(), |len| start + len);
        if let Some(base) = Nucleobase::of(&first.resname) {
            let find = |names: &[&str]| {
                names.iter().find_map(|name| {
                    (start..end).find(|&i| atoms[i].name.eq_ignore_ascii_case(name))
                })
            };
            let sugar = find(&["C4'", "C4*", "C3'", "C3*"]);
            let nitrogen = find(&[base.rung_nitrogen()]);
            if let (Some(s), Some(n)) = (sugar, nitrogen) {
                rungs.push([s as u32, n as u32]);
            }
        }
        start = end;
    }
    rungs
}

impl StructureView for MemoryStructure {
    fn name(&self) -> &str {
        &self.name
    }

    fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    fn atom_data(&self, params: &AtomParams) -> Result<AttributeArrays> {
        self.full().atom_data(params)
    }

    fn bond_data(&self, params: &BondParams) -> Result<AttributeArrays> {
        self.full().bond_data(params)
    }

    fn rung_bond_data(&self, params: &BondParams) -> Result<AttributeArrays> {
        self.full().rung_bond_data(params)
    }

    fn atom(&self, index: u32) -> Option<AtomRecord> {
        self.record(index)
    }

    fn bond_atoms(&self, bond: u32) -> Option<[u32; 2]> {
        self.pair(bond)
    }

    fn bonded_neighbors(&self, atom: u32) -> Vec<u32> {
        self.neighbors
            .get(atom as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.atoms.iter().map(|a| a.position))
    }
}

/// A [`MemoryStructure`] restricted to the atoms of a selection.
///
/// Bonds and rungs are kept when both of their atoms are selected.
#[derive(Debug, Clone)]
pub struct StructureSubset<'a> {
    structure: &'a MemoryStructure,
    atoms: Vec<u32>,
    bonds: Vec<u32>,
    rungs: Vec<u32>,
}

/// Collects the requested channels of cylinder data.
#[derive(Default)]
struct CylinderData {
    position: Vec<Vec3>,
    position2: Vec<Vec3>,
    color: Vec<Vec3>,
    color2: Vec<Vec3>,
    radius: Vec<f32>,
    rows: Vec<u32>,
}

impl CylinderData {
    fn finish(self, what: DataFields, kind: PickerKind, owner: OwnerId) -> AttributeArrays {
        AttributeArrays {
            position: if what.position { self.position } else { Vec::new() },
            position2: what.position.then_some(self.position2),
            color: if what.color { self.color } else { Vec::new() },
            color2: what.color.then_some(self.color2),
            radius: if what.radius { self.radius } else { Vec::new() },
            picking: what
                .picking
                .then(|| Arc::new(Picker::new(kind, self.rows, owner))),
            ..AttributeArrays::default()
        }
    }
}

impl StructureSubset<'_> {
    /// Structure indices of the selected atoms.
    #[must_use]
    pub fn atom_indices(&self) -> &[u32] {
        &self.atoms
    }

    /// Rows of the selected bonds.
    #[must_use]
    pub fn bond_rows(&self) -> &[u32] {
        &self.bonds
    }

    /// Rows of the selected rung bonds.
    #[must_use]
    pub fn rung_rows(&self) -> &[u32] {
        &self.rungs
    }

    fn push_bond(&self, out: &mut CylinderData, row: u32, params: &BondParams, span: (i32, i32)) {
        let s = self.structure;
        let Some(pair @ [a, b]) = s.pair(row) else {
            return;
        };
        let p1 = s.atoms[a as usize].position;
        let p2 = s.atoms[b as usize].position;
        let c1 = s.atom_color(a, params.color, span);
        let c2 = s.atom_color(b, params.color, span);
        let radius = s
            .atom_radius(a, params.radius)
            .min(s.atom_radius(b, params.radius));

        let order = s
            .bonds
            .get(row as usize)
            .map_or(1, |bond| bond.order.min(MAX_DRAWN_ORDER));
        let mut emit = |from: Vec3, to: Vec3, r: f32| {
            out.position.push(from);
            out.position2.push(to);
            out.color.push(c1);
            out.color2.push(c2);
            out.radius.push(r);
            out.rows.push(row);
        };
        if order < 2 || params.multiple_bond == MultipleBond::Off {
            emit(p1, p2, radius);
            return;
        }

        let axis = (p2 - p1).normalize_or_zero();
        let shift = s.bond_shift(pair, axis);
        let thin = radius * params.bond_scale;
        match params.multiple_bond {
            MultipleBond::Symmetric => {
                let spacing = params.bond_spacing * radius;
                let center = f32::from(order - 1) / 2.0;
                for j in 0..order {
                    let offset = shift * spacing * (f32::from(j) - center);
                    emit(p1 + offset, p2 + offset, thin);
                }
            }
            MultipleBond::Offset => {
                emit(p1, p2, radius);
                let trim = (p2 - p1) * OFFSET_SHORTEN;
                for j in 1..order {
                    let offset = shift * radius * (1.0 + params.bond_spacing) * f32::from(j);
                    emit(p1 + trim + offset, p2 - trim + offset, thin);
                }
            }
            MultipleBond::Off => {}
        }
    }
}

impl StructureView for StructureSubset<'_> {
    fn name(&self) -> &str {
        &self.structure.name
    }

    fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    fn atom_data(&self, params: &AtomParams) -> Result<AttributeArrays> {
        let s = self.structure;
        let what = params.what;
        let span = s.resno_span();
        let mut data = AttributeArrays::default();
        if what.position {
            data.position = self
                .atoms
                .iter()
                .map(|&i| s.atoms[i as usize].position)
                .collect();
        }
        if what.color {
            data.color = self
                .atoms
                .iter()
                .map(|&i| s.atom_color(i, params.color, span))
                .collect();
        }
        if what.radius {
            data.radius = self
                .atoms
                .iter()
                .map(|&i| s.atom_radius(i, params.radius))
                .collect();
        }
        if what.picking {
            data.picking = Some(Arc::new(Picker::new(
                PickerKind::Atom,
                self.atoms.clone(),
                params.owner,
            )));
        }
        Ok(data)
    }

    fn bond_data(&self, params: &BondParams) -> Result<AttributeArrays> {
        let span = self.structure.resno_span();
        let mut out = CylinderData::default();
        for &row in &self.bonds {
            self.push_bond(&mut out, row, params, span);
        }
        Ok(out.finish(params.what, PickerKind::Bond, params.owner))
    }

    fn rung_bond_data(&self, params: &BondParams) -> Result<AttributeArrays> {
        let span = self.structure.resno_span();
        let single = BondParams {
            multiple_bond: MultipleBond::Off,
            ..params.clone()
        };
        let mut out = CylinderData::default();
        for &row in &self.rungs {
            self.push_bond(&mut out, row, &single, span);
        }
        Ok(out.finish(params.what, PickerKind::Bond, params.owner))
    }

    fn atom(&self, index: u32) -> Option<AtomRecord> {
        self.structure.record(index)
    }

    fn bond_atoms(&self, bond: u32) -> Option<[u32; 2]> {
        self.structure.pair(bond)
    }

    fn bonded_neighbors(&self, atom: u32) -> Vec<u32> {
        self.structure.bonded_neighbors(atom)
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(
            self.atoms
                .iter()
                .map(|&i| self.structure.atoms[i as usize].position),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two guanosine-like residues plus an ethene fragment.
    fn sample() -> MemoryStructure {
        let mut s = MemoryStructure::new("sample");
        for (resno, x) in [(1, 0.0), (2, 10.0)] {
            let c4 = s.add_atom(Atom::new("C4'", "G", resno, "A", Vec3::new(x, 0.0, 0.0)));
            let n1 = s.add_atom(Atom::new("N1", "G", resno, "A", Vec3::new(x, 4.0, 0.0)));
            let c2 = s.add_atom(Atom::new("C2", "G", resno, "A", Vec3::new(x + 1.0, 5.0, 0.0)));
            s.add_bond(c4, n1, 1).unwrap();
            s.add_bond(n1, c2, 1).unwrap();
        }
        let a = s.add_atom(Atom::new("C1", "ETH", 3, "B", Vec3::new(0.0, 0.0, 20.0)));
        let b = s.add_atom(Atom::new("C2", "ETH", 3, "B", Vec3::new(1.3, 0.0, 20.0)));
        let h = s.add_atom(Atom::new("H1", "ETH", 3, "B", Vec3::new(-0.5, 1.0, 20.0)));
        s.add_bond(a, b, 2).unwrap();
        s.add_bond(a, h, 1).unwrap();
        s
    }

    fn bond_params(what: DataFields, multiple_bond: MultipleBond) -> BondParams {
        BondParams {
            what,
            color: ColorScheme::Element,
            radius: RadiusPolicy {
                kind: RadiusType::Size(0.2),
                scale: 1.0,
            },
            multiple_bond,
            bond_spacing: 1.0,
            bond_scale: 0.4,
            owner: 9,
        }
    }

    #[test]
    fn test_bad_bond_rejected() {
        let mut s = sample();
        assert!(matches!(
            s.add_bond(0, 99, 1),
            Err(MolscopeError::IndexOutOfRange { what: "atom", .. })
        ));
    }

    #[test]
    fn test_rungs_found_per_residue() {
        let s = sample();
        assert_eq!(s.rungs(), &[[0, 1], [3, 4]]);
        // rows after the real bonds address rungs
        assert_eq!(s.bond_atoms(6), Some([0, 1]));
        assert_eq!(s.bond_atoms(7), Some([3, 4]));
        assert_eq!(s.bond_atoms(8), None);
    }

    #[test]
    fn test_selection_subset() {
        let s = sample();
        let view = s.view(&Selection::new(":A and 1")).unwrap();
        assert_eq!(view.atom_indices(), &[0, 1, 2]);
        assert_eq!(view.bond_rows(), &[0, 1]);
        assert_eq!(view.rung_rows(), &[6]);
        assert!(s.view(&Selection::new("[G")).is_err());
    }

    #[test]
    fn test_atom_data_only_requested_fields() {
        let s = sample();
        let params = AtomParams {
            what: DataFields::COLOR,
            color: ColorScheme::ResidueName,
            radius: RadiusPolicy::default(),
            owner: 1,
        };
        let data = s.atom_data(&params).unwrap();
        assert!(data.position.is_empty());
        assert!(data.radius.is_empty());
        assert!(data.picking.is_none());
        assert_eq!(data.color.len(), 9);
        assert_eq!(data.color[0], nucleotide_color("G").unwrap());
        // not a nucleotide: falls back to element colors
        assert_eq!(data.color[6], element_color("C"));
    }

    #[test]
    fn test_atom_data_picker_rows_are_structure_indices() {
        let s = sample();
        let view = s.view(&Selection::new("_N")).unwrap();
        let params = AtomParams {
            what: DataFields::ALL,
            color: ColorScheme::Element,
            radius: RadiusPolicy::default(),
            owner: 4,
        };
        let data = view.atom_data(&params).unwrap();
        assert_eq!(data.validate().unwrap(), 2);
        let picker = data.picking.unwrap();
        assert_eq!(picker.array, vec![1, 4]);
        assert_eq!(picker.owner, 4);
        assert!((data.radius[0] - 1.55).abs() < 1e-6);
    }

    #[test]
    fn test_multiple_bond_modes() {
        let s = sample();
        let view = s.view(&Selection::new(":B")).unwrap();

        let off = view.bond_data(&bond_params(DataFields::ALL, MultipleBond::Off)).unwrap();
        assert_eq!(off.validate().unwrap(), 2);

        let sym = view
            .bond_data(&bond_params(DataFields::ALL, MultipleBond::Symmetric))
            .unwrap();
        assert_eq!(sym.validate().unwrap(), 3);
        assert_eq!(sym.picking.as_ref().unwrap().array, vec![4, 4, 5]);
        // the two halves of the double bond sit on either side of the axis
        let mid = (sym.position[0] + sym.position[1]) * 0.5;
        assert!((mid - Vec3::new(0.0, 0.0, 20.0)).length() < 1e-5);
        assert!((sym.radius[0] - 0.08).abs() < 1e-6);

        let offset = view
            .bond_data(&bond_params(DataFields::ALL, MultipleBond::Offset))
            .unwrap();
        assert_eq!(offset.len(), 3);
        assert_eq!(offset.position[0], Vec3::new(0.0, 0.0, 20.0));
        assert!((offset.radius[0] - 0.2).abs() < 1e-6);
        // the extra cylinder is shifted towards the hydrogen's side
        assert!(offset.position[1].y > 0.0);
    }

    #[test]
    fn test_rung_bond_data() {
        let s = sample();
        let data = s
            .rung_bond_data(&bond_params(DataFields::ALL, MultipleBond::Symmetric))
            .unwrap();
        assert_eq!(data.validate().unwrap(), 2);
        assert_eq!(data.picking.as_ref().unwrap().array, vec![6, 7]);
        assert_eq!(data.position2.as_ref().unwrap()[1], Vec3::new(10.0, 4.0, 0.0));
    }

    #[test]
    fn test_residue_index_rainbow() {
        let s = sample();
        let params = AtomParams {
            what: DataFields::COLOR,
            color: ColorScheme::ResidueIndex,
            radius: RadiusPolicy::default(),
            owner: 1,
        };
        let data = s.atom_data(&params).unwrap();
        assert_eq!(data.color[0], rainbow(0.0));
        assert_eq!(data.color[8], rainbow(1.0));
    }

    #[test]
    fn test_set_positions_checks_length() {
        let mut s = sample();
        assert!(s.set_positions(&[Vec3::ZERO]).is_err());
        let moved: Vec<Vec3> = s.atoms().iter().map(|a| a.position + Vec3::X).collect();
        s.set_positions(&moved).unwrap();
        assert_eq!(s.atoms()[0].position, Vec3::X);
    }
}
