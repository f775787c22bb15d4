//! One sphere per atom.

use molscope_core::{AtomParams, BondParams, DataFields, OwnerId, RadiusPolicy, Result, StructureView};
use molscope_render::{Buffer, BufferKind};

use super::{
    sphere_update, CommonSettings, Rebuild, Representation, RepresentationData,
    RepresentationParameters,
};

/// Spheres at van der Waals radius.
#[derive(Debug, Clone)]
pub struct SpacefillRepresentation {
    common: CommonSettings,
}

impl SpacefillRepresentation {
    pub fn new(owner: OwnerId, params: &RepresentationParameters) -> Self {
        let mut repr = Self {
            common: CommonSettings::new(owner, RadiusPolicy::default()),
        };
        repr.common.apply(params);
        repr
    }
}

impl Representation for SpacefillRepresentation {
    fn kind(&self) -> &'static str {
        "spacefill"
    }

    fn create_data(&self, view: &dyn StructureView) -> Result<RepresentationData> {
        let atoms = view.atom_data(&self.atom_params(DataFields::ALL))?;
        let spheres = Buffer::shared(BufferKind::Sphere, atoms, self.common.buffer_params())?;
        log::debug!("spacefill of '{}': {} spheres", view.name(), view.atom_count());
        Ok(RepresentationData {
            buffers: vec![spheres],
        })
    }

    fn update_data(
        &self,
        what: DataFields,
        view: &dyn StructureView,
        data: &RepresentationData,
    ) -> Result<()> {
        let Some(spheres) = data.buffers.first() else {
            return Ok(());
        };
        let atoms = view.atom_data(&self.atom_params(what))?;
        spheres
            .borrow_mut()
            .set_attributes(sphere_update(what, atoms))
    }

    fn atom_params(&self, what: DataFields) -> AtomParams {
        self.common.atom_params(what)
    }

    fn bond_params(&self, what: DataFields) -> BondParams {
        self.common.bond_params(what)
    }

    fn set_parameters(&mut self, update: &RepresentationParameters) -> Rebuild {
        self.common.apply(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Atom, MemoryStructure};
    use glam::Vec3;
    use molscope_core::PickerKind;

    fn methane_core() -> MemoryStructure {
        let mut s = MemoryStructure::new("carbons");
        s.add_atom(Atom::new("C1", "MET", 1, "A", Vec3::ZERO));
        s.add_atom(Atom::new("C2", "MET", 1, "A", Vec3::new(1.5, 0.0, 0.0)));
        s
    }

    #[test]
    fn test_spheres_at_vdw_radius() {
        let s = methane_core();
        let repr = SpacefillRepresentation::new(3, &RepresentationParameters::default());
        let data = repr.create_data(&s).unwrap();
        assert_eq!(data.buffers.len(), 1);
        let spheres = data.buffers[0].borrow();
        assert_eq!(spheres.kind(), BufferKind::Sphere);
        assert_eq!(spheres.count(), 2);
        assert!(spheres.data().radius.iter().all(|r| (r - 1.7).abs() < 1e-6));
        let picker = spheres.picker().unwrap();
        assert_eq!(picker.kind, PickerKind::Atom);
        assert_eq!(picker.owner, 3);
        assert_eq!(picker.array, vec![0, 1]);
    }

    #[test]
    fn test_radius_scale_updates_in_place() {
        let s = methane_core();
        let mut repr = SpacefillRepresentation::new(1, &RepresentationParameters::default());
        let data = repr.create_data(&s).unwrap();
        let rebuild = repr.set_parameters(&RepresentationParameters {
            radius_scale: Some(0.5),
            ..RepresentationParameters::default()
        });
        assert_eq!(rebuild, Rebuild::Update(DataFields::RADIUS));
        repr.update_data(DataFields::RADIUS, &s, &data).unwrap();
        let spheres = data.buffers[0].borrow();
        assert!(spheres.data().radius.iter().all(|r| (r - 0.85).abs() < 1e-6));
        assert_eq!(spheres.data().position[1], Vec3::new(1.5, 0.0, 0.0));
    }

    #[test]
    fn test_unchanged_parameters_do_nothing() {
        let mut repr = SpacefillRepresentation::new(1, &RepresentationParameters::default());
        let same = RepresentationParameters {
            radius_scale: Some(1.0),
            ..RepresentationParameters::default()
        };
        assert_eq!(repr.set_parameters(&same), Rebuild::Nothing);
        let detail = RepresentationParameters {
            sphere_detail: Some(3),
            ..RepresentationParameters::default()
        };
        assert_eq!(repr.set_parameters(&detail), Rebuild::Full);
    }
}
