//! Atoms as spheres, bonds as cylinders.

use molscope_core::{
    AtomParams, BondParams, DataFields, MultipleBond, OwnerId, Result, StructureView,
};
use molscope_render::{Buffer, BufferKind};

use super::{
    cylinder_update, replace, size_policy, sphere_update, CommonSettings, Rebuild,
    Representation, RepresentationData, RepresentationParameters,
};

/// Bond radius per unit of line width when drawing lines.
const LINE_RADIUS_PER_WIDTH: f32 = 0.02;

/// Ball and stick.
///
/// Bonds use the representation radius, atoms that radius times the aspect ratio.
/// `buffers[0]` holds the cylinders, `buffers[1]` the spheres unless
/// `cylinder_only` or `line_only` is set.
#[derive(Debug, Clone)]
pub struct BallStickRepresentation {
    common: CommonSettings,
    aspect_ratio: f32,
    multiple_bond: MultipleBond,
    bond_spacing: f32,
    bond_scale: f32,
    line_only: bool,
    cylinder_only: bool,
    linewidth: f32,
}

impl BallStickRepresentation {
    pub fn new(owner: OwnerId, params: &RepresentationParameters) -> Self {
        let mut repr = Self {
            common: CommonSettings::new(owner, size_policy(0.15)),
            aspect_ratio: 2.0,
            multiple_bond: MultipleBond::Off,
            bond_spacing: 1.0,
            bond_scale: 0.4,
            line_only: false,
            cylinder_only: false,
            linewidth: 2.0,
        };
        repr.set_parameters(params);
        repr
    }

    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    #[must_use]
    pub fn multiple_bond(&self) -> MultipleBond {
        self.multiple_bond
    }

    fn has_spheres(&self) -> bool {
        !(self.line_only || self.cylinder_only)
    }
}

impl Representation for BallStickRepresentation {
    fn kind(&self) -> &'static str {
        "ball+stick"
    }

    fn create_data(&self, view: &dyn StructureView) -> Result<RepresentationData> {
        let bonds = view.bond_data(&self.bond_params(DataFields::ALL))?;
        let mut buffers = vec![Buffer::shared(
            BufferKind::Cylinder,
            bonds,
            self.common.buffer_params(),
        )?];
        if self.has_spheres() {
            let atoms = view.atom_data(&self.atom_params(DataFields::ALL))?;
            buffers.push(Buffer::shared(
                BufferKind::Sphere,
                atoms,
                self.common.buffer_params(),
            )?);
        }
        log::debug!(
            "ball+stick of '{}': {} atoms, {} bonds",
            view.name(),
            view.atom_count(),
            view.bond_count()
        );
        Ok(RepresentationData { buffers })
    }

    fn update_data(
        &self,
        what: DataFields,
        view: &dyn StructureView,
        data: &RepresentationData,
    ) -> Result<()> {
        let mut bond_what = what;
        // parallel cylinders are placed in units of the bond radius
        if self.multiple_bond != MultipleBond::Off && what.radius {
            bond_what.position = true;
        }
        if let Some(cylinders) = data.buffers.first() {
            let bonds = view.bond_data(&self.bond_params(bond_what))?;
            cylinders
                .borrow_mut()
                .set_attributes(cylinder_update(bond_what, bonds))?;
        }
        if let Some(spheres) = data.buffers.get(1) {
            let atoms = view.atom_data(&self.atom_params(what))?;
            spheres
                .borrow_mut()
                .set_attributes(sphere_update(what, atoms))?;
        }
        Ok(())
    }

    fn atom_params(&self, what: DataFields) -> AtomParams {
        let mut params = self.common.atom_params(what);
        params.radius.scale *= self.aspect_ratio;
        params
    }

    fn bond_params(&self, what: DataFields) -> BondParams {
        let mut params = self.common.bond_params(what);
        params.multiple_bond = self.multiple_bond;
        params.bond_spacing = self.bond_spacing;
        params.bond_scale = self.bond_scale;
        if self.line_only {
            params.radius = size_policy(self.linewidth * LINE_RADIUS_PER_WIDTH);
        }
        params
    }

    fn set_parameters(&mut self, update: &RepresentationParameters) -> Rebuild {
        let mut rebuild = self.common.apply(update);

        let topology = replace(&mut self.line_only, update.line_only)
            | replace(&mut self.cylinder_only, update.cylinder_only)
            | replace(&mut self.multiple_bond, update.multiple_bond);
        if topology {
            rebuild = rebuild.merge(Rebuild::Full);
        }

        let radius = replace(&mut self.aspect_ratio, update.aspect_ratio)
            | replace(&mut self.bond_spacing, update.bond_spacing)
            | replace(&mut self.bond_scale, update.bond_scale);
        if radius {
            rebuild = rebuild.merge(if self.common.disable_impostor {
                Rebuild::Full
            } else {
                Rebuild::Update(DataFields::RADIUS)
            });
        }
        if replace(&mut self.linewidth, update.linewidth) && self.line_only {
            rebuild = rebuild.merge(Rebuild::Update(DataFields::RADIUS));
        }
        rebuild
    }
}
