//! Representations turn a structure view into buffers.
//!
//! A [`Representation`] computes attribute arrays under its color and radius
//! policy, builds the buffers for them and later updates those buffers in place
//! when only positions, colors or radii change. Anything that changes topology
//! (selection, multiple bond mode, impostor toggle) asks for a full rebuild.

mod ball_stick;
mod base;
mod binding;
mod registry;
mod spacefill;

pub use ball_stick::BallStickRepresentation;
pub use base::BaseRepresentation;
pub use binding::StructureRepresentation;
pub use registry::{RepresentationFactory, RepresentationRegistry};
pub use spacefill::SpacefillRepresentation;

use molscope_core::{
    AtomParams, AttributeArrays, AttributeUpdate, BondParams, ColorScheme, DataFields,
    MultipleBond, OwnerId, RadiusPolicy, RadiusType, Result, StructureView,
};
use molscope_render::{BufferHandle, BufferParams};

/// The buffers one representation built for one structure view.
#[derive(Debug, Default, Clone)]
pub struct RepresentationData {
    pub buffers: Vec<BufferHandle>,
}

/// What a parameter change requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebuild {
    /// Nothing visible changed.
    Nothing,
    /// Recompute these fields and update the buffers in place.
    Update(DataFields),
    /// Dispose the buffers and build new ones.
    Full,
}

impl Rebuild {
    /// Combines two requirements; a full rebuild wins.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Rebuild::Full, _) | (_, Rebuild::Full) => Rebuild::Full,
            (Rebuild::Update(a), Rebuild::Update(b)) => Rebuild::Update(a.union(b)),
            (Rebuild::Update(a), Rebuild::Nothing) | (Rebuild::Nothing, Rebuild::Update(a)) => {
                Rebuild::Update(a)
            }
            (Rebuild::Nothing, Rebuild::Nothing) => Rebuild::Nothing,
        }
    }
}

/// A partial set of representation parameters.
///
/// Used both at construction and for [`Representation::set_parameters`]; fields a
/// representation does not know are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepresentationParameters {
    pub color: Option<ColorScheme>,
    pub radius_type: Option<RadiusType>,
    pub radius_scale: Option<f32>,
    pub opacity: Option<f32>,
    pub disable_impostor: Option<bool>,
    pub sphere_detail: Option<u32>,
    pub radial_segments: Option<u32>,
    pub open_ended: Option<bool>,
    /// Atom radius over bond radius (ball+stick), ellipsoid width factor (base).
    pub aspect_ratio: Option<f32>,
    pub multiple_bond: Option<MultipleBond>,
    pub bond_spacing: Option<f32>,
    pub bond_scale: Option<f32>,
    pub line_only: Option<bool>,
    pub cylinder_only: Option<bool>,
    pub linewidth: Option<f32>,
    pub v_scale: Option<f32>,
}

/// Settings every representation shares.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommonSettings {
    pub owner: OwnerId,
    pub color: ColorScheme,
    pub radius: RadiusPolicy,
    pub opacity: f32,
    pub disable_impostor: bool,
    pub sphere_detail: u32,
    pub radial_segments: u32,
    pub open_ended: bool,
}

impl CommonSettings {
    pub fn new(owner: OwnerId, radius: RadiusPolicy) -> Self {
        let defaults = BufferParams::default();
        Self {
            owner,
            color: ColorScheme::Element,
            radius,
            opacity: defaults.opacity,
            disable_impostor: defaults.disable_impostor,
            sphere_detail: defaults.sphere_detail,
            radial_segments: defaults.radial_segments,
            open_ended: defaults.open_ended,
        }
    }

    /// Applies the shared fields of `update`.
    pub fn apply(&mut self, update: &RepresentationParameters) -> Rebuild {
        let mut rebuild = Rebuild::Nothing;
        if let Some(color) = update.color.filter(|c| *c != self.color) {
            self.color = color;
            rebuild = rebuild.merge(Rebuild::Update(DataFields::COLOR));
        }
        if let Some(kind) = update.radius_type.filter(|k| *k != self.radius.kind) {
            self.radius.kind = kind;
            rebuild = rebuild.merge(Rebuild::Update(DataFields::RADIUS));
        }
        if let Some(scale) = update.radius_scale.filter(|s| *s != self.radius.scale) {
            self.radius.scale = scale;
            rebuild = rebuild.merge(Rebuild::Update(DataFields::RADIUS));
        }
        let mut full = |changed: bool| {
            if changed {
                rebuild = rebuild.merge(Rebuild::Full);
            }
        };
        full(replace(&mut self.opacity, update.opacity));
        full(replace(&mut self.disable_impostor, update.disable_impostor));
        full(replace(&mut self.sphere_detail, update.sphere_detail));
        full(replace(&mut self.radial_segments, update.radial_segments));
        full(replace(&mut self.open_ended, update.open_ended));
        rebuild
    }

    pub fn atom_params(&self, what: DataFields) -> AtomParams {
        AtomParams {
            what,
            color: self.color,
            radius: self.radius,
            owner: self.owner,
        }
    }

    pub fn bond_params(&self, what: DataFields) -> BondParams {
        BondParams {
            what,
            color: self.color,
            radius: self.radius,
            multiple_bond: MultipleBond::Off,
            bond_spacing: 1.0,
            bond_scale: 1.0,
            owner: self.owner,
        }
    }

    pub fn buffer_params(&self) -> BufferParams {
        BufferParams {
            opacity: self.opacity,
            disable_impostor: self.disable_impostor,
            sphere_detail: self.sphere_detail,
            radial_segments: self.radial_segments,
            open_ended: self.open_ended,
            dull_interior: true,
            ..BufferParams::default()
        }
    }
}

/// Sets `slot` to `value` when given and different. Returns true if it changed.
pub(crate) fn replace<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(v) if v != *slot => {
            *slot = v;
            true
        }
        _ => false,
    }
}

/// Computes attribute arrays for a structure view and owns the buffers built from them.
pub trait Representation {
    /// Registry name, e.g. `"spacefill"`.
    fn kind(&self) -> &'static str;

    /// Builds fresh buffers for `view`.
    fn create_data(&self, view: &dyn StructureView) -> Result<RepresentationData>;

    /// Recomputes the `what` fields and writes them into the existing buffers.
    ///
    /// Only valid while the topology `data` was built for is unchanged.
    fn update_data(
        &self,
        what: DataFields,
        view: &dyn StructureView,
        data: &RepresentationData,
    ) -> Result<()>;

    /// Parameters for [`StructureView::atom_data`].
    fn atom_params(&self, what: DataFields) -> AtomParams;

    /// Parameters for [`StructureView::bond_data`].
    fn bond_params(&self, what: DataFields) -> BondParams;

    /// Applies a parameter change and reports how the buffers must follow.
    fn set_parameters(&mut self, update: &RepresentationParameters) -> Rebuild;
}

/// The channels of `data` selected by `what`, for sphere-like buffers.
pub(crate) fn sphere_update(what: DataFields, data: AttributeArrays) -> AttributeUpdate {
    AttributeUpdate {
        position: what.position.then_some(data.position),
        color: what.color.then_some(data.color),
        radius: what.radius.then_some(data.radius),
        ..AttributeUpdate::default()
    }
}

/// The channels of `data` selected by `what`, for cylinder buffers.
pub(crate) fn cylinder_update(what: DataFields, data: AttributeArrays) -> AttributeUpdate {
    AttributeUpdate {
        position: what.position.then_some(data.position),
        position2: data.position2.filter(|_| what.position),
        color: what.color.then_some(data.color),
        color2: data.color2.filter(|_| what.color),
        radius: what.radius.then_some(data.radius),
        ..AttributeUpdate::default()
    }
}

/// Sizes used when a representation falls back to a fixed radius.
pub(crate) fn size_policy(size: f32) -> RadiusPolicy {
    RadiusPolicy {
        kind: RadiusType::Size(size),
        scale: 1.0,
    }
}
