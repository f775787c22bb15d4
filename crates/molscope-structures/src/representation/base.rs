//! Nucleotide bases as flat ellipsoids along the sugar to base rung.

use std::sync::Arc;

use glam::Vec3;
use molscope_core::{
    AtomParams, AttributeArrays, AttributeUpdate, BondParams, DataFields, OwnerId, Picker,
    PickerKind, Result, StructureView,
};
use molscope_render::{Buffer, BufferKind, BufferParams};

use super::{
    replace, size_policy, CommonSettings, Rebuild, Representation, RepresentationData,
    RepresentationParameters,
};

/// Minor axis length relative to the rung half length.
const WIDTH_SCALE: f32 = 0.05;

/// One ellipsoid per nucleotide rung.
///
/// The ellipsoid is centered on the rung midpoint with the rung half length as
/// radius. Its minor axis lies across the base plane, taken from a bond of the
/// base nitrogen.
#[derive(Debug, Clone)]
pub struct BaseRepresentation {
    common: CommonSettings,
    aspect_ratio: f32,
    v_scale: f32,
}

/// Ellipsoid channels computed from rung bonds.
#[derive(Debug, Default, PartialEq)]
struct EllipsoidGeometry {
    position: Vec<Vec3>,
    radius: Vec<f32>,
    major_axis: Vec<Vec3>,
    minor_axis: Vec<Vec3>,
}

impl BaseRepresentation {
    pub fn new(owner: OwnerId, params: &RepresentationParameters) -> Self {
        let mut repr = Self {
            common: CommonSettings::new(owner, size_policy(0.3)),
            aspect_ratio: 1.0,
            v_scale: 1.0,
        };
        repr.set_parameters(params);
        repr
    }

    fn buffer_params(&self) -> BufferParams {
        BufferParams {
            v_scale: self.v_scale * self.aspect_ratio,
            ..self.common.buffer_params()
        }
    }

    fn geometry(view: &dyn StructureView, rungs: &AttributeArrays) -> EllipsoidGeometry {
        let mut out = EllipsoidGeometry::default();
        let ends = rungs.position2.as_deref().unwrap_or_default();
        let rows = rungs.picking.as_ref().map(|p| p.array.as_slice());
        for (i, (&p1, &p2)) in rungs.position.iter().zip(ends).enumerate() {
            let mid = (p1 + p2) * 0.5;
            let r = (p1 - mid).length();
            let major = p2 - mid;
            let across = rows
                .and_then(|rows| rows.get(i))
                .and_then(|&row| base_plane_direction(view, row))
                .map(|dir| major.cross(dir))
                .filter(|v| v.length_squared() > f32::EPSILON)
                .unwrap_or_else(|| fallback_perpendicular(major));
            out.position.push(mid);
            out.radius.push(r);
            out.major_axis.push(major);
            out.minor_axis.push(across.normalize_or_zero() * r * WIDTH_SCALE);
        }
        out
    }
}

/// Direction of a bond leaving the base nitrogen of rung `row`.
fn base_plane_direction(view: &dyn StructureView, row: u32) -> Option<Vec3> {
    let [sugar, nitrogen] = view.bond_atoms(row)?;
    let origin = view.atom(nitrogen)?.position;
    view.bonded_neighbors(nitrogen)
        .into_iter()
        .filter(|&n| n != sugar)
        .find_map(|n| view.atom(n))
        .map(|atom| atom.position - origin)
}

/// Any vector perpendicular to `v`.
fn fallback_perpendicular(v: Vec3) -> Vec3 {
    if v.z != 0.0 {
        Vec3::new(1.0, 1.0, -(v.x + v.y) / v.z)
    } else if v.y != 0.0 {
        Vec3::new(1.0, -(v.x + v.z) / v.y, 1.0)
    } else if v.x != 0.0 {
        Vec3::new(-(v.y + v.z) / v.x, 1.0, 1.0)
    } else {
        Vec3::Y
    }
}

impl Representation for BaseRepresentation {
    fn kind(&self) -> &'static str {
        "base"
    }

    fn create_data(&self, view: &dyn StructureView) -> Result<RepresentationData> {
        let rungs = view.rung_bond_data(&self.bond_params(DataFields::ALL))?;
        let geometry = Self::geometry(view, &rungs);
        let picker = rungs
            .picking
            .as_ref()
            .map(|p| Picker::new(PickerKind::Ellipsoid, p.array.clone(), p.owner));
        let mut data = AttributeArrays::ellipsoids(
            geometry.position,
            rungs.color,
            geometry.radius,
            geometry.major_axis,
            geometry.minor_axis,
        );
        if let Some(picker) = picker {
            data.picking = Some(Arc::new(picker));
        }
        log::debug!("base of '{}': {} ellipsoids", view.name(), data.len());
        let ellipsoids = Buffer::shared(BufferKind::Ellipsoid, data, self.buffer_params())?;
        Ok(RepresentationData {
            buffers: vec![ellipsoids],
        })
    }

    fn update_data(
        &self,
        what: DataFields,
        view: &dyn StructureView,
        data: &RepresentationData,
    ) -> Result<()> {
        let Some(ellipsoids) = data.buffers.first() else {
            return Ok(());
        };
        let mut rung_what = what;
        // geometry comes from both rung ends and the picking rows
        if what.position {
            rung_what.picking = true;
        }
        let rungs = view.rung_bond_data(&self.bond_params(rung_what))?;
        let mut update = AttributeUpdate::new();
        if what.position {
            let geometry = Self::geometry(view, &rungs);
            update = update
                .position(geometry.position)
                .radius(geometry.radius)
                .axes(geometry.major_axis, geometry.minor_axis);
        }
        if what.color {
            update = update.color(rungs.color);
        }
        ellipsoids.borrow_mut().set_attributes(update)
    }

    fn atom_params(&self, what: DataFields) -> AtomParams {
        self.common.atom_params(what)
    }

    fn bond_params(&self, what: DataFields) -> BondParams {
        self.common.bond_params(what)
    }

    fn set_parameters(&mut self, update: &RepresentationParameters) -> Rebuild {
        let mut rebuild = self.common.apply(update);
        // the rung radius does not depend on the radius policy
        if let Rebuild::Update(mut fields) = rebuild {
            fields.radius = false;
            rebuild = if fields.is_empty() {
                Rebuild::Nothing
            } else {
                Rebuild::Update(fields)
            };
        }
        if replace(&mut self.aspect_ratio, update.aspect_ratio)
            | replace(&mut self.v_scale, update.v_scale)
        {
            rebuild = rebuild.merge(Rebuild::Full);
        }
        rebuild
    }
}
