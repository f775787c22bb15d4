//! Drawable primitive sets.
//!
//! A [`Buffer`] owns the attribute arrays of one primitive set plus the
//! per-primitive frames derived from them. The closed set of variants is
//! `{Sphere, Cylinder, Ellipsoid} x {Geometry, Impostor}`.

pub mod geometry;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};

use molscope_core::{
    AttributeArrays, AttributeUpdate, BoundingBox, Channel, MolscopeError, Picker, Result,
};

use crate::uniforms::UniformNeeds;
use geometry::BaseMesh;

/// Unique id of a buffer for the lifetime of the process.
pub type BufferId = u64;

/// Shared handle; the owning representation and the viewer's scene graph both hold one.
pub type BufferHandle = Rc<RefCell<Buffer>>;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Which primitive a buffer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Sphere,
    Cylinder,
    Ellipsoid,
}

impl BufferKind {
    /// Returns the kind name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BufferKind::Sphere => "sphere",
            BufferKind::Cylinder => "cylinder",
            BufferKind::Ellipsoid => "ellipsoid",
        }
    }
}

/// How primitives are turned into fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// An instanced base solid per primitive.
    Geometry {
        /// Icosphere subdivisions (spheres, ellipsoids).
        detail: u32,
        /// Sides of the base cylinder.
        radial_segments: u32,
    },
    /// A camera-facing quad ray-cast per fragment.
    Impostor,
}

impl BufferMode {
    #[must_use]
    pub fn is_impostor(self) -> bool {
        matches!(self, BufferMode::Impostor)
    }
}

/// The per-target views a buffer hands to the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshTarget {
    Model,
    Wireframe,
    Picking,
}

/// Construction parameters of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferParams {
    /// Model matrix applied before any instance matrix.
    pub matrix: Mat4,
    pub opacity: f32,
    /// Drawn in the background group; still counted in the bounding box.
    pub background: bool,
    pub disable_picking: bool,
    /// Drawn as base-solid edges instead of filled.
    pub wireframe: bool,
    /// Forces geometry mode.
    pub disable_impostor: bool,
    /// Scales the ellipsoid width.
    pub v_scale: f32,
    /// Darkens back faces seen through clipped geometry.
    pub dull_interior: bool,
    pub sphere_detail: u32,
    pub radial_segments: u32,
    pub open_ended: bool,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            opacity: 1.0,
            background: false,
            disable_picking: false,
            wireframe: false,
            disable_impostor: false,
            v_scale: 1.0,
            dull_interior: false,
            sphere_detail: 2,
            radial_segments: 10,
            open_ended: false,
        }
    }
}

/// Local-to-buffer frame of one primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveFrame {
    /// Maps the unit base solid onto the primitive.
    pub transform: Mat4,
    /// Inverse transpose of the linear part, for normals.
    pub normal: Mat3,
}

/// A target-specific view of a buffer.
#[derive(Debug, Clone, Copy)]
pub struct MeshView<'a> {
    pub target: MeshTarget,
    pub buffer: &'a Buffer,
    /// The buffer matrix, shared by all views.
    pub matrix: Mat4,
    pub needs: UniformNeeds,
}

/// One drawable primitive set.
#[derive(Debug)]
pub struct Buffer {
    id: BufferId,
    kind: BufferKind,
    mode: BufferMode,
    params: BufferParams,
    data: AttributeArrays,
    count: usize,
    frames: Vec<PrimitiveFrame>,
    version: u64,
    disposed: bool,
}

impl Buffer {
    /// Creates a buffer, checking that `data` carries every channel `kind` needs.
    pub fn new(kind: BufferKind, data: AttributeArrays, params: BufferParams) -> Result<Self> {
        let count = data.validate()?;
        let required: &[(Channel, bool)] = match kind {
            BufferKind::Sphere => &[],
            BufferKind::Cylinder => &[
                (Channel::Position2, data.position2.is_some()),
                (Channel::Color2, data.color2.is_some()),
            ],
            BufferKind::Ellipsoid => &[
                (Channel::MajorAxis, data.major_axis.is_some()),
                (Channel::MinorAxis, data.minor_axis.is_some()),
            ],
        };
        if let Some((channel, _)) = required.iter().find(|(_, present)| !present) {
            return Err(MolscopeError::MissingChannel {
                kind: kind.name(),
                channel: *channel,
            });
        }

        let mode = if params.disable_impostor {
            BufferMode::Geometry {
                detail: params.sphere_detail,
                radial_segments: params.radial_segments,
            }
        } else {
            BufferMode::Impostor
        };
        let id = NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed);
        let mut buffer = Self {
            id,
            kind,
            mode,
            params,
            data,
            count,
            frames: Vec::new(),
            version: 0,
            disposed: false,
        };
        buffer.frames = (0..count).map(|i| buffer.compute_frame(i)).collect();
        log::debug!(
            "created {} buffer {id} with {count} primitives ({:?})",
            kind.name(),
            mode
        );
        Ok(buffer)
    }

    /// Creates a buffer and wraps it in a shared handle.
    pub fn shared(kind: BufferKind, data: AttributeArrays, params: BufferParams) -> Result<BufferHandle> {
        Ok(Rc::new(RefCell::new(Self::new(kind, data, params)?)))
    }

    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    #[must_use]
    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    #[must_use]
    pub fn params(&self) -> &BufferParams {
        &self.params
    }

    #[must_use]
    pub fn data(&self) -> &AttributeArrays {
        &self.data
    }

    /// Number of primitives.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Bumped on every change that affects rendering.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Returns true if the buffer takes part in the picking pass.
    #[must_use]
    pub fn pickable(&self) -> bool {
        !self.disposed && !self.params.disable_picking && self.data.picking.is_some()
    }

    /// The slot-to-row mapping, if any.
    #[must_use]
    pub fn picker(&self) -> Option<&Arc<Picker>> {
        self.data.picking.as_ref()
    }

    /// The buffer matrix.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        self.params.matrix
    }

    /// Replaces the buffer matrix.
    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.params.matrix = matrix;
        self.version += 1;
    }

    /// Sets the opacity.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.params.opacity = opacity.clamp(0.0, 1.0);
        self.version += 1;
    }

    /// Per-primitive frames, one per slot.
    #[must_use]
    pub fn frames(&self) -> &[PrimitiveFrame] {
        &self.frames
    }

    /// Colors of the two halves of primitive `slot`; equal for non-cylinders.
    #[must_use]
    pub fn colors(&self, slot: usize) -> (Vec3, Vec3) {
        let c1 = self.data.color.get(slot).copied().unwrap_or(Vec3::ONE);
        let c2 = self
            .data
            .color2
            .as_ref()
            .and_then(|c| c.get(slot).copied())
            .unwrap_or(c1);
        (c1, c2)
    }

    /// Replaces the supplied channels in place.
    ///
    /// The primitive count never changes; a channel of the wrong length is
    /// rejected and the buffer keeps its previous data. Primitive transforms
    /// and normal matrices follow any geometry change.
    pub fn set_attributes(&mut self, update: AttributeUpdate) -> Result<()> {
        if self.disposed {
            log::error!("set_attributes on disposed buffer {}", self.id);
            return Err(MolscopeError::BufferDisposed(self.id));
        }
        if update.is_empty() {
            return Ok(());
        }
        let moves_geometry = update.touches_geometry();
        let changed = self.data.apply(update).map_err(|err| {
            log::error!("buffer {}: {err}", self.id);
            err
        })?;
        if moves_geometry {
            for i in 0..self.count {
                self.frames[i] = self.compute_frame(i);
            }
        }
        self.version += 1;
        log::debug!("buffer {} updated {changed:?}", self.id);
        Ok(())
    }

    /// The view of this buffer for `target`.
    ///
    /// `Picking` is only available for pickable buffers.
    #[must_use]
    pub fn mesh(&self, target: MeshTarget) -> Option<MeshView<'_>> {
        if self.disposed || (target == MeshTarget::Picking && !self.pickable()) {
            return None;
        }
        Some(MeshView {
            target,
            buffer: self,
            matrix: self.params.matrix,
            needs: UniformNeeds::for_mesh(self.mode, target),
        })
    }

    /// The base solid instanced in geometry mode.
    #[must_use]
    pub fn base_mesh(&self) -> BaseMesh {
        let (detail, radial_segments) = match self.mode {
            BufferMode::Geometry {
                detail,
                radial_segments,
            } => (detail, radial_segments),
            BufferMode::Impostor => (self.params.sphere_detail, self.params.radial_segments),
        };
        match self.kind {
            BufferKind::Sphere | BufferKind::Ellipsoid => geometry::icosphere(detail),
            BufferKind::Cylinder => geometry::cylinder(radial_segments, self.params.open_ended),
        }
    }

    /// Exact bounds of all primitives before the buffer matrix.
    ///
    /// Cylinders contribute the box of their two rim circles, which along
    /// axis `i` reaches `r * sqrt(1 - d_i^2)` past each endpoint for unit
    /// direction `d`. That is never larger than the endpoints padded by `r`.
    #[must_use]
    pub fn geometry_bounds(&self) -> BoundingBox {
        let mut bb = BoundingBox::EMPTY;
        for frame in &self.frames {
            let center = frame.transform.w_axis.truncate();
            let linear = Mat3::from_mat4(frame.transform);
            let half = match self.kind {
                // exact for a unit sphere under a linear map: row norms
                BufferKind::Sphere | BufferKind::Ellipsoid => row_norms(linear),
                // rim circles of both caps
                BufferKind::Cylinder => {
                    let axis = linear.y_axis * 0.5;
                    let rim = rim_extent(linear);
                    bb.expand_by_point(center + axis + rim);
                    bb.expand_by_point(center + axis - rim);
                    bb.expand_by_point(center - axis + rim);
                    bb.expand_by_point(center - axis - rim);
                    continue;
                }
            };
            bb.expand_by_point(center + half);
            bb.expand_by_point(center - half);
        }
        bb
    }

    /// Drops the attribute data. The buffer must be removed from every viewer first.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.data = AttributeArrays::default();
        self.frames.clear();
        self.count = 0;
        self.disposed = true;
        self.version += 1;
        log::debug!("disposed buffer {}", self.id);
    }

    fn compute_frame(&self, i: usize) -> PrimitiveFrame {
        let position = self.data.position[i];
        let radius = self.data.radius[i];
        let transform = match self.kind {
            BufferKind::Sphere => {
                Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(radius))
            }
            BufferKind::Cylinder => {
                let end = self
                    .data
                    .position2
                    .as_ref()
                    .map_or(position, |p| p[i]);
                cylinder_transform(position, end, radius)
            }
            BufferKind::Ellipsoid => {
                let major = self.data.major_axis.as_ref().map_or(Vec3::Z, |a| a[i]);
                let minor = self.data.minor_axis.as_ref().map_or(Vec3::Y, |a| a[i]);
                ellipsoid_transform(position, radius * self.params.v_scale, major, minor)
            }
        };
        let linear = Mat3::from_mat4(transform);
        let normal = if linear.determinant().abs() > f32::EPSILON {
            linear.inverse().transpose()
        } else {
            Mat3::IDENTITY
        };
        PrimitiveFrame { transform, normal }
    }
}

/// Maps the unit cylinder onto the segment `a -> b`; local `-Y` is the `a` end.
#[must_use]
pub fn cylinder_transform(a: Vec3, b: Vec3, radius: f32) -> Mat4 {
    let axis = b - a;
    let length = axis.length();
    let direction = if length > f32::EPSILON {
        axis / length
    } else {
        Vec3::Y
    };
    let rotation = glam::Quat::from_rotation_arc(Vec3::Y, direction);
    Mat4::from_scale_rotation_translation(
        Vec3::new(radius, length, radius),
        rotation,
        (a + b) * 0.5,
    )
}

/// Orients the unit sphere: local Z points away from `major`, local Y follows
/// `minor`, then scales by `(width, |minor|, |major|)`.
#[must_use]
pub fn ellipsoid_transform(center: Vec3, width: f32, major: Vec3, minor: Vec3) -> Mat4 {
    let major_len = major.length();
    let minor_len = minor.length();
    let z = if major_len > f32::EPSILON {
        -major / major_len
    } else {
        Vec3::Z
    };
    let mut x = minor.cross(z);
    if x.length_squared() <= f32::EPSILON {
        x = z.any_orthonormal_vector();
    }
    let x = x.normalize();
    let y = z.cross(x);
    let rotation = Mat4::from_cols(
        x.extend(0.0),
        y.extend(0.0),
        z.extend(0.0),
        center.extend(1.0),
    );
    rotation * Mat4::from_scale(Vec3::new(width, minor_len, major_len))
}

fn row_norms(m: Mat3) -> Vec3 {
    let t = m.transpose();
    Vec3::new(t.x_axis.length(), t.y_axis.length(), t.z_axis.length())
}

/// Half extents of the unit circle in the local XZ plane.
fn rim_extent(m: Mat3) -> Vec3 {
    let (u, v) = (m.x_axis, m.z_axis);
    Vec3::new(
        u.x.hypot(v.x),
        u.y.hypot(v.y),
        u.z.hypot(v.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use molscope_core::PickerKind;

    fn spheres(n: usize) -> AttributeArrays {
        AttributeArrays::spheres(
            (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect(),
            vec![Vec3::ONE; n],
            vec![1.0; n],
        )
    }

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{a:?} != {b:?}");
    }

    #[test]
    fn test_new_rejects_mismatch() {
        let mut data = spheres(3);
        data.color.pop();
        let err = Buffer::new(BufferKind::Sphere, data, BufferParams::default()).unwrap_err();
        assert!(matches!(
            err,
            MolscopeError::SizeMismatch {
                channel: Channel::Color,
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_cylinder_requires_second_endpoint() {
        let err = Buffer::new(BufferKind::Cylinder, spheres(1), BufferParams::default()).unwrap_err();
        assert!(matches!(
            err,
            MolscopeError::MissingChannel {
                channel: Channel::Position2,
                ..
            }
        ));
    }

    #[test]
    fn test_sphere_bounds() {
        let buffer = Buffer::new(BufferKind::Sphere, spheres(2), BufferParams::default()).unwrap();
        let bb = buffer.geometry_bounds();
        assert_vec_close(bb.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_vec_close(bb.max, Vec3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn test_cylinder_bounds_along_axis() {
        let data = AttributeArrays::cylinders(
            vec![Vec3::ZERO],
            vec![Vec3::new(4.0, 0.0, 0.0)],
            vec![Vec3::X],
            vec![Vec3::Y],
            vec![0.5],
        );
        let buffer = Buffer::new(BufferKind::Cylinder, data, BufferParams::default()).unwrap();
        let bb = buffer.geometry_bounds();
        assert_vec_close(bb.min, Vec3::new(0.0, -0.5, -0.5));
        assert_vec_close(bb.max, Vec3::new(4.0, 0.5, 0.5));
        assert_eq!(buffer.colors(0), (Vec3::X, Vec3::Y));
    }

    #[test]
    fn test_diagonal_cylinder_bounds_hug_rims() {
        let data = AttributeArrays::cylinders(
            vec![Vec3::ZERO],
            vec![Vec3::new(2.0, 2.0, 0.0)],
            vec![Vec3::ONE],
            vec![Vec3::ONE],
            vec![0.5],
        );
        let buffer = Buffer::new(BufferKind::Cylinder, data, BufferParams::default()).unwrap();
        let bb = buffer.geometry_bounds();
        let pad = 0.5 * std::f32::consts::FRAC_1_SQRT_2;
        assert_vec_close(bb.min, Vec3::new(-pad, -pad, -0.5));
        assert_vec_close(bb.max, Vec3::new(2.0 + pad, 2.0 + pad, 0.5));
    }

    #[test]
    fn test_cylinder_transform_endpoints() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-2.0, 0.0, 5.0);
        let m = cylinder_transform(a, b, 0.3);
        assert_vec_close(m.transform_point3(Vec3::new(0.0, -0.5, 0.0)), a);
        assert_vec_close(m.transform_point3(Vec3::new(0.0, 0.5, 0.0)), b);
    }

    #[test]
    fn test_ellipsoid_transform_axes() {
        let major = Vec3::new(0.0, 0.0, 2.0);
        let minor = Vec3::new(0.0, 0.1, 0.0);
        let m = ellipsoid_transform(Vec3::ONE, 0.5, major, minor);
        // local -Z reaches the tip of the major axis
        assert_vec_close(m.transform_point3(Vec3::NEG_Z), Vec3::ONE + major);
        assert_vec_close(m.transform_point3(Vec3::Y), Vec3::ONE + minor);
        assert!((m.transform_vector3(Vec3::X).length() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_set_attributes_partial() {
        let handle = Buffer::shared(BufferKind::Sphere, spheres(2), BufferParams::default()).unwrap();
        let mut buffer = handle.borrow_mut();
        let bounds = buffer.geometry_bounds();
        buffer
            .set_attributes(AttributeUpdate::new().color(vec![Vec3::X; 2]))
            .unwrap();
        assert_eq!(buffer.version(), 1);
        assert_eq!(buffer.geometry_bounds(), bounds);
        assert_eq!(buffer.count(), 2);
    }

    #[test]
    fn test_set_attributes_rejects_and_keeps_data() {
        let mut buffer = Buffer::new(BufferKind::Sphere, spheres(2), BufferParams::default()).unwrap();
        let before = buffer.data().clone();
        assert!(buffer
            .set_attributes(AttributeUpdate::new().radius(vec![1.0; 3]))
            .is_err());
        assert_eq!(buffer.data(), &before);
        assert_eq!(buffer.version(), 0);
    }

    #[test]
    fn test_position_update_moves_frames() {
        let mut buffer = Buffer::new(BufferKind::Sphere, spheres(1), BufferParams::default()).unwrap();
        let normal = buffer.frames()[0].normal;
        buffer
            .set_attributes(AttributeUpdate::new().position(vec![Vec3::splat(3.0)]))
            .unwrap();
        assert_vec_close(buffer.frames()[0].transform.w_axis.truncate(), Vec3::splat(3.0));
        assert_eq!(buffer.frames()[0].normal, normal);
    }

    #[test]
    fn test_cylinder_update_turns_normals() {
        let bond = |end: Vec3| {
            AttributeArrays::cylinders(vec![Vec3::ZERO], vec![end], vec![Vec3::ONE], vec![Vec3::ONE], vec![0.2])
        };
        let along_x = bond(Vec3::new(2.0, 0.0, 0.0));
        let along_y = bond(Vec3::new(0.0, 2.0, 0.0));
        let mut buffer = Buffer::new(BufferKind::Cylinder, along_x, BufferParams::default()).unwrap();
        buffer
            .set_attributes(AttributeUpdate::new().position2(vec![Vec3::new(0.0, 2.0, 0.0)]))
            .unwrap();
        let rebuilt = Buffer::new(BufferKind::Cylinder, along_y, BufferParams::default()).unwrap();
        assert_eq!(buffer.frames()[0].transform, rebuilt.frames()[0].transform);
        assert_eq!(buffer.frames()[0].normal, rebuilt.frames()[0].normal);
    }

    #[test]
    fn test_picking_mesh_requires_picker() {
        let plain = Buffer::new(BufferKind::Sphere, spheres(1), BufferParams::default()).unwrap();
        assert!(plain.mesh(MeshTarget::Picking).is_none());
        assert!(plain.mesh(MeshTarget::Model).is_some());

        let picked = spheres(1).with_picker(Picker::new(PickerKind::Atom, vec![0], 1));
        let buffer = Buffer::new(BufferKind::Sphere, picked, BufferParams::default()).unwrap();
        assert!(buffer.mesh(MeshTarget::Picking).is_some());
    }

    #[test]
    fn test_dispose() {
        let mut buffer = Buffer::new(BufferKind::Sphere, spheres(2), BufferParams::default()).unwrap();
        buffer.dispose();
        assert!(buffer.is_disposed());
        assert!(buffer.geometry_bounds().is_empty());
        assert!(buffer.mesh(MeshTarget::Model).is_none());
        assert!(matches!(
            buffer.set_attributes(AttributeUpdate::new().color(vec![])),
            Err(MolscopeError::BufferDisposed(_))
        ));
    }

    #[test]
    fn test_disable_impostor_selects_geometry() {
        let params = BufferParams {
            disable_impostor: true,
            ..BufferParams::default()
        };
        let buffer = Buffer::new(BufferKind::Sphere, spheres(1), params).unwrap();
        assert_eq!(
            buffer.mode(),
            BufferMode::Geometry {
                detail: 2,
                radial_segments: 10
            }
        );
        assert_eq!(buffer.base_mesh().triangle_count(), 180);
    }
}
