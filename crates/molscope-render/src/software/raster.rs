//! Fragment generation for the software backend.
//!
//! Impostor buffers are ray-cast against their analytic solid, geometry
//! buffers rasterize the instanced base mesh, wireframes draw its edges.
//! Every path feeds [`Fragment`]s to a sink that does the depth test.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::backend::{DrawItem, FrameState, Viewport};
use crate::buffer::geometry::BaseMesh;
use crate::buffer::{Buffer, BufferKind, BufferMode};

/// One covered pixel of one primitive.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fragment {
    /// Index into a `width * height` surface.
    pub pixel: usize,
    /// NDC depth in [0, 1].
    pub depth: f32,
    pub world: Vec3,
    /// World normal facing the viewer.
    pub normal: Vec3,
    /// Selects the second color of a cylinder.
    pub second_half: bool,
    pub slot: usize,
    /// The fragment shows the inside of a clipped solid.
    pub back_face: bool,
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    t: f32,
    normal: Vec3,
    point: Vec3,
}

/// Pixel-space helpers bound to one frame.
pub(crate) struct Raster {
    width: u32,
    viewport: Viewport,
    view_projection: Mat4,
    inverse_view_projection: Mat4,
}

impl Raster {
    pub fn new(frame: &FrameState, width: u32) -> Self {
        let view_projection = frame.view_projection();
        Self {
            width,
            viewport: frame.viewport,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
        }
    }

    fn pixel_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn ndc_of_pixel(&self, x: u32, y: u32) -> Vec2 {
        let vp = self.viewport;
        Vec2::new(
            ((x - vp.x) as f32 + 0.5) / vp.width as f32 * 2.0 - 1.0,
            1.0 - ((y - vp.y) as f32 + 0.5) / vp.height as f32 * 2.0,
        )
    }

    /// Continuous pixel coordinates of an NDC point.
    fn screen_of_ndc(&self, ndc: Vec3) -> Vec2 {
        let vp = self.viewport;
        Vec2::new(
            vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.width as f32,
            vp.y as f32 + (1.0 - ndc.y) * 0.5 * vp.height as f32,
        )
    }

    fn ray(&self, x: u32, y: u32) -> (Vec3, Vec3) {
        let ndc = self.ndc_of_pixel(x, y);
        let near = self.inverse_view_projection.project_point3(ndc.extend(0.0));
        let far = self.inverse_view_projection.project_point3(ndc.extend(1.0));
        (near, far - near)
    }

    /// Pixel bounds of a world-space sphere, clamped to the viewport.
    fn sphere_rect(&self, center: Vec3, radius: f32) -> Option<(u32, u32, u32, u32)> {
        let vp = self.viewport;
        let full = (vp.x, vp.y, vp.x + vp.width, vp.y + vp.height);
        let mut lo = Vec2::splat(f32::INFINITY);
        let mut hi = Vec2::splat(f32::NEG_INFINITY);
        for i in 0..8u32 {
            let corner = center
                + Vec3::new(
                    if i & 1 == 0 { -radius } else { radius },
                    if i & 2 == 0 { -radius } else { radius },
                    if i & 4 == 0 { -radius } else { radius },
                );
            let clip = self.view_projection * corner.extend(1.0);
            if clip.w <= f32::EPSILON {
                // the box reaches behind the eye
                return Some(full);
            }
            let s = self.screen_of_ndc(clip.xyz() / clip.w);
            lo = lo.min(s);
            hi = hi.max(s);
        }
        let x0 = lo.x.floor().max(full.0 as f32) as u32;
        let y0 = lo.y.floor().max(full.1 as f32) as u32;
        let x1 = (hi.x.ceil().max(0.0) as u32).min(full.2);
        let y1 = (hi.y.ceil().max(0.0) as u32).min(full.3);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    /// NDC depth of a world point.
    fn depth_of(&self, world: Vec3) -> f32 {
        self.view_projection.project_point3(world).z
    }

    fn visible_depth(depth: f32) -> bool {
        (0.0..=1.0).contains(&depth)
    }
}

/// Emits the fragments of `item`.
pub(crate) fn rasterize(
    frame: &FrameState,
    width: u32,
    item: &DrawItem<'_>,
    wireframe: bool,
    mut sink: impl FnMut(Fragment),
) {
    let raster = Raster::new(frame, width);
    let buffer = item.mesh.buffer;
    let model = item.model_matrix();
    let model_normal = normal_matrix(model);
    if wireframe {
        let mesh = buffer.base_mesh();
        let edges = mesh.edge_indices();
        for (slot, primitive) in buffer.frames().iter().enumerate() {
            if item.includes(slot) {
                let full = model * primitive.transform;
                for edge in edges.chunks_exact(2) {
                    let a = full.transform_point3(mesh.positions[edge[0] as usize]);
                    let b = full.transform_point3(mesh.positions[edge[1] as usize]);
                    let second = mesh.positions[edge[0] as usize].y + mesh.positions[edge[1] as usize].y > 0.0;
                    line(&raster, a, b, |pixel, depth, world| {
                        sink(Fragment {
                            pixel,
                            depth,
                            world,
                            normal: Vec3::ZERO,
                            second_half: buffer.kind() == BufferKind::Cylinder && second,
                            slot,
                            back_face: false,
                        });
                    });
                }
            }
        }
        return;
    }
    match buffer.mode() {
        BufferMode::Impostor => {
            for slot in 0..buffer.count() {
                if item.includes(slot) {
                    ray_cast(&raster, buffer, slot, model, model_normal, frame, &mut sink);
                }
            }
        }
        BufferMode::Geometry { .. } => {
            let mesh = buffer.base_mesh();
            for slot in 0..buffer.count() {
                if item.includes(slot) {
                    triangles(&raster, buffer, &mesh, slot, model, model_normal, frame, &mut sink);
                }
            }
        }
    }
}

/// Rasterizes a world-space segment, calling `plot(pixel, depth, world)`.
pub(crate) fn line(raster: &Raster, a: Vec3, b: Vec3, mut plot: impl FnMut(usize, f32, Vec3)) {
    let (ca, cb) = (
        raster.view_projection * a.extend(1.0),
        raster.view_projection * b.extend(1.0),
    );
    if ca.w <= f32::EPSILON || cb.w <= f32::EPSILON {
        return;
    }
    let (na, nb) = (ca.xyz() / ca.w, cb.xyz() / cb.w);
    let (sa, sb) = (raster.screen_of_ndc(na), raster.screen_of_ndc(nb));
    let steps = (sb - sa).abs().max_element().ceil().max(1.0) as u32;
    let vp = raster.viewport;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let s = sa.lerp(sb, t);
        if s.x < vp.x as f32 || s.y < vp.y as f32 {
            continue;
        }
        let (x, y) = (s.x as u32, s.y as u32);
        if x >= vp.x + vp.width || y >= vp.y + vp.height {
            continue;
        }
        let depth = na.z + (nb.z - na.z) * t;
        if Raster::visible_depth(depth) {
            plot(raster.pixel_index(x, y), depth, a.lerp(b, t));
        }
    }
}

fn normal_matrix(m: Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(m);
    if linear.determinant().abs() > f32::EPSILON {
        linear.inverse().transpose()
    } else {
        Mat3::IDENTITY
    }
}

/// Radius of a sphere around the unit solid after `m`.
fn bounding_radius(kind: BufferKind, m: &Mat4) -> f32 {
    let (a, b, c) = (
        m.x_axis.truncate().length(),
        m.y_axis.truncate().length(),
        m.z_axis.truncate().length(),
    );
    match kind {
        BufferKind::Sphere | BufferKind::Ellipsoid => a.max(b).max(c),
        BufferKind::Cylinder => a.max(c).hypot(b * 0.5),
    }
}

fn ray_cast(
    raster: &Raster,
    buffer: &Buffer,
    slot: usize,
    model: Mat4,
    model_normal: Mat3,
    frame: &FrameState,
    sink: &mut impl FnMut(Fragment),
) {
    let primitive = buffer.frames()[slot];
    let full = model * primitive.transform;
    let center = full.w_axis.truncate();
    let Some((x0, y0, x1, y1)) = raster.sphere_rect(center, bounding_radius(buffer.kind(), &full)) else {
        return;
    };
    let to_local = full.inverse();
    let to_world_normal = model_normal * primitive.normal;
    let open_ended = buffer.params().open_ended;
    let dull = buffer.params().dull_interior;

    for y in y0..y1 {
        for x in x0..x1 {
            let (origin, direction) = raster.ray(x, y);
            let local_origin = to_local.transform_point3(origin);
            let local_direction = to_local.transform_vector3(direction);
            let hits = match buffer.kind() {
                BufferKind::Sphere | BufferKind::Ellipsoid => unit_sphere(local_origin, local_direction),
                BufferKind::Cylinder => unit_cylinder(local_origin, local_direction, open_ended),
            };
            let Some([enter, exit]) = hits else {
                continue;
            };
            // the entry point may lie in front of the near plane; show the inside then
            for (hit, back_face) in [(enter, false), (exit, true)] {
                if hit.t < 0.0 {
                    continue;
                }
                let world = origin + direction * hit.t;
                let depth = raster.depth_of(world);
                if !Raster::visible_depth(depth) {
                    continue;
                }
                let mut normal = (to_world_normal * hit.normal).normalize_or_zero();
                let to_eye = if frame.orthographic {
                    -direction
                } else {
                    frame.camera_position - world
                };
                if normal.dot(to_eye) < 0.0 {
                    normal = -normal;
                }
                sink(Fragment {
                    pixel: raster.pixel_index(x, y),
                    depth,
                    world,
                    normal,
                    second_half: buffer.kind() == BufferKind::Cylinder && hit.point.y > 0.0,
                    slot,
                    back_face: back_face && dull,
                });
                break;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn triangles(
    raster: &Raster,
    buffer: &Buffer,
    mesh: &BaseMesh,
    slot: usize,
    model: Mat4,
    model_normal: Mat3,
    frame: &FrameState,
    sink: &mut impl FnMut(Fragment),
) {
    let primitive = buffer.frames()[slot];
    let full = model * primitive.transform;
    let to_world_normal = model_normal * primitive.normal;
    let world: Vec<Vec3> = mesh.positions.iter().map(|p| full.transform_point3(*p)).collect();
    let clip: Vec<glam::Vec4> = world
        .iter()
        .map(|p| raster.view_projection * p.extend(1.0))
        .collect();
    let vp = raster.viewport;
    let dull = buffer.params().dull_interior;
    let view_back = frame.view.inverse().transform_vector3(Vec3::Z);

    for tri in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (c0, c1, c2) = (clip[i0], clip[i1], clip[i2]);
        if c0.w <= f32::EPSILON || c1.w <= f32::EPSILON || c2.w <= f32::EPSILON {
            continue;
        }
        let n = [c0.xyz() / c0.w, c1.xyz() / c1.w, c2.xyz() / c2.w];
        let s = [
            raster.screen_of_ndc(n[0]),
            raster.screen_of_ndc(n[1]),
            raster.screen_of_ndc(n[2]),
        ];
        let area = edge(s[0], s[1], s[2]);
        if area.abs() <= f32::EPSILON {
            continue;
        }
        let lo = s[0].min(s[1]).min(s[2]);
        let hi = s[0].max(s[1]).max(s[2]);
        let x0 = lo.x.floor().max(vp.x as f32) as u32;
        let y0 = lo.y.floor().max(vp.y as f32) as u32;
        let x1 = (hi.x.ceil().max(0.0) as u32).min(vp.x + vp.width);
        let y1 = (hi.y.ceil().max(0.0) as u32).min(vp.y + vp.height);
        let inv_w = [1.0 / c0.w, 1.0 / c1.w, 1.0 / c2.w];

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b = [
                    edge(s[1], s[2], p) / area,
                    edge(s[2], s[0], p) / area,
                    edge(s[0], s[1], p) / area,
                ];
                if b.iter().any(|w| *w < 0.0) {
                    continue;
                }
                let depth = b[0] * n[0].z + b[1] * n[1].z + b[2] * n[2].z;
                if !Raster::visible_depth(depth) {
                    continue;
                }
                // perspective-correct weights for world attributes
                let pw = [b[0] * inv_w[0], b[1] * inv_w[1], b[2] * inv_w[2]];
                let sum = pw[0] + pw[1] + pw[2];
                let pw = pw.map(|w| w / sum);
                let world_point = world[i0] * pw[0] + world[i1] * pw[1] + world[i2] * pw[2];
                let local_normal = mesh.normals[i0] * pw[0] + mesh.normals[i1] * pw[1] + mesh.normals[i2] * pw[2];
                let local_y = mesh.positions[i0].y * pw[0] + mesh.positions[i1].y * pw[1] + mesh.positions[i2].y * pw[2];
                let mut normal = (to_world_normal * local_normal).normalize_or_zero();
                let to_eye = if frame.orthographic {
                    view_back
                } else {
                    frame.camera_position - world_point
                };
                let back_face = normal.dot(to_eye) < 0.0;
                if back_face {
                    normal = -normal;
                }
                sink(Fragment {
                    pixel: raster.pixel_index(x, y),
                    depth,
                    world: world_point,
                    normal,
                    second_half: buffer.kind() == BufferKind::Cylinder && local_y > 0.0,
                    slot,
                    back_face: back_face && dull,
                });
            }
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn unit_sphere(o: Vec3, d: Vec3) -> Option<[Hit; 2]> {
    let a = d.dot(d);
    let b = 2.0 * o.dot(d);
    let c = o.dot(o) - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || a <= f32::EPSILON {
        return None;
    }
    let root = disc.sqrt();
    let hit = |t: f32| {
        let point = o + d * t;
        Hit {
            t,
            normal: point,
            point,
        }
    };
    Some([hit((-b - root) / (2.0 * a)), hit((-b + root) / (2.0 * a))])
}

fn unit_cylinder(o: Vec3, d: Vec3, open_ended: bool) -> Option<[Hit; 2]> {
    let mut hits: Vec<Hit> = Vec::with_capacity(4);
    let a = d.x * d.x + d.z * d.z;
    if a > f32::EPSILON {
        let b = 2.0 * (o.x * d.x + o.z * d.z);
        let c = o.x * o.x + o.z * o.z - 1.0;
        let disc = b * b - 4.0 * a * c;
        if disc >= 0.0 {
            let root = disc.sqrt();
            for t in [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)] {
                let point = o + d * t;
                if point.y.abs() <= 0.5 {
                    hits.push(Hit {
                        t,
                        normal: Vec3::new(point.x, 0.0, point.z),
                        point,
                    });
                }
            }
        }
    }
    if !open_ended && d.y.abs() > f32::EPSILON {
        for cap in [-0.5f32, 0.5] {
            let t = (cap - o.y) / d.y;
            let point = o + d * t;
            if point.x * point.x + point.z * point.z <= 1.0 {
                hits.push(Hit {
                    t,
                    normal: Vec3::new(0.0, cap.signum(), 0.0),
                    point,
                });
            }
        }
    }
    if hits.is_empty() {
        return None;
    }
    hits.sort_by(|a, b| a.t.total_cmp(&b.t));
    let first = hits[0];
    let last = hits[hits.len() - 1];
    Some([first, last])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_sphere_hits() {
        let [enter, exit] = unit_sphere(Vec3::new(0.0, 0.0, -5.0), Vec3::Z).unwrap();
        assert!((enter.t - 4.0).abs() < 1e-5);
        assert!((exit.t - 6.0).abs() < 1e-5);
        assert!(unit_sphere(Vec3::new(2.0, 0.0, -5.0), Vec3::Z).is_none());
    }

    #[test]
    fn test_unit_cylinder_side_and_caps() {
        let [enter, exit] = unit_cylinder(Vec3::new(-5.0, 0.2, 0.0), Vec3::X, false).unwrap();
        assert!((enter.t - 4.0).abs() < 1e-5);
        assert!((exit.t - 6.0).abs() < 1e-5);
        assert_eq!(enter.normal.y, 0.0);

        let [cap, _] = unit_cylinder(Vec3::new(0.0, -5.0, 0.0), Vec3::Y, false).unwrap();
        assert!((cap.t - 4.5).abs() < 1e-5);
        assert_eq!(cap.normal, Vec3::NEG_Y);
        assert!(unit_cylinder(Vec3::new(0.0, -5.0, 0.0), Vec3::Y, true).is_none());
    }
}
