//! Base solids instanced by geometry-mode buffers.
//!
//! Every solid is expressed in a unit local frame: spheres and ellipsoids use
//! the unit sphere, cylinders run along +Y from `y = -0.5` to `y = 0.5` with
//! radius 1.

use std::collections::BTreeSet;

use glam::Vec3;

/// Indexed triangle mesh with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Triangle list, counter-clockwise seen from outside.
    pub indices: Vec<u32>,
}

impl BaseMesh {
    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Unique edges as a line list.
    #[must_use]
    pub fn edge_indices(&self) -> Vec<u32> {
        let mut edges = BTreeSet::new();
        for tri in self.indices.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                edges.insert((a.min(b), a.max(b)));
            }
        }
        edges.into_iter().flat_map(|(a, b)| [a, b]).collect()
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        index
    }

    /// Pushes a triangle, flipping it if it faces towards `inside`.
    fn push_outward(&mut self, a: u32, b: u32, c: u32, inside: Vec3) {
        let (pa, pb, pc) = (
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        );
        let normal = (pb - pa).cross(pc - pa);
        let centroid = (pa + pb + pc) / 3.0;
        if normal.dot(centroid - inside) >= 0.0 {
            self.indices.extend([a, b, c]);
        } else {
            self.indices.extend([a, c, b]);
        }
    }
}

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn icosahedron_vertices() -> [Vec3; 12] {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
}

/// Unit icosphere; each icosahedron face is split into `(detail + 1)^2` triangles.
#[must_use]
pub fn icosphere(detail: u32) -> BaseMesh {
    let corners = icosahedron_vertices().map(Vec3::normalize);
    let cols = detail as usize + 1;
    let mut mesh = BaseMesh::default();

    for face in ICOSAHEDRON_FACES {
        let (a, b, c) = (corners[face[0]], corners[face[1]], corners[face[2]]);
        // rows[i][j]: i steps from the a-b edge towards c
        let mut rows: Vec<Vec<u32>> = Vec::with_capacity(cols + 1);
        for i in 0..=cols {
            let t = i as f32 / cols as f32;
            let left = a.lerp(c, t);
            let right = b.lerp(c, t);
            let span = cols - i;
            let row = (0..=span)
                .map(|j| {
                    let p = if span == 0 {
                        left
                    } else {
                        left.lerp(right, j as f32 / span as f32)
                    }
                    .normalize();
                    mesh.push_vertex(p, p)
                })
                .collect();
            rows.push(row);
        }
        for i in 0..cols {
            let span = cols - i;
            for j in 0..span {
                mesh.push_outward(rows[i][j], rows[i][j + 1], rows[i + 1][j], Vec3::ZERO);
                if j + 1 < span {
                    mesh.push_outward(rows[i][j + 1], rows[i + 1][j + 1], rows[i + 1][j], Vec3::ZERO);
                }
            }
        }
    }
    mesh
}

/// Unit cylinder along +Y with `radial_segments` sides.
#[must_use]
pub fn cylinder(radial_segments: u32, open_ended: bool) -> BaseMesh {
    let n = radial_segments.max(3);
    let mut mesh = BaseMesh::default();
    let ring = |k: u32| {
        let angle = k as f32 / n as f32 * std::f32::consts::TAU;
        Vec3::new(angle.cos(), 0.0, angle.sin())
    };

    let side_start = mesh.positions.len() as u32;
    for k in 0..n {
        let r = ring(k);
        mesh.push_vertex(r - Vec3::Y * 0.5, r);
        mesh.push_vertex(r + Vec3::Y * 0.5, r);
    }
    for k in 0..n {
        let next = (k + 1) % n;
        let (b0, t0) = (side_start + 2 * k, side_start + 2 * k + 1);
        let (b1, t1) = (side_start + 2 * next, side_start + 2 * next + 1);
        let axis_point = Vec3::ZERO;
        mesh.push_outward(b0, t0, b1, axis_point);
        mesh.push_outward(t0, t1, b1, axis_point);
    }

    if !open_ended {
        for (y, normal) in [(-0.5, Vec3::NEG_Y), (0.5, Vec3::Y)] {
            let center = mesh.push_vertex(Vec3::new(0.0, y, 0.0), normal);
            let first = mesh.positions.len() as u32;
            for k in 0..n {
                mesh.push_vertex(ring(k) + Vec3::new(0.0, y, 0.0), normal);
            }
            let inside = Vec3::new(0.0, -y, 0.0);
            for k in 0..n {
                mesh.push_outward(center, first + k, first + (k + 1) % n, inside);
            }
        }
    }
    mesh
}

/// Camera-facing quad used by impostor pipelines, as two triangles in [-1, 1]^2.
pub const IMPOSTOR_QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];
