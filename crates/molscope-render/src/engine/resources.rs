//! GPU buffer helpers and per-buffer mirrors of primitive data.

use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::buffer::{Buffer, BufferKind};

/// Creates a uniform buffer from data.
pub(super) fn create_uniform_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    data: &T,
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::bytes_of(data),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Creates a storage buffer from data. Empty slices get one zeroed element
/// since wgpu rejects zero-sized bindings.
pub(super) fn create_storage_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    data: &[T],
    label: Option<&str>,
) -> wgpu::Buffer {
    let zero = [T::zeroed()];
    let data = if data.is_empty() { &zero[..] } else { data };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
    })
}

/// One primitive as the impostor and mesh shaders read it.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(super) struct GpuPrimitive {
    pub transform: [[f32; 4]; 4],
    /// Zero for degenerate primitives, which then never hit.
    pub inverse: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    pub color: [f32; 4],
    pub color2: [f32; 4],
}

/// A base mesh vertex, expanded out of the index list.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(super) struct GpuMeshVertex {
    pub position: [f32; 4],
    pub normal: [f32; 4],
}

/// Shader code for a buffer kind; matches the `KIND_` constants.
pub(super) fn kind_code(kind: BufferKind) -> u32 {
    match kind {
        BufferKind::Sphere => 0,
        BufferKind::Cylinder => 1,
        BufferKind::Ellipsoid => 2,
    }
}

/// Packs every primitive of `buffer`.
pub(super) fn pack_primitives(buffer: &Buffer) -> Vec<GpuPrimitive> {
    buffer
        .frames()
        .iter()
        .enumerate()
        .map(|(slot, frame)| {
            let det = frame.transform.determinant();
            let inverse = if det.is_finite() && det.abs() > f32::MIN_POSITIVE {
                frame.transform.inverse()
            } else {
                Mat4::ZERO
            };
            let (c1, c2) = buffer.colors(slot);
            GpuPrimitive {
                transform: frame.transform.to_cols_array_2d(),
                inverse: inverse.to_cols_array_2d(),
                normal: [
                    frame.normal.x_axis.extend(0.0).to_array(),
                    frame.normal.y_axis.extend(0.0).to_array(),
                    frame.normal.z_axis.extend(0.0).to_array(),
                ],
                color: c1.extend(1.0).to_array(),
                color2: c2.extend(1.0).to_array(),
            }
        })
        .collect()
}

/// Device copies of one [`Buffer`], rebuilt whenever its version moves.
#[derive(Debug)]
pub(super) struct BufferMirror {
    version: u64,
    pub primitives: wgpu::Buffer,
    pub triangles: wgpu::Buffer,
    pub triangle_vertices: u32,
    pub edges: wgpu::Buffer,
    pub edge_vertices: u32,
}

impl BufferMirror {
    pub fn upload(device: &wgpu::Device, buffer: &Buffer) -> Self {
        let mesh = buffer.base_mesh();
        let vertex = |i: u32, with_normal: bool| {
            let i = i as usize;
            GpuMeshVertex {
                position: mesh.positions[i].extend(1.0).to_array(),
                normal: if with_normal {
                    mesh.normals[i].extend(0.0).to_array()
                } else {
                    [0.0; 4]
                },
            }
        };
        let triangles: Vec<GpuMeshVertex> = mesh.indices.iter().map(|&i| vertex(i, true)).collect();
        let edges: Vec<GpuMeshVertex> = mesh
            .edge_indices()
            .into_iter()
            .map(|i| vertex(i, false))
            .collect();
        let label = format!("buffer {}", buffer.id());
        log::debug!(
            "uploading {label}: {} primitives, {} mesh vertices",
            buffer.count(),
            triangles.len()
        );
        Self {
            version: buffer.version(),
            primitives: create_storage_buffer(device, &pack_primitives(buffer), Some(&label)),
            triangle_vertices: u32::try_from(triangles.len()).unwrap_or(u32::MAX),
            triangles: create_storage_buffer(device, &triangles, Some(&label)),
            edge_vertices: u32::try_from(edges.len()).unwrap_or(u32::MAX),
            edges: create_storage_buffer(device, &edges, Some(&label)),
        }
    }

    pub fn is_current(&self, buffer: &Buffer) -> bool {
        self.version == buffer.version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferParams;
    use glam::Vec3;
    use molscope_core::AttributeArrays;

    #[test]
    fn test_gpu_layouts() {
        assert_eq!(std::mem::size_of::<GpuPrimitive>(), 208);
        assert_eq!(std::mem::size_of::<GpuMeshVertex>(), 32);
    }

    #[test]
    fn test_pack_primitives_inverts_transform() {
        let data = AttributeArrays::spheres(
            vec![Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO],
            vec![Vec3::X, Vec3::Y],
            vec![2.0, 0.0],
        );
        let buffer = Buffer::new(BufferKind::Sphere, data, BufferParams::default()).unwrap();
        let packed = pack_primitives(&buffer);
        assert_eq!(packed.len(), 2);
        let transform = Mat4::from_cols_array_2d(&packed[0].transform);
        let inverse = Mat4::from_cols_array_2d(&packed[0].inverse);
        assert!((transform * inverse).abs_diff_eq(Mat4::IDENTITY, 1e-5));
        assert_eq!(packed[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(Mat4::from_cols_array_2d(&packed[1].inverse), Mat4::ZERO);
    }
}
