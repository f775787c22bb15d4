//! Per-object matrices, computed only when a material asks for them.

use glam::{Mat3, Mat4};

use crate::buffer::{BufferMode, MeshTarget};

/// Which derived matrices a material reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UniformNeeds {
    pub model_view: bool,
    pub model_view_projection: bool,
    pub normal_matrix: bool,
    /// Impostors ray-cast in view space and map hits back to the object frame.
    pub model_view_inverse: bool,
    pub projection_inverse: bool,
}

impl UniformNeeds {
    /// Needs of the material used for `target` in `mode`.
    #[must_use]
    pub fn for_mesh(mode: BufferMode, target: MeshTarget) -> Self {
        match (mode, target) {
            (BufferMode::Impostor, MeshTarget::Model) => Self {
                model_view: true,
                model_view_projection: true,
                normal_matrix: true,
                model_view_inverse: true,
                projection_inverse: true,
            },
            (BufferMode::Impostor, MeshTarget::Picking) => Self {
                model_view: true,
                model_view_projection: true,
                model_view_inverse: true,
                projection_inverse: true,
                normal_matrix: false,
            },
            (BufferMode::Geometry { .. }, MeshTarget::Model) => Self {
                model_view: true,
                model_view_projection: true,
                normal_matrix: true,
                ..Self::default()
            },
            (_, MeshTarget::Wireframe | MeshTarget::Picking) => Self {
                model_view: true,
                model_view_projection: true,
                ..Self::default()
            },
        }
    }
}

/// Matrices for one object in one frame. Unrequested entries stay `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectUniforms {
    pub model: Mat4,
    pub model_view: Option<Mat4>,
    pub model_view_projection: Option<Mat4>,
    pub normal_matrix: Option<Mat3>,
    pub model_view_inverse: Option<Mat4>,
    pub projection_inverse: Option<Mat4>,
}

impl ObjectUniforms {
    /// Computes what `needs` asks for.
    #[must_use]
    pub fn compute(needs: UniformNeeds, model: Mat4, view: Mat4, projection: Mat4) -> Self {
        let wants_model_view = needs.model_view
            || needs.model_view_projection
            || needs.normal_matrix
            || needs.model_view_inverse;
        let model_view = wants_model_view.then(|| view * model);
        Self {
            model,
            model_view: model_view.filter(|_| needs.model_view),
            model_view_projection: model_view
                .filter(|_| needs.model_view_projection)
                .map(|mv| projection * mv),
            normal_matrix: model_view
                .filter(|_| needs.normal_matrix)
                .map(|mv| Mat3::from_mat4(mv).inverse().transpose()),
            model_view_inverse: model_view
                .filter(|_| needs.model_view_inverse)
                .map(|mv| mv.inverse()),
            projection_inverse: needs.projection_inverse.then(|| projection.inverse()),
        }
    }

    /// Model-view, computed on the spot when it was not requested.
    #[must_use]
    pub fn model_view_or(&self, view: Mat4) -> Mat4 {
        self.model_view.unwrap_or_else(|| view * self.model)
    }
}

/// GPU layout of [`ObjectUniforms`]; missing matrices are identity.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct GpuObjectUniforms {
    pub model_view: [[f32; 4]; 4],
    pub model_view_projection: [[f32; 4]; 4],
    /// Normal matrix, padded to three vec4 columns.
    pub normal_matrix: [[f32; 4]; 3],
    pub model_view_inverse: [[f32; 4]; 4],
    pub projection_inverse: [[f32; 4]; 4],
    pub opacity: f32,
    pub object_id: u32,
    pub byte_precision: u32,
    pub dull_interior: u32,
}

impl GpuObjectUniforms {
    /// Packs the uniforms.
    #[must_use]
    pub fn new(uniforms: &ObjectUniforms, opacity: f32, object_id: u32, byte_precision: bool, dull_interior: bool) -> Self {
        let normal = uniforms.normal_matrix.unwrap_or(Mat3::IDENTITY);
        Self {
            model_view: uniforms.model_view.unwrap_or(Mat4::IDENTITY).to_cols_array_2d(),
            model_view_projection: uniforms
                .model_view_projection
                .unwrap_or(Mat4::IDENTITY)
                .to_cols_array_2d(),
            normal_matrix: [
                normal.x_axis.extend(0.0).to_array(),
                normal.y_axis.extend(0.0).to_array(),
                normal.z_axis.extend(0.0).to_array(),
            ],
            model_view_inverse: uniforms
                .model_view_inverse
                .unwrap_or(Mat4::IDENTITY)
                .to_cols_array_2d(),
            projection_inverse: uniforms
                .projection_inverse
                .unwrap_or(Mat4::IDENTITY)
                .to_cols_array_2d(),
            opacity,
            object_id,
            byte_precision: u32::from(byte_precision),
            dull_interior: u32::from(dull_interior),
        }
    }
}
