//! Bind group layouts and lazily built render pipelines.

use std::collections::HashMap;

use super::textures::DEPTH_FORMAT;

/// Shader program of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum Program {
    Impostor,
    Mesh,
    Wireframe,
    Lines,
    Composite,
    Outline,
}

/// What the fragment stage writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum Pass {
    /// Lit color; translucent draws leave depth alone.
    Shade { depth_write: bool },
    /// Encoded primitive ids.
    Pick,
    /// Nearest depth into the outline mask.
    Mask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub program: Program,
    pub pass: Pass,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    /// Key for a full-screen or helper program writing `format`.
    pub fn simple(program: Program, format: wgpu::TextureFormat) -> Self {
        Self {
            program,
            pass: Pass::Shade { depth_write: true },
            format,
        }
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind group layouts shared by every pipeline of a program family.
#[derive(Debug)]
pub(super) struct Layouts {
    /// object, light, draw params, primitives, mesh vertices
    pub primitive: wgpu::BindGroupLayout,
    /// line uniforms, points
    pub lines: wgpu::BindGroupLayout,
    /// source texture, weight
    pub composite: wgpu::BindGroupLayout,
    /// mask, scene depth, outline params
    pub outline: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let both = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let unfilterable = wgpu::TextureSampleType::Float { filterable: false };
        Self {
            primitive: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("primitive bind group layout"),
                entries: &[
                    uniform_entry(0, both),
                    uniform_entry(1, both),
                    uniform_entry(2, both),
                    storage_entry(3, both),
                    storage_entry(4, wgpu::ShaderStages::VERTEX),
                ],
            }),
            lines: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lines bind group layout"),
                entries: &[uniform_entry(0, both), storage_entry(1, wgpu::ShaderStages::VERTEX)],
            }),
            composite: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("composite bind group layout"),
                entries: &[
                    texture_entry(0, unfilterable),
                    uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
                ],
            }),
            outline: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("outline bind group layout"),
                entries: &[
                    texture_entry(0, unfilterable),
                    texture_entry(1, wgpu::TextureSampleType::Depth),
                    uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
                ],
            }),
        }
    }
}

/// Additive blending for supersample accumulation.
const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Shader modules and the pipelines built from them so far.
pub(super) struct PipelineCache {
    layouts: Layouts,
    impostor: wgpu::ShaderModule,
    mesh: wgpu::ShaderModule,
    lines: wgpu::ShaderModule,
    composite: wgpu::ShaderModule,
    outline: wgpu::ShaderModule,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = |label: &str, source: &'static str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        Self {
            layouts: Layouts::new(device),
            impostor: module(
                "impostor shader",
                concat!(
                    include_str!("../shaders/common.wgsl"),
                    include_str!("../shaders/impostor.wgsl")
                ),
            ),
            mesh: module(
                "mesh shader",
                concat!(
                    include_str!("../shaders/common.wgsl"),
                    include_str!("../shaders/mesh.wgsl")
                ),
            ),
            lines: module("lines shader", include_str!("../shaders/lines.wgsl")),
            composite: module("composite shader", include_str!("../shaders/composite.wgsl")),
            outline: module("outline shader", include_str!("../shaders/outline.wgsl")),
            pipelines: HashMap::new(),
        }
    }

    pub fn layouts(&self) -> &Layouts {
        &self.layouts
    }

    /// Builds the pipeline for `key` unless it exists.
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.build(device, key);
            log::debug!("built pipeline {key:?}");
            self.pipelines.insert(key, pipeline);
        }
    }

    /// A pipeline built by [`Self::prepare`].
    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    fn build(&self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        let (module, layout, vertex_entry, fragment_entry) = match (key.program, key.pass) {
            (Program::Impostor, pass) => (&self.impostor, &self.layouts.primitive, "vs_main", fragment_for(pass)),
            (Program::Mesh, pass) => (&self.mesh, &self.layouts.primitive, "vs_main", fragment_for(pass)),
            (Program::Wireframe, Pass::Pick) => (&self.mesh, &self.layouts.primitive, "vs_main", "fs_pick"),
            (Program::Wireframe, _) => (&self.mesh, &self.layouts.primitive, "vs_main", "fs_edges"),
            (Program::Lines, _) => (&self.lines, &self.layouts.lines, "vs_main", "fs_main"),
            (Program::Composite, _) => (&self.composite, &self.layouts.composite, "vs_fullscreen", "fs_composite"),
            (Program::Outline, _) => (&self.outline, &self.layouts.outline, "vs_fullscreen", "fs_outline"),
        };

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("molscope pipeline layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });

        let topology = match key.program {
            Program::Wireframe | Program::Lines => wgpu::PrimitiveTopology::LineList,
            _ => wgpu::PrimitiveTopology::TriangleList,
        };
        let depth_write = match key.pass {
            Pass::Shade { depth_write } => depth_write,
            Pass::Pick | Pass::Mask => true,
        };
        let depth_stencil = match key.program {
            Program::Composite | Program::Outline => None,
            _ => Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_write,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        };
        let blend = match (key.program, key.pass) {
            (Program::Composite, _) => Some(ADDITIVE),
            (Program::Lines, _) | (_, Pass::Pick | Pass::Mask) => None,
            // single-channel masks and float picking targets never blend
            _ if matches!(
                key.format,
                wgpu::TextureFormat::R32Float
                    | wgpu::TextureFormat::R16Float
                    | wgpu::TextureFormat::Rgba32Float
            ) =>
            {
                None
            }
            _ => Some(wgpu::BlendState::ALPHA_BLENDING),
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{:?} {:?} pipeline", key.program, key.pass)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some(vertex_entry),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

fn fragment_for(pass: Pass) -> &'static str {
    match pass {
        Pass::Shade { .. } => "fs_shade",
        Pass::Pick => "fs_pick",
        Pass::Mask => "fs_mask",
    }
}
