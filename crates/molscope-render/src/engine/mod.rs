//! The wgpu implementation of [`RenderBackend`].
//!
//! Every target is an offscreen texture with its own depth buffer. Buffers
//! are mirrored to the device on first draw and re-uploaded when their
//! version moves. Impostors are screen-aligned quads ray-cast in the fragment
//! stage; geometry buffers instance the triangle-expanded base mesh with one
//! instance per primitive slot.

mod pipelines;
mod readback;
mod resources;
mod textures;

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use glam::{Vec3, Vec4};

use molscope_core::{OutlineParams, PickPrecision};

use crate::backend::{DrawItem, FrameState, RenderBackend, RenderTarget, Viewport};
use crate::buffer::{BufferId, BufferMode, MeshTarget};
use crate::error::{RenderError, RenderResult};
use crate::lighting::{GpuLightUniforms, LightState};
use crate::pick::PickPixel;
use crate::uniforms::GpuObjectUniforms;
use pipelines::{Pass, PipelineCache, PipelineKey, Program};
use resources::{create_storage_buffer, create_uniform_buffer, kind_code, BufferMirror};
use textures::{pick_format, texel_size, TargetFormats, Targets, READBACK_FORMAT};

/// Mask value of pixels no highlighted primitive covers.
const MASK_CLEAR: f64 = 2.0;

/// Per-draw parameters next to the object uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
struct GpuDrawParams {
    viewport: [f32; 4],
    kind: u32,
    open_ended: u32,
    orthographic: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuLineUniforms {
    view_projection: [[f32; 4]; 4],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuCompositeParams {
    weight: f32,
    _pad: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuOutlineParams {
    visible_color: [f32; 4],
    hidden_color: [f32; 4],
    strength: f32,
    glow: f32,
    radius: i32,
    depth_epsilon: f32,
}

/// One recorded draw: a pipeline, its bindings and the instance runs to draw.
struct PreparedDraw {
    key: PipelineKey,
    bind_group: wgpu::BindGroup,
    vertices: u32,
    instances: Vec<Range<u32>>,
}

struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

/// GPU backend over wgpu, windowed or headless.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: Option<SurfaceState>,
    width: u32,
    height: u32,
    pick_precision: PickPrecision,
    targets: Targets,
    pipelines: PipelineCache,
    mirrors: HashMap<BufferId, BufferMirror>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pick_precision", &self.pick_precision)
            .field("windowed", &self.surface.is_some())
            .field("mirrors", &self.mirrors.len())
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Creates a backend presenting to `window`.
    pub async fn new_windowed(window: Arc<winit::window::Window>) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = request_device(&adapter, "molscope device").await?;
        let formats = TargetFormats::for_adapter(&adapter)?;

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(RenderError::SurfaceConfigurationFailed)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "wgpu backend on {} ({:?}), surface {format:?}",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        Ok(Self::from_device(
            device,
            queue,
            Some(SurfaceState { surface, config }),
            formats,
            width,
            height,
        ))
    }

    /// Creates an offscreen backend.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = request_device(&adapter, "molscope device (headless)").await?;
        let formats = TargetFormats::for_adapter(&adapter)?;
        log::info!(
            "headless wgpu backend on {} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );
        Ok(Self::from_device(device, queue, None, formats, width, height))
    }

    /// Blocking form of [`Self::new_headless`].
    pub fn headless(width: u32, height: u32) -> RenderResult<Self> {
        pollster::block_on(Self::new_headless(width, height))
    }

    fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<SurfaceState>,
        formats: TargetFormats,
        width: u32,
        height: u32,
    ) -> Self {
        let pick_precision = formats.default_precision();
        Self {
            targets: Targets::new(&device, formats, width, height, pick_precision),
            pipelines: PipelineCache::new(&device),
            device,
            queue,
            surface,
            width,
            height,
            pick_precision,
            mirrors: HashMap::new(),
        }
    }

    /// The wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Uploads stale mirrors and records one draw per live item.
    fn prepare_items(
        &mut self,
        frame: &FrameState,
        items: &[DrawItem<'_>],
        format: wgpu::TextureFormat,
        mask: bool,
    ) -> Vec<PreparedDraw> {
        for item in items {
            let buffer = item.mesh.buffer;
            if buffer.is_disposed() {
                continue;
            }
            let stale = self
                .mirrors
                .get(&buffer.id())
                .is_none_or(|mirror| !mirror.is_current(buffer));
            if stale {
                self.mirrors
                    .insert(buffer.id(), BufferMirror::upload(&self.device, buffer));
            }
        }

        let light = create_uniform_buffer(&self.device, &view_space_light(frame), Some("light uniforms"));
        let byte_precision = self.pick_precision == PickPrecision::Byte;
        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let buffer = item.mesh.buffer;
            if buffer.is_disposed() {
                log::error!("drawing disposed buffer {}", buffer.id());
                continue;
            }
            let Some(mirror) = self.mirrors.get(&buffer.id()) else {
                continue;
            };
            let instances = instance_ranges(buffer.count(), item.slots);
            if instances.is_empty() {
                continue;
            }
            let program = match (item.mesh.target, buffer.mode()) {
                (MeshTarget::Wireframe, _) => Program::Wireframe,
                (_, BufferMode::Impostor) => Program::Impostor,
                (_, BufferMode::Geometry { .. }) => Program::Mesh,
            };
            let opacity = buffer.params().opacity;
            let pass = if mask {
                Pass::Mask
            } else if item.mesh.target == MeshTarget::Picking {
                Pass::Pick
            } else {
                Pass::Shade {
                    depth_write: opacity >= 1.0,
                }
            };
            let key = PipelineKey { program, pass, format };
            self.pipelines.prepare(&self.device, key);

            let vertices = match program {
                Program::Impostor => 6,
                Program::Mesh => mirror.triangle_vertices,
                _ => mirror.edge_vertices,
            };
            let object = GpuObjectUniforms::new(
                &item.uniforms,
                opacity,
                item.object_id,
                byte_precision,
                buffer.params().dull_interior,
            );
            let vp = frame.viewport;
            let params = GpuDrawParams {
                viewport: [vp.x as f32, vp.y as f32, vp.width as f32, vp.height as f32],
                kind: kind_code(buffer.kind()),
                open_ended: u32::from(buffer.params().open_ended),
                orthographic: u32::from(frame.orthographic),
                _pad: 0,
            };
            let object_buffer = create_uniform_buffer(&self.device, &object, Some("object uniforms"));
            let params_buffer = create_uniform_buffer(&self.device, &params, Some("draw params"));
            let vertex_buffer = if program == Program::Wireframe {
                &mirror.edges
            } else {
                &mirror.triangles
            };
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("primitive bind group"),
                layout: &self.pipelines.layouts().primitive,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: object_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: light.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: mirror.primitives.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: vertex_buffer.as_entire_binding(),
                    },
                ],
            });
            prepared.push(PreparedDraw {
                key,
                bind_group,
                vertices,
                instances,
            });
        }
        prepared
    }

    /// Runs `draws` into a color view with a depth buffer, loading both.
    fn run_draws(
        &self,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        viewport: Viewport,
        draws: &[PreparedDraw],
    ) {
        if draws.is_empty() || viewport.width == 0 || viewport.height == 0 {
            return;
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("draw encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            set_viewport(&mut render_pass, viewport);
            for draw in draws {
                let Some(pipeline) = self.pipelines.get(&draw.key) else {
                    continue;
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &draw.bind_group, &[]);
                for instances in &draw.instances {
                    render_pass.draw(0..draw.vertices, instances.clone());
                }
            }
        }
        self.submit(encoder);
    }

    /// Clears color and depth of a view pair.
    fn clear_views(&self, color: Option<(&wgpu::TextureView, wgpu::Color)>, depth: &wgpu::TextureView) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear encoder"),
            });
        {
            let color_attachment = color.map(|(view, value)| wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(value),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            });
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[color_attachment],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
        }
        self.submit(encoder);
    }

    /// Adds `source * weight` onto `dest` with a full-screen pass. The
    /// composite pipeline for `dest_format` must be prepared.
    fn composite_views(
        &self,
        source: &wgpu::TextureView,
        dest: &wgpu::TextureView,
        dest_format: wgpu::TextureFormat,
        weight: f32,
        clear_first: bool,
    ) {
        let params = create_uniform_buffer(
            &self.device,
            &GpuCompositeParams {
                weight,
                _pad: [0.0; 3],
            },
            Some("composite params"),
        );
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite bind group"),
            layout: &self.pipelines.layouts().composite,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params.as_entire_binding(),
                },
            ],
        });
        let load = if clear_first {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };
        let key = PipelineKey::simple(Program::Composite, dest_format);
        self.fullscreen(dest, load, key, &bind_group, "composite pass");
    }

    fn fullscreen(
        &self,
        dest: &wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
        key: PipelineKey,
        bind_group: &wgpu::BindGroup,
        label: &str,
    ) {
        let Some(pipeline) = self.pipelines.get(&key) else {
            return;
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: dest,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        self.submit(encoder);
    }
}

async fn request_device(adapter: &wgpu::Adapter, label: &str) -> RenderResult<(wgpu::Device, wgpu::Queue)> {
    Ok(adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
        })
        .await?)
}

/// Light uniforms with positions moved into view space, where the shaders light.
fn view_space_light(frame: &FrameState) -> GpuLightUniforms {
    let light = LightState {
        position: frame.view.transform_point3(frame.light.position),
        ..frame.light
    };
    light.to_gpu(&frame.clip, frame.fog_color, Vec3::ZERO)
}

/// Sorted runs of drawable slots. `None` draws everything.
fn instance_ranges(count: usize, slots: Option<&[u32]>) -> Vec<Range<u32>> {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    let Some(slots) = slots else {
        return if count == 0 { Vec::new() } else { vec![0..count] };
    };
    let mut sorted: Vec<u32> = slots.iter().copied().filter(|&s| s < count).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut ranges: Vec<Range<u32>> = Vec::new();
    for slot in sorted {
        match ranges.last_mut() {
            Some(last) if last.end == slot => last.end = slot + 1,
            _ => ranges.push(slot..slot + 1),
        }
    }
    ranges
}

fn set_viewport(render_pass: &mut wgpu::RenderPass<'_>, viewport: Viewport) {
    render_pass.set_viewport(
        viewport.x as f32,
        viewport.y as f32,
        viewport.width as f32,
        viewport.height as f32,
        0.0,
        1.0,
    );
}

fn to_color(color: Vec4) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(color.x),
        g: f64::from(color.y),
        b: f64::from(color.z),
        a: f64::from(color.w),
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        if let Some(state) = &mut self.surface {
            if width > 0 && height > 0 {
                state.config.width = width;
                state.config.height = height;
                state.surface.configure(&self.device, &state.config);
            }
        }
        let formats = self.targets.formats;
        self.targets = Targets::new(&self.device, formats, width, height, self.pick_precision);
        log::debug!("wgpu backend resized to {width}x{height}");
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_pick_precision(&mut self, precision: PickPrecision) -> PickPrecision {
        self.pick_precision = self
            .targets
            .set_pick_precision(&self.device, self.width, self.height, precision);
        if self.pick_precision != precision {
            log::warn!(
                "{precision:?} picking unsupported on this adapter, using {:?}",
                self.pick_precision
            );
        }
        self.pick_precision
    }

    fn clear(&mut self, target: RenderTarget, color: Vec4) {
        let texture = self.targets.get(target);
        self.clear_views(Some((&texture.view, to_color(color))), &texture.depth_view);
    }

    fn clear_depth(&mut self, target: RenderTarget) {
        self.clear_views(None, &self.targets.get(target).depth_view);
    }

    fn draw(&mut self, target: RenderTarget, frame: &FrameState, items: &[DrawItem<'_>]) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::EmptyTarget);
        }
        let format = self.targets.get(target).format;
        let draws = self.prepare_items(frame, items, format, false);
        let texture = self.targets.get(target);
        self.run_draws(&texture.view, &texture.depth_view, frame.viewport, &draws);
        Ok(())
    }

    fn draw_lines(
        &mut self,
        target: RenderTarget,
        frame: &FrameState,
        segments: &[[Vec3; 2]],
        color: Vec3,
    ) -> RenderResult<()> {
        if segments.is_empty() {
            return Ok(());
        }
        let format = self.targets.get(target).format;
        let key = PipelineKey::simple(Program::Lines, format);
        self.pipelines.prepare(&self.device, key);
        let points: Vec<[f32; 4]> = segments
            .iter()
            .flat_map(|[a, b]| [a.extend(1.0).to_array(), b.extend(1.0).to_array()])
            .collect();
        let uniforms = GpuLineUniforms {
            view_projection: frame.view_projection().to_cols_array_2d(),
            color: color.extend(1.0).to_array(),
        };
        let uniform_buffer = create_uniform_buffer(&self.device, &uniforms, Some("line uniforms"));
        let point_buffer = create_storage_buffer(&self.device, &points, Some("line points"));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lines bind group"),
            layout: &self.pipelines.layouts().lines,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: point_buffer.as_entire_binding(),
                },
            ],
        });
        let draw = PreparedDraw {
            key,
            bind_group,
            vertices: u32::try_from(points.len()).unwrap_or(u32::MAX),
            instances: vec![0..1],
        };
        let texture = self.targets.get(target);
        self.run_draws(&texture.view, &texture.depth_view, frame.viewport, &[draw]);
        Ok(())
    }

    fn draw_outline(
        &mut self,
        target: RenderTarget,
        frame: &FrameState,
        items: &[DrawItem<'_>],
        params: &OutlineParams,
    ) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::EmptyTarget);
        }
        let mask_value = wgpu::Color {
            r: MASK_CLEAR,
            g: 0.0,
            b: 0.0,
            a: 1.0,
        };
        self.clear_views(
            Some((&self.targets.mask.view, mask_value)),
            &self.targets.mask.depth_view,
        );
        let draws = self.prepare_items(frame, items, self.targets.formats.mask, true);
        self.run_draws(
            &self.targets.mask.view,
            &self.targets.mask.depth_view,
            frame.viewport,
            &draws,
        );

        let format = self.targets.get(target).format;
        let key = PipelineKey::simple(Program::Outline, format);
        self.pipelines.prepare(&self.device, key);
        let uniforms = GpuOutlineParams {
            visible_color: params.visible_edge_color.extend(1.0).to_array(),
            hidden_color: params.hidden_edge_color.extend(1.0).to_array(),
            strength: params.edge_strength,
            glow: params.edge_glow,
            radius: params.edge_thickness.round().max(1.0) as i32,
            depth_epsilon: self.targets.formats.mask_epsilon(),
        };
        let uniform_buffer = create_uniform_buffer(&self.device, &uniforms, Some("outline params"));
        let texture = self.targets.get(target);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("outline bind group"),
            layout: &self.pipelines.layouts().outline,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.targets.mask.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });
        self.fullscreen(&texture.view, wgpu::LoadOp::Load, key, &bind_group, "outline pass");
        Ok(())
    }

    fn composite(&mut self, source: RenderTarget, dest: RenderTarget, weight: f32) -> RenderResult<()> {
        if dest == RenderTarget::Picking || source == RenderTarget::Picking {
            log::warn!("compositing {source:?} onto {dest:?} is not supported, skipping");
            return Ok(());
        }
        if source == dest {
            // a pass cannot sample its own attachment; go through the scratch copy
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("scratch copy"),
                });
            encoder.copy_texture_to_texture(
                self.targets.get(source).texture.as_image_copy(),
                self.targets.scratch.texture.as_image_copy(),
                wgpu::Extent3d {
                    width: self.width.max(1),
                    height: self.height.max(1),
                    depth_or_array_layers: 1,
                },
            );
            self.submit(encoder);
        }
        let color = self.targets.formats.color;
        self.pipelines
            .prepare(&self.device, PipelineKey::simple(Program::Composite, color));
        let source_view = if source == dest {
            &self.targets.scratch.view
        } else {
            &self.targets.get(source).view
        };
        self.composite_views(source_view, &self.targets.get(dest).view, color, weight, false);
        Ok(())
    }

    fn read_pick_block(&mut self, x: u32, y: u32, width: u32, height: u32) -> RenderResult<Vec<PickPixel>> {
        if x + width > self.width || y + height > self.height {
            return Err(RenderError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                target_width: self.width,
                target_height: self.height,
            });
        }
        let format = pick_format(self.pick_precision);
        let bytes = readback::read_region(
            &self.device,
            &self.queue,
            &self.targets.picking.texture,
            (x, y),
            (width, height),
            texel_size(format),
        )?;
        Ok(match self.pick_precision {
            PickPrecision::Float => bytes
                .chunks_exact(16)
                .map(|texel| {
                    let mut pixel = [0.0f32; 4];
                    for (value, raw) in pixel.iter_mut().zip(texel.chunks_exact(4)) {
                        *value = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                    }
                    pixel
                })
                .collect(),
            PickPrecision::Byte => bytes
                .chunks_exact(4)
                .map(|texel| texel_to_unit([texel[0], texel[1], texel[2], texel[3]]))
                .collect(),
        })
    }

    fn read_pixels(&mut self, target: RenderTarget) -> RenderResult<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::EmptyTarget);
        }
        self.pipelines
            .prepare(&self.device, PipelineKey::simple(Program::Composite, READBACK_FORMAT));
        self.composite_views(
            &self.targets.get(target).view,
            &self.targets.readback.view,
            READBACK_FORMAT,
            1.0,
            true,
        );
        readback::read_region(
            &self.device,
            &self.queue,
            &self.targets.readback.texture,
            (0, 0),
            (self.width, self.height),
            texel_size(READBACK_FORMAT),
        )
    }

    fn release(&mut self, buffer: BufferId) {
        if self.mirrors.remove(&buffer).is_some() {
            log::debug!("released device copies of buffer {buffer}");
        }
    }

    fn present(&mut self) -> RenderResult<()> {
        let Some(format) = self.surface.as_ref().map(|state| state.config.format) else {
            return Ok(());
        };
        self.pipelines
            .prepare(&self.device, PipelineKey::simple(Program::Composite, format));
        let Some(state) = &self.surface else {
            return Ok(());
        };
        let output = match state.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                state.surface.configure(&self.device, &state.config);
                return Err(RenderError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(wgpu::SurfaceError::Timeout) => return Err(RenderError::Timeout),
            Err(wgpu::SurfaceError::Other) => return Err(RenderError::SurfaceOutdated),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.composite_views(&self.targets.screen.view, &view, format, 1.0, true);
        output.present();
        Ok(())
    }
}

fn texel_to_unit(texel: [u8; 4]) -> PickPixel {
    texel.map(|c| f32::from(c) / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_ranges() {
        assert_eq!(instance_ranges(4, None), vec![0..4]);
        assert!(instance_ranges(0, None).is_empty());
        assert_eq!(
            instance_ranges(10, Some(&[7, 2, 3, 3, 12, 4, 9])),
            vec![2..5, 7..8, 9..10]
        );
        assert!(instance_ranges(3, Some(&[5])).is_empty());
    }

    #[test]
    fn test_gpu_uniform_sizes() {
        assert_eq!(std::mem::size_of::<GpuDrawParams>(), 32);
        assert_eq!(std::mem::size_of::<GpuLineUniforms>(), 80);
        assert_eq!(std::mem::size_of::<GpuCompositeParams>(), 16);
        assert_eq!(std::mem::size_of::<GpuOutlineParams>(), 48);
        assert_eq!(std::mem::size_of::<GpuLightUniforms>(), 96);
        assert_eq!(std::mem::size_of::<GpuObjectUniforms>(), 320);
    }

    #[test]
    fn test_view_space_light_moves_with_camera() {
        use crate::lighting::LightState;
        use molscope_core::ClipState;
        let frame = FrameState {
            view: glam::Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y),
            projection: glam::Mat4::IDENTITY,
            camera_position: Vec3::new(0.0, 0.0, 10.0),
            orthographic: false,
            viewport: Viewport::full(4, 4),
            clip: ClipState {
                near: 1.0,
                far: 100.0,
                fog_near: 50.0,
                fog_far: 100.0,
                b_radius: 10.0,
                c_dist: 10.0,
            },
            fog_color: Vec3::ZERO,
            light: LightState {
                position: Vec3::new(0.0, 0.0, 20.0),
                color: Vec3::ONE,
                ambient: Vec3::ZERO,
            },
            pick_precision: PickPrecision::Float,
        };
        let gpu = view_space_light(&frame);
        assert!((gpu.light_position[2] - 10.0).abs() < 1e-5);
        assert_eq!(gpu.camera_position, [0.0, 0.0, 0.0, 1.0]);
    }

    /// Needs a real adapter; passes trivially where none is available.
    #[test]
    fn test_headless_clear_and_read() {
        let Ok(mut backend) = WgpuBackend::headless(32, 32) else {
            eprintln!("no wgpu adapter, skipping");
            return;
        };
        backend.clear(RenderTarget::Picking, Vec4::ZERO);
        assert_eq!(backend.read_pick_block(0, 0, 5, 5).unwrap(), vec![[0.0; 4]; 25]);
        backend.clear(RenderTarget::Screen, Vec4::new(1.0, 0.0, 0.0, 1.0));
        let pixels = backend.read_pixels(RenderTarget::Screen).unwrap();
        assert_eq!(pixels.len(), 32 * 32 * 4);
        assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
    }
}
