//! The viewer: scene groups, camera, the frame loop and picking.
//!
//! A [`Viewer`] owns a [`RenderBackend`] and decides what goes into each of
//! its targets. Frames are requested with [`Viewer::request_render`] and run
//! from [`Viewer::tick`], which the host calls once per display refresh.

mod scene;
mod stats;

use std::cell::{Cell, Ref};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use glam::{Mat4, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use molscope_core::supersample::{jitter_offsets, sample_weights};
use molscope_core::{
    BoundingBox, CameraType, ClipMode, ClipScale, ClipState, MolscopeError, PickOutcome,
    PickPrecision, PickingData, Result, Signal, ViewerParameters,
};

use crate::backend::{DrawItem, FrameState, RenderBackend, RenderTarget, Viewport};
use crate::buffer::{Buffer, BufferHandle, BufferId, MeshTarget};
use crate::camera::{Camera, ProjectionMode};
use crate::error::RenderResult;
use crate::lighting::LightState;
use crate::pick::{pick_origin, scan_neighborhood, PickPixel, MAX_BYTE_OBJECT_ID, PICK_NEIGHBORHOOD};
use crate::screenshot::{rgba_image, trim_image, ImageParams, ScreenshotError};
use crate::uniforms::ObjectUniforms;

pub use scene::{buffer_bounds, Group, SceneGraph, SceneObject};
pub use stats::{Clock, FrameStats, ManualClock, SystemClock};

/// Requests closer together than this keep the current run of frame stats.
const STATS_RESTART: Duration = Duration::from_millis(22);

/// Idle time after which a still frame is rendered at a higher sample level.
const STILL_DELAY: Duration = Duration::from_millis(500);

/// Sample level of still frames.
const STILL_SAMPLE_LEVEL: i32 = 3;

const BOUNDING_BOX_COLOR: Vec3 = Vec3::ONE;

/// Primitives outlined on top of the model pass.
#[derive(Debug, Clone, PartialEq)]
struct Highlight {
    buffer_id: BufferId,
    slots: Vec<u32>,
    expires_at: Option<Duration>,
}

/// Sets a shared flag for its lifetime; a second guard on the same flag is refused.
#[derive(Debug)]
struct RenderGuard {
    flag: Rc<Cell<bool>>,
}

impl RenderGuard {
    fn enter(flag: &Rc<Cell<bool>>) -> Option<Self> {
        if flag.get() {
            return None;
        }
        flag.set(true);
        Some(Self {
            flag: Rc::clone(flag),
        })
    }
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Renders attached buffers and resolves picks.
pub struct Viewer<B: RenderBackend> {
    backend: B,
    params: ViewerParameters,
    camera: Camera,
    scene: SceneGraph,
    bounding_box: BoundingBox,
    /// Canvas size in CSS pixels; the backend is `size * pixel_ratio`.
    size: (u32, u32),
    clock: Box<dyn Clock>,
    stats: FrameStats,
    render_pending: bool,
    is_still: bool,
    rendering: Rc<Cell<bool>>,
    last_rendered_picking: bool,
    last_picking_signature: Option<u64>,
    transparent: bool,
    highlight: Option<Highlight>,
    rendered: Signal<()>,
    ticked: Signal<FrameStats>,
}

impl<B: RenderBackend> Viewer<B> {
    /// Creates a viewer on the wall clock. The backend's current size is taken
    /// as the canvas size in CSS pixels.
    pub fn new(backend: B, params: ViewerParameters) -> Self {
        Self::with_clock(backend, params, SystemClock::new())
    }

    /// Creates a viewer reading time from `clock`.
    pub fn with_clock(backend: B, params: ViewerParameters, clock: impl Clock + 'static) -> Self {
        let size = backend.size();
        let mut camera = Camera::new(params.camera_z, params.camera_fov, size.0, size.1);
        camera.projection_mode = params.camera_type.into();
        let mut viewer = Self {
            backend,
            params,
            camera,
            scene: SceneGraph::new(),
            bounding_box: BoundingBox::EMPTY,
            size,
            clock: Box::new(clock),
            stats: FrameStats::default(),
            render_pending: false,
            is_still: false,
            rendering: Rc::new(Cell::new(false)),
            last_rendered_picking: false,
            last_picking_signature: None,
            transparent: false,
            highlight: None,
            rendered: Signal::new(),
            ticked: Signal::new(),
        };
        viewer.params.pick_precision = viewer.backend.set_pick_precision(viewer.params.pick_precision);
        viewer.apply_size();
        log::debug!("viewer created on the {} backend", viewer.backend.name());
        viewer
    }

    // ---- scene ----

    /// Attaches a buffer, once per instance matrix when `instances` is given.
    ///
    /// Adding an attached buffer again does nothing.
    pub fn add(&mut self, handle: &BufferHandle, instances: Option<&[Mat4]>) -> Result<()> {
        let instances = instances.unwrap_or(&[]);
        {
            let buffer = handle.borrow();
            if buffer.is_disposed() {
                log::error!("cannot add disposed buffer {}", buffer.id());
                return Err(MolscopeError::BufferDisposed(buffer.id()));
            }
            if self.scene.contains(buffer.id()) {
                log::debug!("buffer {} is already attached", buffer.id());
                return Ok(());
            }
        }
        self.scene.attach(handle, instances);
        self.warn_byte_precision_ids();

        let buffer = handle.borrow();
        if !buffer.params().wireframe {
            self.update_bounding_box(Some(&*buffer), Some(instances));
        }
        drop(buffer);
        self.request_render();
        Ok(())
    }

    /// Detaches a buffer from every group and frees its backend resources.
    pub fn remove(&mut self, handle: &BufferHandle) -> Result<()> {
        let id = handle.borrow().id();
        if !self.scene.detach(id) {
            log::error!("cannot remove buffer {id}: not attached");
            return Err(MolscopeError::BufferNotAttached(id));
        }
        if self.highlight.as_ref().is_some_and(|h| h.buffer_id == id) {
            self.highlight = None;
        }
        self.backend.release(id);
        self.update_bounding_box(None, None);
        self.request_render();
        Ok(())
    }

    /// Detaches every buffer.
    pub fn clear(&mut self) {
        let ids: Vec<BufferId> = self.scene.attached().map(|(h, _)| h.borrow().id()).collect();
        for id in ids {
            self.backend.release(id);
        }
        self.scene = SceneGraph::new();
        self.highlight = None;
        self.bounding_box = BoundingBox::EMPTY;
        self.request_render();
    }

    /// Grows the bounding box by one buffer, or recomputes it from the model
    /// and background groups when `buffer` is `None`.
    pub fn update_bounding_box(&mut self, buffer: Option<&Buffer>, instances: Option<&[Mat4]>) {
        match buffer {
            Some(buffer) => {
                let bounds = buffer_bounds(buffer, instances.unwrap_or(&[]));
                self.bounding_box.union_with(&bounds);
            }
            None => self.bounding_box = self.scene.bounds(),
        }
    }

    /// Current scene bounds.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Diagonal of the scene bounds.
    #[must_use]
    pub fn bbox_length(&self) -> f32 {
        self.bounding_box.diagonal_length()
    }

    /// The attached buffers.
    #[must_use]
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    fn warn_byte_precision_ids(&self) {
        let max_id = self.scene.max_object_id();
        if self.params.pick_precision == PickPrecision::Byte && max_id > MAX_BYTE_OBJECT_ID {
            log::warn!("object id {max_id} exceeds {MAX_BYTE_OBJECT_ID}; byte picking cannot resolve it");
        }
    }

    // ---- frame loop ----

    /// Schedules a render on the next [`Viewer::tick`]. Repeated requests coalesce.
    pub fn request_render(&mut self) {
        if self.render_pending {
            return;
        }
        let now = self.clock.now();
        if self.stats.since_start(now) > STATS_RESTART {
            self.stats.begin(now);
            self.is_still = false;
        }
        self.render_pending = true;
    }

    /// Returns true while a render is scheduled.
    #[must_use]
    pub fn render_pending(&self) -> bool {
        self.render_pending
    }

    /// Returns true once the idle still frame has been drawn.
    #[must_use]
    pub fn is_still(&self) -> bool {
        self.is_still
    }

    /// Timing of the current run of frames.
    #[must_use]
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// One animation frame: runs a pending render, then the still-frame
    /// escalation once the scene has been idle long enough.
    pub fn tick(&mut self) -> RenderResult<()> {
        self.ticked.emit(&self.stats);
        self.expire_highlight();

        if self.render_pending {
            self.render(false)?;
            self.stats.update(self.clock.now());
        }

        let level = self.params.sample_level;
        let idle = self.stats.since_start(self.clock.now());
        if idle > STILL_DELAY && !self.is_still && level < STILL_SAMPLE_LEVEL && level != -1 {
            self.params.sample_level = STILL_SAMPLE_LEVEL;
            self.render_pending = true;
            let result = self.render(false);
            self.is_still = true;
            self.params.sample_level = level;
            result?;
        }
        Ok(())
    }

    fn expire_highlight(&mut self) {
        let now = self.clock.now();
        let expired = self
            .highlight
            .as_ref()
            .and_then(|h| h.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.clear_highlight();
        }
    }

    /// Renders one frame, or the picking pass when `picking` is set.
    ///
    /// Returns `Ok(false)` without drawing when called during another render
    /// or while the canvas is empty.
    pub fn render(&mut self, picking: bool) -> RenderResult<bool> {
        let Some(_guard) = RenderGuard::enter(&self.rendering) else {
            log::warn!("render requested while rendering; ignored");
            return Ok(false);
        };
        let (width, height) = self.backend.size();
        if width == 0 || height == 0 {
            log::debug!("skipping render of an empty canvas");
            return Ok(false);
        }
        // a failed pass is reported once, not retried on every tick
        self.render_pending = false;

        let clip = self.update_clipping();
        let light = LightState::follow_camera(
            &self.params,
            self.camera.position,
            self.camera.target,
            self.bbox_length(),
        );

        if picking {
            let signature = self.picking_signature();
            if self.last_rendered_picking && self.last_picking_signature == Some(signature) {
                log::trace!("picking target is current");
            } else {
                self.picking_pass(clip, light)?;
                self.last_picking_signature = Some(signature);
            }
        } else if self.params.sample_level > 0 && self.params.camera_type != CameraType::Stereo {
            self.supersample_pass(clip, light)?;
        } else {
            let frames = self.frames(&self.camera, clip, light);
            self.model_pass(RenderTarget::Screen, &frames)?;
        }
        if !picking {
            self.backend.present()?;
        }

        self.last_rendered_picking = picking;
        self.rendered.emit(&());
        Ok(true)
    }

    fn update_clipping(&mut self) -> ClipState {
        let clip = ClipState::compute(
            &self.params,
            self.bbox_length(),
            self.camera.position - self.camera.target,
        );
        self.camera.near = clip.near;
        self.camera.far = clip.far;
        clip
    }

    fn frame_state(&self, camera: &Camera, viewport: Viewport, clip: ClipState, light: LightState) -> FrameState {
        FrameState {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            camera_position: camera.position,
            orthographic: camera.projection_mode == ProjectionMode::Orthographic,
            viewport,
            clip,
            fog_color: self.params.fog_color,
            light,
            pick_precision: self.params.pick_precision,
        }
    }

    /// One frame state per eye.
    fn frames(&self, camera: &Camera, clip: ClipState, light: LightState) -> Vec<FrameState> {
        let (width, height) = self.backend.size();
        if self.params.camera_type != CameraType::Stereo {
            return vec![self.frame_state(camera, Viewport::full(width, height), clip, light)];
        }
        let (left, right) = camera.stereo_pair(self.params.camera_eye_sep);
        let half = width / 2;
        vec![
            self.frame_state(&left, Viewport { x: 0, y: 0, width: half, height }, clip, light),
            self.frame_state(
                &right,
                Viewport {
                    x: half,
                    y: 0,
                    width: width - half,
                    height,
                },
                clip,
                light,
            ),
        ]
    }

    fn picking_signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for v in self.camera.view_projection_matrix().to_cols_array() {
            v.to_bits().hash(&mut hasher);
        }
        self.backend.size().hash(&mut hasher);
        (self.params.pick_precision == PickPrecision::Byte).hash(&mut hasher);
        (self.params.camera_type == CameraType::Stereo).hash(&mut hasher);
        self.params.camera_eye_sep.to_bits().hash(&mut hasher);
        self.scene.picking_signature().hash(&mut hasher);
        hasher.finish()
    }

    fn picking_pass(&mut self, clip: ClipState, light: LightState) -> RenderResult<()> {
        let frames = self.frames(&self.camera, clip, light);
        let backend = &mut self.backend;
        backend.clear(RenderTarget::Picking, Vec4::ZERO);
        for frame in &frames {
            with_items(&self.scene, Group::Picking, frame, None, |items| {
                backend.draw(RenderTarget::Picking, frame, items)
            })?;
        }
        Ok(())
    }

    fn supersample_pass(&mut self, clip: ClipState, light: LightState) -> RenderResult<()> {
        let level = self.params.sample_level;
        let mut camera = self.camera.clone();
        for (i, (offset, weight)) in jitter_offsets(level)
            .into_iter()
            .zip(sample_weights(level))
            .enumerate()
        {
            camera.set_view_offset(offset);
            let frames = self.frames(&camera, clip, light);
            self.model_pass(RenderTarget::Sample, &frames)?;
            if i == 0 {
                self.backend.clear(RenderTarget::Hold, Vec4::ZERO);
            }
            self.backend.composite(RenderTarget::Sample, RenderTarget::Hold, weight)?;
        }
        self.backend.clear(RenderTarget::Screen, Vec4::ZERO);
        self.backend.composite(RenderTarget::Hold, RenderTarget::Screen, 1.0)
    }

    fn model_pass(&mut self, target: RenderTarget, frames: &[FrameState]) -> RenderResult<()> {
        let alpha = if self.transparent { 0.0 } else { 1.0 };
        let lines = (self.params.show_bounding_box && !self.bounding_box.is_empty())
            .then(|| box_edges(&self.bounding_box));
        let backend = &mut self.backend;
        let scene = &self.scene;
        backend.clear(target, self.params.background_color.extend(alpha));
        for frame in frames {
            with_items(scene, Group::Background, frame, None, |items| {
                backend.draw(target, frame, items)
            })?;
            backend.clear_depth(target);
            with_items(scene, Group::Model, frame, None, |items| backend.draw(target, frame, items))?;
            with_items(scene, Group::Wireframe, frame, None, |items| {
                backend.draw(target, frame, items)
            })?;
            if let Some(lines) = &lines {
                backend.draw_lines(target, frame, lines, BOUNDING_BOX_COLOR)?;
            }
            if let Some(highlight) = &self.highlight {
                with_items(scene, Group::Model, frame, Some(highlight), |items| {
                    backend.draw_outline(target, frame, items, &self.params.outline)
                })?;
            }
        }
        Ok(())
    }

    // ---- picking ----

    /// Resolves the primitive under canvas position `(x, y)`, in CSS pixels
    /// from the top-left corner.
    pub fn pick(&mut self, x: f32, y: f32) -> Result<PickOutcome> {
        let (width, height) = self.backend.size();
        if width < PICK_NEIGHBORHOOD || height < PICK_NEIGHBORHOOD {
            return Ok(PickOutcome::Nothing);
        }
        let (px, py) = pick_origin(x, y, self.params.pixel_ratio, width, height);
        self.render(true)?;
        let block = self
            .backend
            .read_pick_block(px, py, PICK_NEIGHBORHOOD, PICK_NEIGHBORHOOD)?;

        let scene = &self.scene;
        let is_live = |object_id: u32| {
            scene
                .picking_object(object_id)
                .is_some_and(|o| !o.buffer.borrow().is_disposed())
        };
        let Some((pid, object_id)) = scan_neighborhood(&block, self.params.pick_precision, is_live)
        else {
            return Ok(PickOutcome::Nothing);
        };
        let Some(object) = scene.picking_object(object_id) else {
            return Ok(PickOutcome::Nothing);
        };
        let buffer = object.buffer.borrow();
        let Some(picker) = buffer.picker() else {
            return Ok(PickOutcome::Nothing);
        };
        if pid as usize >= picker.array.len() {
            log::error!(
                "picked id {pid} out of range for buffer {} ({} entries)",
                buffer.id(),
                picker.array.len()
            );
            return Err(MolscopeError::PickIndexOutOfRange {
                id: pid,
                len: picker.array.len(),
            });
        }
        Ok(PickOutcome::Hit(PickingData {
            pid,
            instance: object.instance,
            picker: Arc::clone(picker),
        }))
    }

    /// The whole picking target after a picking render, row-major from the top.
    pub fn picking_pixels(&mut self) -> RenderResult<Vec<PickPixel>> {
        self.render(true)?;
        let (width, height) = self.backend.size();
        self.backend.read_pick_block(0, 0, width, height)
    }

    // ---- highlight ----

    /// Outlines the primitives of `handle` mapped to `rows` until `timeout` runs out.
    ///
    /// Without a picker, `rows` are taken as primitive slots.
    pub fn set_highlight(&mut self, handle: &BufferHandle, rows: &[u32], timeout: Option<Duration>) -> Result<()> {
        let buffer = handle.borrow();
        let buffer_id = buffer.id();
        if !self.scene.contains(buffer_id) {
            log::error!("cannot highlight buffer {buffer_id}: not attached");
            return Err(MolscopeError::BufferNotAttached(buffer_id));
        }
        let slots = match buffer.picker() {
            Some(picker) => picker.slots_for_rows(rows),
            None => rows
                .iter()
                .copied()
                .filter(|r| (*r as usize) < buffer.count())
                .collect(),
        };
        drop(buffer);
        self.highlight = Some(Highlight {
            buffer_id,
            slots,
            expires_at: timeout.map(|t| self.clock.now() + t),
        });
        self.request_render();
        Ok(())
    }

    /// Removes the highlight outline.
    pub fn clear_highlight(&mut self) {
        if self.highlight.take().is_some() {
            self.request_render();
        }
    }

    /// Highlighted buffer and slots.
    #[must_use]
    pub fn highlight(&self) -> Option<(BufferId, &[u32])> {
        self.highlight.as_ref().map(|h| (h.buffer_id, h.slots.as_slice()))
    }

    // ---- images ----

    /// Renders the scene into an RGBA image.
    pub fn make_image(&mut self, params: &ImageParams) -> std::result::Result<RgbaImage, ScreenshotError> {
        let level = self.params.sample_level;
        if let Some(override_level) = params.sample_level {
            self.params.sample_level = override_level;
        }
        self.transparent = params.transparent;
        let rendered = self.render(false);
        self.params.sample_level = level;
        self.transparent = false;
        rendered?;

        let (width, height) = self.backend.size();
        let image = rgba_image(self.backend.read_pixels(RenderTarget::Screen)?, width, height)?;
        self.request_render();
        if !params.trim {
            return Ok(image);
        }
        let bg = self.params.background_color;
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let alpha = if params.transparent { 0 } else { 255 };
        Ok(trim_image(&image, Rgba([channel(bg.x), channel(bg.y), channel(bg.z), alpha])))
    }

    // ---- parameters ----

    /// Resizes the canvas, in CSS pixels.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.apply_size();
        self.request_render();
    }

    fn apply_size(&mut self) {
        let ratio = self.params.pixel_ratio.max(f32::EPSILON);
        let scale = |v: u32| (v as f32 * ratio).round() as u32;
        let (width, height) = (scale(self.size.0), scale(self.size.1));
        self.backend.resize(width, height);
        self.camera.set_viewport(width, height);
    }

    /// Canvas size in CSS pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Updates fog; `None` keeps a value.
    pub fn set_fog(&mut self, color: Option<Vec3>, near: Option<f32>, far: Option<f32>) {
        if let Some(color) = color {
            self.params.fog_color = color;
        }
        if let Some(near) = near {
            self.params.fog_near = near;
        }
        if let Some(far) = far {
            self.params.fog_far = far;
        }
        self.request_render();
    }

    /// Updates clip planes; `None` keeps a value.
    pub fn set_clip(&mut self, near: Option<f32>, far: Option<f32>, dist: Option<f32>) {
        if let Some(near) = near {
            self.params.clip_near = near;
        }
        if let Some(far) = far {
            self.params.clip_far = far;
        }
        if let Some(dist) = dist {
            self.params.clip_dist = dist;
        }
        self.request_render();
    }

    pub fn set_clip_mode(&mut self, mode: ClipMode) {
        self.params.clip_mode = mode;
        self.request_render();
    }

    pub fn set_clip_scale(&mut self, scale: ClipScale) {
        self.params.clip_scale = scale;
        self.request_render();
    }

    /// Updates the point and ambient lights; `None` keeps a value.
    pub fn set_light(
        &mut self,
        color: Option<Vec3>,
        intensity: Option<f32>,
        ambient_color: Option<Vec3>,
        ambient_intensity: Option<f32>,
    ) {
        if let Some(color) = color {
            self.params.light_color = color;
        }
        if let Some(intensity) = intensity {
            self.params.light_intensity = intensity;
        }
        if let Some(color) = ambient_color {
            self.params.ambient_color = color;
        }
        if let Some(intensity) = ambient_intensity {
            self.params.ambient_intensity = intensity;
        }
        self.request_render();
    }

    /// Sets the supersample level; `-1` also disables the still-frame pass.
    pub fn set_sampling(&mut self, level: i32) {
        self.params.sample_level = level;
        self.request_render();
    }

    pub fn set_camera_type(&mut self, camera_type: CameraType) {
        self.params.camera_type = camera_type;
        self.camera.projection_mode = camera_type.into();
        self.request_render();
    }

    /// Sets the vertical field of view in degrees.
    pub fn set_camera_fov(&mut self, degrees: f32) {
        self.params.camera_fov = degrees;
        self.camera.set_fov_degrees(degrees);
        self.request_render();
    }

    pub fn set_background(&mut self, color: Vec3) {
        self.params.background_color = color;
        self.request_render();
    }

    /// Replaces every parameter.
    pub fn set_parameters(&mut self, mut params: ViewerParameters) {
        let resize = (params.pixel_ratio - self.params.pixel_ratio).abs() > f32::EPSILON;
        params.pick_precision = self.backend.set_pick_precision(params.pick_precision);
        self.camera.projection_mode = params.camera_type.into();
        self.camera.set_fov_degrees(params.camera_fov);
        self.params = params;
        if resize {
            self.apply_size();
        }
        self.last_picking_signature = None;
        self.warn_byte_precision_ids();
        self.request_render();
    }

    #[must_use]
    pub fn parameters(&self) -> &ViewerParameters {
        &self.params
    }

    // ---- camera ----

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable camera. Call [`Viewer::request_render`] after moving it.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Camera z offset that fits the scene bounds in view.
    #[must_use]
    pub fn zoom_for_box(&self) -> f32 {
        self.camera.zoom_for_box(&self.bounding_box, self.params.clip_dist)
    }

    /// Points the camera at the scene bounds.
    pub fn frame_scene(&mut self) {
        self.camera.frame_box(&self.bounding_box, self.params.clip_dist);
        self.request_render();
    }

    // ---- backend and signals ----

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Fired after every completed render.
    #[must_use]
    pub fn rendered(&self) -> &Signal<()> {
        &self.rendered
    }

    /// Fired at the start of every [`Viewer::tick`].
    #[must_use]
    pub fn ticked(&self) -> &Signal<FrameStats> {
        &self.ticked
    }
}

/// Builds draw items for one group and hands them to `f`.
///
/// With a highlight, only that buffer's objects are included, restricted to its slots.
fn with_items<R>(
    scene: &SceneGraph,
    group: Group,
    frame: &FrameState,
    highlight: Option<&Highlight>,
    f: impl FnOnce(&[DrawItem<'_>]) -> R,
) -> R {
    let mesh_target = match group {
        Group::Model | Group::Background => MeshTarget::Model,
        Group::Wireframe => MeshTarget::Wireframe,
        Group::Picking => MeshTarget::Picking,
    };
    let objects: Vec<(&SceneObject, Ref<'_, Buffer>)> = scene
        .group(group)
        .filter(|o| highlight.is_none_or(|h| h.buffer_id == o.buffer_id))
        .map(|o| (o, o.buffer.borrow()))
        .collect();
    let items: Vec<DrawItem<'_>> = objects
        .iter()
        .filter_map(|(object, buffer)| {
            if buffer.is_disposed() {
                log::error!("disposed buffer {} is still attached", buffer.id());
                return None;
            }
            let mesh = buffer.mesh(mesh_target)?;
            let uniforms = ObjectUniforms::compute(
                mesh.needs,
                object.model_matrix(buffer),
                frame.view,
                frame.projection,
            );
            Some(DrawItem {
                object_id: object.object_id,
                mesh,
                instance: object.instance,
                uniforms,
                slots: highlight.map(|h| h.slots.as_slice()),
            })
        })
        .collect();
    f(&items)
}

/// The twelve edges of a box.
fn box_edges(bb: &BoundingBox) -> Vec<[Vec3; 2]> {
    let corners = bb.corners();
    let mut edges = Vec::with_capacity(12);
    for (i, corner) in corners.iter().enumerate() {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                edges.push([*corner, corners[i | bit]]);
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferKind, BufferParams};
    use crate::software::SoftwareBackend;
    use molscope_core::{AttributeArrays, Picker, PickerKind};

    fn viewer(width: u32, height: u32) -> (Viewer<SoftwareBackend>, ManualClock) {
        let clock = ManualClock::new();
        let viewer = Viewer::with_clock(
            SoftwareBackend::new(width, height),
            ViewerParameters::default(),
            clock.clone(),
        );
        (viewer, clock)
    }

    fn spheres(positions: Vec<Vec3>, radius: f32) -> BufferHandle {
        let n = positions.len();
        let rows = (0..n as u32).map(|i| i + 100).collect();
        let data = AttributeArrays::spheres(positions, vec![Vec3::new(1.0, 0.5, 0.2); n], vec![radius; n])
            .with_picker(Picker::new(PickerKind::Atom, rows, 1));
        Buffer::shared(BufferKind::Sphere, data, BufferParams::default()).unwrap()
    }

    fn count_renders(viewer: &Viewer<SoftwareBackend>) -> (Rc<Cell<u32>>, molscope_core::Subscription) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = viewer.rendered().connect(move |()| c.set(c.get() + 1));
        (count, sub)
    }

    #[test]
    fn test_render_guard_refuses_reentry() {
        let flag = Rc::new(Cell::new(false));
        let guard = RenderGuard::enter(&flag);
        assert!(guard.is_some());
        assert!(RenderGuard::enter(&flag).is_none());
        drop(guard);
        assert!(!flag.get());
        assert!(RenderGuard::enter(&flag).is_some());
    }

    #[test]
    fn test_requests_coalesce_into_one_render() {
        let (mut viewer, _clock) = viewer(32, 32);
        let (count, _sub) = count_renders(&viewer);
        viewer.request_render();
        viewer.request_render();
        viewer.request_render();
        viewer.tick().unwrap();
        assert_eq!(count.get(), 1);
        viewer.tick().unwrap();
        assert_eq!(count.get(), 1);
        assert!(!viewer.render_pending());
    }

    /// Software rendering whose draws fail while `fail` is set.
    struct FailingBackend {
        inner: SoftwareBackend,
        fail: Rc<Cell<bool>>,
        draws: Rc<Cell<u32>>,
    }

    impl RenderBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.inner.resize(width, height);
        }

        fn size(&self) -> (u32, u32) {
            self.inner.size()
        }

        fn set_pick_precision(&mut self, precision: PickPrecision) -> PickPrecision {
            self.inner.set_pick_precision(precision)
        }

        fn clear(&mut self, target: RenderTarget, color: Vec4) {
            self.inner.clear(target, color);
        }

        fn clear_depth(&mut self, target: RenderTarget) {
            self.inner.clear_depth(target);
        }

        fn draw(
            &mut self,
            target: RenderTarget,
            frame: &FrameState,
            items: &[DrawItem<'_>],
        ) -> RenderResult<()> {
            self.draws.set(self.draws.get() + 1);
            if self.fail.get() {
                return Err(crate::error::RenderError::OutOfMemory);
            }
            self.inner.draw(target, frame, items)
        }

        fn draw_lines(
            &mut self,
            target: RenderTarget,
            frame: &FrameState,
            segments: &[[Vec3; 2]],
            color: Vec3,
        ) -> RenderResult<()> {
            self.inner.draw_lines(target, frame, segments, color)
        }

        fn draw_outline(
            &mut self,
            target: RenderTarget,
            frame: &FrameState,
            items: &[DrawItem<'_>],
            params: &molscope_core::OutlineParams,
        ) -> RenderResult<()> {
            self.inner.draw_outline(target, frame, items, params)
        }

        fn composite(&mut self, source: RenderTarget, dest: RenderTarget, weight: f32) -> RenderResult<()> {
            self.inner.composite(source, dest, weight)
        }

        fn read_pick_block(
            &mut self,
            x: u32,
            y: u32,
            width: u32,
            height: u32,
        ) -> RenderResult<Vec<PickPixel>> {
            self.inner.read_pick_block(x, y, width, height)
        }

        fn read_pixels(&mut self, target: RenderTarget) -> RenderResult<Vec<u8>> {
            self.inner.read_pixels(target)
        }

        fn release(&mut self, buffer: BufferId) {
            self.inner.release(buffer);
        }
    }

    #[test]
    fn test_failed_render_is_not_retried() {
        let fail = Rc::new(Cell::new(true));
        let draws = Rc::new(Cell::new(0));
        let backend = FailingBackend {
            inner: SoftwareBackend::new(32, 32),
            fail: Rc::clone(&fail),
            draws: Rc::clone(&draws),
        };
        let mut viewer = Viewer::with_clock(backend, ViewerParameters::default(), ManualClock::new());
        let handle = spheres(vec![Vec3::ZERO], 1.0);
        viewer.add(&handle, None).unwrap();

        viewer.request_render();
        assert!(viewer.tick().is_err());
        assert!(!viewer.render_pending());
        let attempts = draws.get();
        assert!(attempts > 0);
        viewer.tick().unwrap();
        assert_eq!(draws.get(), attempts);

        fail.set(false);
        viewer.request_render();
        viewer.tick().unwrap();
        assert!(draws.get() > attempts);
        assert!(!viewer.render_pending());
    }

    #[test]
    fn test_add_grows_bounding_box() {
        let (mut viewer, _clock) = viewer(32, 32);
        let corners = BoundingBox::new(Vec3::ZERO, Vec3::ONE).corners().to_vec();
        let handle = spheres(corners, 1.0);
        viewer.add(&handle, None).unwrap();
        let bb = viewer.bounding_box();
        assert!((bb.min - Vec3::splat(-1.0)).abs().max_element() < 1e-5);
        assert!((bb.max - Vec3::splat(2.0)).abs().max_element() < 1e-5);
    }

    #[test]
    fn test_add_twice_is_noop() {
        let (mut viewer, _clock) = viewer(32, 32);
        let handle = spheres(vec![Vec3::ZERO], 1.0);
        viewer.add(&handle, None).unwrap();
        viewer.add(&handle, None).unwrap();
        assert_eq!(viewer.scene().group(Group::Model).count(), 1);
    }

    #[test]
    fn test_remove_recomputes_bounds() {
        let (mut viewer, _clock) = viewer(32, 32);
        let near = spheres(vec![Vec3::ZERO], 1.0);
        let far = spheres(vec![Vec3::new(100.0, 0.0, 0.0)], 1.0);
        viewer.add(&near, None).unwrap();
        viewer.add(&far, None).unwrap();
        assert!(viewer.bounding_box().max.x > 100.0);
        viewer.remove(&far).unwrap();
        assert!((viewer.bounding_box().max.x - 1.0).abs() < 1e-5);
        assert!(matches!(
            viewer.remove(&far),
            Err(MolscopeError::BufferNotAttached(_))
        ));
    }

    #[test]
    fn test_disposed_buffer_rejected() {
        let (mut viewer, _clock) = viewer(32, 32);
        let handle = spheres(vec![Vec3::ZERO], 1.0);
        handle.borrow_mut().dispose();
        assert!(matches!(
            viewer.add(&handle, None),
            Err(MolscopeError::BufferDisposed(_))
        ));
    }

    #[test]
    fn test_pick_center_and_background() {
        let (mut viewer, _clock) = viewer(64, 64);
        let handle = spheres(vec![Vec3::ZERO], 150.0);
        viewer.add(&handle, None).unwrap();

        let hit = viewer.pick(32.0, 32.0).unwrap();
        let data = hit.hit().unwrap();
        assert_eq!(data.pid, 0);
        assert_eq!(data.row().unwrap(), 100);

        assert!(viewer.pick(1.0, 1.0).unwrap().is_nothing());
    }

    #[test]
    fn test_pick_reports_instance() {
        let (mut viewer, _clock) = viewer(64, 64);
        let handle = spheres(vec![Vec3::ZERO], 100.0);
        let shifted = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        viewer.add(&handle, Some(&[shifted])).unwrap();
        let outcome = viewer.pick(32.0, 32.0).unwrap();
        assert_eq!(outcome.hit().unwrap().instance, Some(shifted));
    }

    #[test]
    fn test_picking_pass_reused_until_scene_changes() {
        let (mut viewer, _clock) = viewer(64, 64);
        let handle = spheres(vec![Vec3::ZERO], 150.0);
        viewer.add(&handle, None).unwrap();
        assert!(viewer.pick(32.0, 32.0).unwrap().hit().is_some());

        // a reused target is not redrawn
        viewer.backend_mut().clear(RenderTarget::Picking, Vec4::ZERO);
        assert!(viewer.pick(32.0, 32.0).unwrap().is_nothing());

        handle.borrow_mut().set_opacity(0.9);
        assert!(viewer.pick(32.0, 32.0).unwrap().hit().is_some());
    }

    #[test]
    fn test_picking_render_leaves_scene_untouched() {
        let (mut viewer, _clock) = viewer(64, 64);
        let handle = spheres(vec![Vec3::ZERO], 150.0);
        viewer.add(&handle, None).unwrap();
        viewer.render(false).unwrap();
        let screen = viewer.backend_mut().read_pixels(RenderTarget::Screen).unwrap();
        let first = viewer.picking_pixels().unwrap();
        // a model frame in between forces the picking pass to run again
        viewer.render(false).unwrap();
        let second = viewer.picking_pixels().unwrap();
        assert_eq!(first, second);
        assert_eq!(viewer.backend_mut().read_pixels(RenderTarget::Screen).unwrap(), screen);
        assert_eq!(viewer.bounding_box(), buffer_bounds(&handle.borrow(), &[]));
    }

    #[test]
    fn test_stereo_pick_in_left_eye() {
        let (mut viewer, _clock) = viewer(64, 64);
        viewer.set_camera_type(CameraType::Stereo);
        let handle = spheres(vec![Vec3::ZERO], 150.0);
        viewer.add(&handle, None).unwrap();
        assert!(viewer.pick(16.0, 32.0).unwrap().hit().is_some());
        assert!(viewer.pick(48.0, 32.0).unwrap().hit().is_some());
        assert!(viewer.pick(32.0, 2.0).unwrap().is_nothing());
    }

    #[test]
    fn test_still_frame_after_idle() {
        let (mut viewer, clock) = viewer(16, 16);
        let (count, _sub) = count_renders(&viewer);
        viewer.request_render();
        viewer.tick().unwrap();
        assert_eq!(count.get(), 1);
        assert!(!viewer.is_still());

        clock.advance(Duration::from_millis(600));
        viewer.tick().unwrap();
        assert_eq!(count.get(), 2);
        assert!(viewer.is_still());
        assert_eq!(viewer.parameters().sample_level, 0);

        viewer.tick().unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_no_still_frame_when_disabled() {
        let (mut viewer, clock) = viewer(16, 16);
        viewer.set_sampling(-1);
        let (count, _sub) = count_renders(&viewer);
        viewer.tick().unwrap();
        clock.advance(Duration::from_secs(1));
        viewer.tick().unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_highlight_expires() {
        let (mut viewer, clock) = viewer(32, 32);
        let handle = spheres(vec![Vec3::ZERO, Vec3::X], 1.0);
        viewer.add(&handle, None).unwrap();
        viewer
            .set_highlight(&handle, &[101], Some(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(viewer.highlight().unwrap().1, &[1]);
        viewer.tick().unwrap();
        assert!(viewer.highlight().is_some());
        clock.advance(Duration::from_millis(150));
        viewer.tick().unwrap();
        assert!(viewer.highlight().is_none());
    }

    #[test]
    fn test_ticked_fires_every_tick() {
        let (mut viewer, _clock) = viewer(8, 8);
        let ticks = Rc::new(Cell::new(0));
        let t = Rc::clone(&ticks);
        let _sub = viewer.ticked().connect(move |_| t.set(t.get() + 1));
        viewer.tick().unwrap();
        viewer.tick().unwrap();
        assert_eq!(ticks.get(), 2);
    }

    #[test]
    fn test_supersampled_image_matches_coverage() {
        let (mut viewer, _clock) = viewer(64, 64);
        let handle = spheres(vec![Vec3::ZERO], 150.0);
        viewer.add(&handle, None).unwrap();
        let plain = viewer.make_image(&ImageParams::default()).unwrap();
        let smooth = viewer
            .make_image(&ImageParams {
                sample_level: Some(2),
                ..ImageParams::default()
            })
            .unwrap();
        assert_eq!(plain.dimensions(), (64, 64));
        assert_eq!(plain.get_pixel(32, 32)[0] > 0, smooth.get_pixel(32, 32)[0] > 0);
        assert_eq!(*smooth.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(viewer.parameters().sample_level, 0);
    }

    #[test]
    fn test_trimmed_transparent_image() {
        let (mut viewer, _clock) = viewer(64, 64);
        let handle = spheres(vec![Vec3::ZERO], 150.0);
        viewer.add(&handle, None).unwrap();
        let image = viewer
            .make_image(&ImageParams {
                transparent: true,
                trim: true,
                ..ImageParams::default()
            })
            .unwrap();
        assert!(image.width() < 64 && image.height() < 64);
        assert!(image.width() > 16);
    }

    #[test]
    fn test_set_size_scales_by_pixel_ratio() {
        let (mut viewer, _clock) = viewer(10, 10);
        let params = ViewerParameters {
            pixel_ratio: 2.0,
            ..ViewerParameters::default()
        };
        viewer.set_parameters(params);
        assert_eq!(viewer.backend().size(), (20, 20));
        viewer.set_size(30, 15);
        assert_eq!(viewer.backend().size(), (60, 30));
        assert_eq!(viewer.size(), (30, 15));
    }

    #[test]
    fn test_box_edges() {
        let edges = box_edges(&BoundingBox::new(Vec3::ZERO, Vec3::ONE));
        assert_eq!(edges.len(), 12);
        assert!(edges.iter().all(|[a, b]| (*a - *b).length() == 1.0));
    }
}
