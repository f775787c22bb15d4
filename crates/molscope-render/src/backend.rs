//! The seam between the viewer state machine and a rasterizer.
//!
//! The viewer decides what is drawn where; a [`RenderBackend`] owns the
//! render targets and turns [`DrawItem`]s into pixels.

use glam::{Mat4, Vec3, Vec4};

use molscope_core::{ClipState, OutlineParams, PickPrecision};

use crate::buffer::{BufferId, MeshView};
use crate::error::RenderResult;
use crate::lighting::LightState;
use crate::pick::PickPixel;
use crate::uniforms::ObjectUniforms;

/// Render targets every backend provides, all sized like the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// What the user sees.
    Screen,
    /// One jittered supersample.
    Sample,
    /// Accumulates weighted supersamples.
    Hold,
    /// Object and primitive ids.
    Picking,
}

/// Pixel rectangle draws are restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// The whole `width` x `height` target.
    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Camera, lights and fog for one draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub orthographic: bool,
    pub viewport: Viewport,
    pub clip: ClipState,
    pub fog_color: Vec3,
    pub light: LightState,
    pub pick_precision: PickPrecision,
}

impl FrameState {
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// One scene object to draw: a buffer view plus the instance it is drawn at.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    /// Written into the picking target's alpha channel.
    pub object_id: u32,
    pub mesh: MeshView<'a>,
    pub instance: Option<Mat4>,
    pub uniforms: ObjectUniforms,
    /// Restricts the draw to these primitive slots.
    pub slots: Option<&'a [u32]>,
}

impl DrawItem<'_> {
    /// Instance matrix times buffer matrix.
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        self.uniforms.model
    }

    /// Returns true if primitive `slot` is drawn.
    #[must_use]
    pub fn includes(&self, slot: usize) -> bool {
        self.slots
            .is_none_or(|slots| u32::try_from(slot).is_ok_and(|s| slots.contains(&s)))
    }
}

/// A rasterizer with the four viewer targets.
///
/// Draws use the pass given by each item's [`MeshView::target`]: model items
/// are shaded, wireframe items drawn as edges, picking items written as ids.
pub trait RenderBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Resizes every target. Contents are undefined afterwards.
    fn resize(&mut self, width: u32, height: u32);

    /// Current target size in device pixels.
    fn size(&self) -> (u32, u32);

    /// Switches the picking target format and returns the precision now in
    /// use, which is lower than `precision` when the device cannot store it.
    fn set_pick_precision(&mut self, precision: PickPrecision) -> PickPrecision;

    /// Clears color and depth of `target`.
    fn clear(&mut self, target: RenderTarget, color: Vec4);

    /// Clears only the depth of `target`.
    fn clear_depth(&mut self, target: RenderTarget);

    /// Draws `items` into `target` with depth testing.
    fn draw(&mut self, target: RenderTarget, frame: &FrameState, items: &[DrawItem<'_>]) -> RenderResult<()>;

    /// Draws line segments (helpers such as the bounding box).
    fn draw_lines(
        &mut self,
        target: RenderTarget,
        frame: &FrameState,
        segments: &[[Vec3; 2]],
        color: Vec3,
    ) -> RenderResult<()>;

    /// Composes an edge outline around `items` over `target`.
    ///
    /// Edges where the items are in front of the depth already in `target`
    /// use the visible color, the rest the hidden color.
    fn draw_outline(
        &mut self,
        target: RenderTarget,
        frame: &FrameState,
        items: &[DrawItem<'_>],
        params: &OutlineParams,
    ) -> RenderResult<()>;

    /// Adds `source * weight` onto `dest`.
    fn composite(&mut self, source: RenderTarget, dest: RenderTarget, weight: f32) -> RenderResult<()>;

    /// Reads a row-major block of the picking target.
    fn read_pick_block(&mut self, x: u32, y: u32, width: u32, height: u32) -> RenderResult<Vec<PickPixel>>;

    /// Reads `target` as tightly packed RGBA8, top row first.
    fn read_pixels(&mut self, target: RenderTarget) -> RenderResult<Vec<u8>>;

    /// Frees any per-buffer resources.
    fn release(&mut self, buffer: BufferId);

    /// Shows the screen target, for backends with a window.
    fn present(&mut self) -> RenderResult<()> {
        Ok(())
    }
}
