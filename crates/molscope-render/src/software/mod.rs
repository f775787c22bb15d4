//! A CPU rasterizer implementing [`RenderBackend`].
//!
//! Used for headless rendering without a GPU and by the test suite. Colors are
//! kept as linear `f32` RGBA so supersample accumulation does not band.

mod outline;
mod raster;

use glam::{Vec3, Vec4};

use molscope_core::{OutlineParams, PickPrecision};

use crate::backend::{DrawItem, FrameState, RenderBackend, RenderTarget};
use crate::buffer::{BufferId, MeshTarget};
use crate::error::{RenderError, RenderResult};
use crate::lighting::apply_fog;
use crate::pick::{encode_pick_pixel, PickPixel};
use raster::{rasterize, Raster};

/// Color plus depth.
#[derive(Debug, Clone)]
struct Surface {
    color: Vec<Vec4>,
    depth: Vec<f32>,
}

impl Surface {
    fn new(len: usize) -> Self {
        Self {
            color: vec![Vec4::ZERO; len],
            depth: vec![1.0; len],
        }
    }
}

/// CPU backend with four `width x height` surfaces.
#[derive(Debug, Clone)]
pub struct SoftwareBackend {
    width: u32,
    height: u32,
    pick_precision: PickPrecision,
    screen: Surface,
    sample: Surface,
    hold: Surface,
    picking: Surface,
}

impl SoftwareBackend {
    /// Creates a backend with cleared targets.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pick_precision: PickPrecision::Float,
            screen: Surface::new(len),
            sample: Surface::new(len),
            hold: Surface::new(len),
            picking: Surface::new(len),
        }
    }

    fn surface(&self, target: RenderTarget) -> &Surface {
        match target {
            RenderTarget::Screen => &self.screen,
            RenderTarget::Sample => &self.sample,
            RenderTarget::Hold => &self.hold,
            RenderTarget::Picking => &self.picking,
        }
    }

    fn surface_mut(&mut self, target: RenderTarget) -> &mut Surface {
        match target {
            RenderTarget::Screen => &mut self.screen,
            RenderTarget::Sample => &mut self.sample,
            RenderTarget::Hold => &mut self.hold,
            RenderTarget::Picking => &mut self.picking,
        }
    }

    /// Raw linear color of one pixel, for inspection.
    #[must_use]
    pub fn pixel(&self, target: RenderTarget, x: u32, y: u32) -> Option<Vec4> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.surface(target)
            .color
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Depth of one pixel, 1.0 where nothing was drawn.
    #[must_use]
    pub fn depth(&self, target: RenderTarget, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.surface(target)
            .depth
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

}

/// Emulates the storage format of the picking target.
fn quantize(pixel: PickPixel, precision: PickPrecision) -> Vec4 {
    let v = Vec4::from_array(pixel);
    match precision {
        PickPrecision::Float => v,
        PickPrecision::Byte => (v * 255.0).round().clamp(Vec4::ZERO, Vec4::splat(255.0)) / 255.0,
    }
}

impl RenderBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        let precision = self.pick_precision;
        *self = Self::new(width, height);
        self.pick_precision = precision;
        log::debug!("software backend resized to {width}x{height}");
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_pick_precision(&mut self, precision: PickPrecision) -> PickPrecision {
        self.pick_precision = precision;
        precision
    }

    fn clear(&mut self, target: RenderTarget, color: Vec4) {
        let surface = self.surface_mut(target);
        surface.color.fill(color);
        surface.depth.fill(1.0);
    }

    fn clear_depth(&mut self, target: RenderTarget) {
        self.surface_mut(target).depth.fill(1.0);
    }

    fn draw(&mut self, target: RenderTarget, frame: &FrameState, items: &[DrawItem<'_>]) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::EmptyTarget);
        }
        let width = self.width;
        for item in items {
            let buffer = item.mesh.buffer;
            if buffer.is_disposed() {
                log::error!("drawing disposed buffer {}", buffer.id());
                continue;
            }
            match item.mesh.target {
                MeshTarget::Picking => {
                    let object_id = item.object_id;
                    let precision = self.pick_precision;
                    let surface = self.surface_mut(target);
                    rasterize(frame, width, item, false, |f| {
                        if f.depth < surface.depth[f.pixel] {
                            let slot = u32::try_from(f.slot).unwrap_or(u32::MAX);
                            surface.depth[f.pixel] = f.depth;
                            surface.color[f.pixel] =
                                quantize(encode_pick_pixel(slot, object_id, precision), precision);
                        }
                    });
                }
                pass @ (MeshTarget::Model | MeshTarget::Wireframe) => {
                    let wireframe = pass == MeshTarget::Wireframe;
                    let opacity = buffer.params().opacity;
                    let surface = self.surface_mut(target);
                    rasterize(frame, width, item, wireframe, |f| {
                        if f.depth >= surface.depth[f.pixel] {
                            return;
                        }
                        let (c1, c2) = buffer.colors(f.slot);
                        let base = if f.second_half { c2 } else { c1 };
                        let lit = if wireframe {
                            base
                        } else {
                            frame.light.shade(base, f.world, f.normal, frame.camera_position, f.back_face)
                        };
                        let view_depth = -frame.view.transform_point3(f.world).z;
                        let color = apply_fog(lit, view_depth, &frame.clip, frame.fog_color);
                        let dst = surface.color[f.pixel];
                        surface.color[f.pixel] = dst.lerp(color.extend(1.0), opacity);
                        if opacity >= 1.0 {
                            surface.depth[f.pixel] = f.depth;
                        }
                    });
                }
            }
        }
        Ok(())
    }

    fn draw_lines(
        &mut self,
        target: RenderTarget,
        frame: &FrameState,
        segments: &[[Vec3; 2]],
        color: Vec3,
    ) -> RenderResult<()> {
        let raster = Raster::new(frame, self.width);
        let surface = self.surface_mut(target);
        for [a, b] in segments {
            raster::line(&raster, *a, *b, |pixel, depth, _| {
                if depth < surface.depth[pixel] {
                    surface.depth[pixel] = depth;
                    surface.color[pixel] = color.extend(1.0);
                }
            });
        }
        Ok(())
    }

    fn draw_outline(
        &mut self,
        target: RenderTarget,
        frame: &FrameState,
        items: &[DrawItem<'_>],
        params: &OutlineParams,
    ) -> RenderResult<()> {
        let (width, height) = (self.width, self.height);
        let mut mask = vec![f32::INFINITY; width as usize * height as usize];
        for item in items {
            rasterize(frame, width, item, false, |f| {
                mask[f.pixel] = mask[f.pixel].min(f.depth);
            });
        }
        let surface = self.surface_mut(target);
        outline::compose(
            &mut surface.color,
            &surface.depth,
            &mask,
            width,
            height,
            params,
        );
        Ok(())
    }

    fn composite(&mut self, source: RenderTarget, dest: RenderTarget, weight: f32) -> RenderResult<()> {
        if source == dest {
            for c in &mut self.surface_mut(dest).color {
                *c *= 1.0 + weight;
            }
            return Ok(());
        }
        let src = self.surface(source).color.clone();
        for (d, s) in self.surface_mut(dest).color.iter_mut().zip(src) {
            *d += s * weight;
        }
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
        let stride = self.width as usize;
        let picking = &self.picking.color;
        Ok((y..y + height)
            .flat_map(|row| (x..x + width).map(move |col| picking[row as usize * stride + col as usize].to_array()))
            .collect())
    }

    fn read_pixels(&mut self, target: RenderTarget) -> RenderResult<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::EmptyTarget);
        }
        Ok(self
            .surface(target)
            .color
            .iter()
            .flat_map(|c| {
                c.to_array()
                    .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            })
            .collect())
    }

    fn release(&mut self, buffer: BufferId) {
        log::debug!("software backend has no resources for buffer {buffer}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_and_read() {
        let mut backend = SoftwareBackend::new(4, 3);
        backend.clear(RenderTarget::Screen, Vec4::new(1.0, 0.0, 0.0, 1.0));
        let pixels = backend.read_pixels(RenderTarget::Screen).unwrap();
        assert_eq!(pixels.len(), 4 * 3 * 4);
        assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_composite_accumulates() {
        let mut backend = SoftwareBackend::new(2, 2);
        backend.clear(RenderTarget::Hold, Vec4::ZERO);
        backend.clear(RenderTarget::Sample, Vec4::ONE);
        backend.composite(RenderTarget::Sample, RenderTarget::Hold, 0.25).unwrap();
        backend.composite(RenderTarget::Sample, RenderTarget::Hold, 0.75).unwrap();
        let p = backend.pixel(RenderTarget::Hold, 1, 1).unwrap();
        assert!((p.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pick_block_bounds() {
        let mut backend = SoftwareBackend::new(10, 10);
        assert_eq!(backend.read_pick_block(5, 5, 5, 5).unwrap().len(), 25);
        assert!(matches!(
            backend.read_pick_block(6, 0, 5, 5),
            Err(RenderError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_resize_keeps_precision() {
        let mut backend = SoftwareBackend::new(2, 2);
        assert_eq!(backend.set_pick_precision(PickPrecision::Byte), PickPrecision::Byte);
        backend.resize(8, 6);
        assert_eq!(backend.size(), (8, 6));
        assert_eq!(backend.pick_precision, PickPrecision::Byte);
        assert!(backend.pixel(RenderTarget::Screen, 7, 5).is_some());
        assert!(backend.pixel(RenderTarget::Screen, 8, 5).is_none());
    }
}
