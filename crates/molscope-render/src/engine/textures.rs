//! Render target textures.

use molscope_core::PickPrecision;

use crate::backend::RenderTarget;

use crate::error::{RenderError, RenderResult};

/// Depth format of every target.
pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// What `read_pixels` hands out.
pub(super) const READBACK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const TARGET_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// Picking format for a precision.
pub(super) fn pick_format(precision: PickPrecision) -> wgpu::TextureFormat {
    match precision {
        PickPrecision::Float => wgpu::TextureFormat::Rgba32Float,
        PickPrecision::Byte => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// Target formats the adapter can render to.
///
/// Downlevel adapters (GLES, WebGL) may lack renderable 32-bit float
/// formats; color falls back to 8-bit, the highlight mask to half floats
/// and picking to byte precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct TargetFormats {
    /// Screen, sample, hold and scratch targets.
    pub color: wgpu::TextureFormat,
    /// Nearest highlight depth per pixel; cleared above 1.
    pub mask: wgpu::TextureFormat,
    /// Whether `Rgba32Float` picking targets are available.
    pub float_picking: bool,
}

impl TargetFormats {
    pub fn for_adapter(adapter: &wgpu::Adapter) -> RenderResult<Self> {
        let compliant = adapter.get_downlevel_capabilities().is_webgpu_compliant();
        let renders = |format: wgpu::TextureFormat| {
            compliant
                || adapter
                    .get_texture_format_features(format)
                    .allowed_usages
                    .contains(TARGET_USAGES)
        };
        let choose = |preferred: wgpu::TextureFormat, fallback: wgpu::TextureFormat| {
            if renders(preferred) {
                Ok(preferred)
            } else if renders(fallback) {
                log::warn!("{preferred:?} targets unsupported, using {fallback:?}");
                Ok(fallback)
            } else {
                Err(RenderError::UnsupportedFormat(preferred))
            }
        };
        let formats = Self {
            color: choose(wgpu::TextureFormat::Rgba16Float, wgpu::TextureFormat::Rgba8Unorm)?,
            mask: choose(wgpu::TextureFormat::R32Float, wgpu::TextureFormat::R16Float)?,
            float_picking: renders(wgpu::TextureFormat::Rgba32Float),
        };
        if !renders(READBACK_FORMAT) {
            return Err(RenderError::UnsupportedFormat(READBACK_FORMAT));
        }
        if !formats.float_picking {
            log::warn!("float picking targets unsupported, picking at byte precision");
        }
        Ok(formats)
    }

    /// Picking precision to start with.
    pub fn default_precision(self) -> PickPrecision {
        if self.float_picking {
            PickPrecision::Float
        } else {
            PickPrecision::Byte
        }
    }

    /// The precision actually used when `requested` is asked for.
    pub fn supported_precision(self, requested: PickPrecision) -> PickPrecision {
        match requested {
            PickPrecision::Float if !self.float_picking => PickPrecision::Byte,
            other => other,
        }
    }

    /// Depth slack when comparing mask depth to scene depth.
    pub fn mask_epsilon(self) -> f32 {
        if self.mask == wgpu::TextureFormat::R32Float {
            1e-4
        } else {
            2e-3
        }
    }
}

/// Bytes per texel of a color format used here.
pub(super) fn texel_size(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::Rgba32Float => 16,
        wgpu::TextureFormat::Rgba16Float => 8,
        _ => 4,
    }
}

/// A color texture with its own depth buffer.
#[derive(Debug)]
pub(super) struct TargetTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl TargetTexture {
    fn new(device: &wgpu::Device, label: &str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let texture = create_texture(
            device,
            label,
            width,
            height,
            format,
            TARGET_USAGES,
        );
        let depth = create_texture(
            device,
            &format!("{label} depth"),
            width,
            height,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            format,
        }
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

/// The four viewer targets plus helper surfaces.
#[derive(Debug)]
pub(super) struct Targets {
    pub formats: TargetFormats,
    pub screen: TargetTexture,
    pub sample: TargetTexture,
    pub hold: TargetTexture,
    pub picking: TargetTexture,
    pub mask: TargetTexture,
    pub readback: TargetTexture,
    /// Source copy for compositing a target onto itself.
    pub scratch: TargetTexture,
}

impl Targets {
    pub fn new(
        device: &wgpu::Device,
        formats: TargetFormats,
        width: u32,
        height: u32,
        precision: PickPrecision,
    ) -> Self {
        let color = formats.color;
        let precision = formats.supported_precision(precision);
        Self {
            formats,
            screen: TargetTexture::new(device, "screen target", width, height, color),
            sample: TargetTexture::new(device, "sample target", width, height, color),
            hold: TargetTexture::new(device, "hold target", width, height, color),
            picking: TargetTexture::new(device, "picking target", width, height, pick_format(precision)),
            mask: TargetTexture::new(device, "outline mask", width, height, formats.mask),
            readback: TargetTexture::new(device, "readback target", width, height, READBACK_FORMAT),
            scratch: TargetTexture::new(device, "scratch target", width, height, color),
        }
    }

    /// Recreates the picking target in the format for `precision`, returning
    /// the precision the target now has.
    pub fn set_pick_precision(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        precision: PickPrecision,
    ) -> PickPrecision {
        let precision = self.formats.supported_precision(precision);
        let format = pick_format(precision);
        if self.picking.format != format {
            self.picking = TargetTexture::new(device, "picking target", width, height, format);
        }
        precision
    }

    pub fn get(&self, target: RenderTarget) -> &TargetTexture {
        match target {
            RenderTarget::Screen => &self.screen,
            RenderTarget::Sample => &self.sample,
            RenderTarget::Hold => &self.hold,
            RenderTarget::Picking => &self.picking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downlevel() -> TargetFormats {
        TargetFormats {
            color: wgpu::TextureFormat::Rgba8Unorm,
            mask: wgpu::TextureFormat::R16Float,
            float_picking: false,
        }
    }

    #[test]
    fn test_float_picking_falls_back_to_bytes() {
        let formats = downlevel();
        assert_eq!(formats.default_precision(), PickPrecision::Byte);
        assert_eq!(formats.supported_precision(PickPrecision::Float), PickPrecision::Byte);
        assert_eq!(formats.supported_precision(PickPrecision::Byte), PickPrecision::Byte);

        let full = TargetFormats {
            color: wgpu::TextureFormat::Rgba16Float,
            mask: wgpu::TextureFormat::R32Float,
            float_picking: true,
        };
        assert_eq!(full.default_precision(), PickPrecision::Float);
        assert_eq!(full.supported_precision(PickPrecision::Byte), PickPrecision::Byte);
    }

    #[test]
    fn test_half_float_mask_gets_wider_epsilon() {
        assert!(downlevel().mask_epsilon() > 1e-3);
        let full = TargetFormats {
            mask: wgpu::TextureFormat::R32Float,
            ..downlevel()
        };
        assert!(full.mask_epsilon() < 1e-3);
    }

    #[test]
    fn test_target_usages_cover_copies() {
        let copyable = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
        assert!(TARGET_USAGES.contains(copyable));
        assert_eq!(texel_size(pick_format(PickPrecision::Float)), 16);
        assert_eq!(texel_size(pick_format(PickPrecision::Byte)), 4);
    }
}
