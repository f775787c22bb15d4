//! Offscreen stages for tests, batch jobs and snapshots.

use std::path::Path;

use molscope_core::{MolscopeError, Result, ViewerParameters};
use molscope_render::{save_image, ImageParams, RenderBackend, SoftwareBackend, WgpuBackend};

use crate::stage::Stage;

/// A stage on the CPU backend. Always available.
pub fn software_stage(width: u32, height: u32, params: ViewerParameters) -> Stage<SoftwareBackend> {
    Stage::new(SoftwareBackend::new(width, height), params)
}

/// A stage on an offscreen wgpu device.
///
/// Fails with a render error when no adapter is available.
pub fn gpu_stage(width: u32, height: u32, params: ViewerParameters) -> Result<Stage<WgpuBackend>> {
    let backend = WgpuBackend::headless(width, height)?;
    Ok(Stage::new(backend, params))
}

/// Renders `stage` and writes the image, picking the format from the extension.
///
/// # Example
/// ```no_run
/// use molscope::{render_to_file, software_stage, ImageParams, ViewerParameters};
///
/// let mut stage = software_stage(320, 240, ViewerParameters::default());
/// render_to_file(&mut stage, "empty.png", &ImageParams::default()).unwrap();
/// ```
pub fn render_to_file<B: RenderBackend>(
    stage: &mut Stage<B>,
    path: impl AsRef<Path>,
    params: &ImageParams,
) -> Result<()> {
    let image = stage.make_image(params)?;
    save_image(path.as_ref(), &image)
        .map_err(|e| MolscopeError::RenderError(format!("failed to save image: {e}")))?;
    log::info!(
        "saved {}x{} image to {}",
        image.width(),
        image.height(),
        path.as_ref().display()
    );
    Ok(())
}

/// Renders `stage` into tightly packed RGBA8 rows, top row first.
pub fn render_to_rgba<B: RenderBackend>(stage: &mut Stage<B>, params: &ImageParams) -> Result<Vec<u8>> {
    Ok(stage.make_image(params)?.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stage_renders_background() {
        let params = ViewerParameters {
            background_color: glam::Vec3::new(1.0, 0.0, 0.0),
            ..ViewerParameters::default()
        };
        let mut stage = software_stage(8, 4, params);
        let pixels = render_to_rgba(&mut stage, &ImageParams::default()).unwrap();
        assert_eq!(pixels.len(), 8 * 4 * 4);
        assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_render_to_file_writes_png() {
        let path = std::env::temp_dir().join(format!("molscope_snapshot_{}.png", std::process::id()));
        let mut stage = software_stage(16, 16, ViewerParameters::default());
        render_to_file(&mut stage, &path, &ImageParams::default()).unwrap();
        let written = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        std::fs::remove_file(&path).ok();
        assert!(written > 0);
    }
}
