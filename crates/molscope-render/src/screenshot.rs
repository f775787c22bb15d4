//! Image export for rendered frames.

use image::{ImageBuffer, Rgba, RgbaImage};
use std::path::Path;

/// Options for [`crate::Viewer::make_image`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageParams {
    /// Supersample level used for this image only.
    pub sample_level: Option<i32>,
    /// Clears to a fully transparent background (PNG only).
    pub transparent: bool,
    /// Crops to the pixels that differ from the background.
    pub trim: bool,
}

/// Wraps tightly packed RGBA8 rows, top row first.
pub fn rgba_image(data: Vec<u8>, width: u32, height: u32) -> Result<RgbaImage, ScreenshotError> {
    ImageBuffer::from_raw(width, height, data).ok_or(ScreenshotError::InvalidImageData)
}

/// Crops `image` to the smallest rectangle holding every pixel not equal to `background`.
///
/// An image that is all background is returned unchanged.
#[must_use]
pub fn trim_image(image: &RgbaImage, background: Rgba<u8>) -> RgbaImage {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if *pixel == background {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    match bounds {
        Some((x0, y0, x1, y1)) => {
            image::imageops::crop_imm(image, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
        }
        None => image.clone(),
    }
}

/// Saves an image, picking the format from the file extension.
///
/// # Errors
/// Returns an error if the file cannot be written or the format is unsupported.
pub fn save_image(filename: impl AsRef<Path>, image: &RgbaImage) -> Result<(), ScreenshotError> {
    let path = filename.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => image.save_with_format(path, image::ImageFormat::Png)?,
        "jpg" | "jpeg" => {
            // JPEG has no alpha
            let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            rgb.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => return Err(ScreenshotError::UnsupportedFormat(extension)),
    }
    log::debug!("saved {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}

/// Encodes an image as PNG in memory.
pub fn save_to_buffer(image: &RgbaImage) -> Result<Vec<u8>, ScreenshotError> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Error type for image export.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data")]
    InvalidImageData,

    #[error(transparent)]
    Render(#[from] crate::error::RenderError),
}
