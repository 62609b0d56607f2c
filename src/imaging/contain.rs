//! Contain-fit resize pipeline
//!
//! The source image is scaled to the largest size that fits the canvas while
//! keeping its aspect ratio, then centered on a canvas filled with the
//! letterbox background. Small images are scaled up as well.

use std::io::Cursor;

use bytes::Bytes;
use image::{
    imageops, DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat, Rgba, RgbaImage,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ImageSettings;

/// Image pipeline errors
#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("Invalid canvas: {0}")]
    Canvas(String),
    #[error("Image task failed: {0}")]
    Task(String),
}

/// Re-encoded image ready for upload
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Bytes,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Dimensions of the scaled content inside the letterbox
    pub content_width: u32,
    pub content_height: u32,
}

/// Size of the scaled content for a contain fit of `src` into `bounds`
///
/// Each side is rounded to the nearest pixel and clamped to `1..=bound`.
pub fn contain_dimensions(
    src_width: u32,
    src_height: u32,
    box_width: u32,
    box_height: u32,
) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (0, 0);
    }

    let ratio = f64::min(
        box_width as f64 / src_width as f64,
        box_height as f64 / src_height as f64,
    );

    let width = (src_width as f64 * ratio).round() as u32;
    let height = (src_height as f64 * ratio).round() as u32;

    (width.clamp(1, box_width.max(1)), height.clamp(1, box_height.max(1)))
}

/// Scale `image` into the configured canvas and letterbox the remainder
pub fn fit_contain(image: &DynamicImage, settings: &ImageSettings) -> DynamicImage {
    let (src_width, src_height) = image.dimensions();
    let (width, height) =
        contain_dimensions(src_width, src_height, settings.width, settings.height);

    let scaled = if (width, height) == (src_width, src_height) {
        image.to_rgba8()
    } else {
        image
            .resize_exact(width, height, imageops::FilterType::Lanczos3)
            .to_rgba8()
    };

    let mut canvas =
        RgbaImage::from_pixel(settings.width, settings.height, Rgba(settings.background));
    let x = settings.width.saturating_sub(width) / 2;
    let y = settings.height.saturating_sub(height) / 2;
    imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);

    debug!(
        src_width = src_width,
        src_height = src_height,
        content_width = width,
        content_height = height,
        offset_x = x,
        offset_y = y,
        "Contain fit computed"
    );

    DynamicImage::ImageRgba8(canvas)
}

/// Decode, fit and re-encode on the current thread
pub fn process_image_blocking(
    data: &[u8],
    settings: &ImageSettings,
) -> Result<ProcessedImage, ImagingError> {
    settings.validate().map_err(ImagingError::Canvas)?;

    let source_format = image::guess_format(data).map_err(ImagingError::Decode)?;
    let source = image::load_from_memory_with_format(data, source_format)
        .map_err(ImagingError::Decode)?;
    let (src_width, src_height) = source.dimensions();
    let (content_width, content_height) =
        contain_dimensions(src_width, src_height, settings.width, settings.height);

    let fitted = fit_contain(&source, settings);

    let (format, bytes) = encode_like_source(&fitted, source_format, settings.jpeg_quality)?;

    Ok(ProcessedImage {
        bytes: Bytes::from(bytes),
        format,
        width: settings.width,
        height: settings.height,
        content_width,
        content_height,
    })
}

/// Decode, fit and re-encode on the blocking pool
pub async fn process_image(
    data: Bytes,
    settings: ImageSettings,
) -> Result<ProcessedImage, ImagingError> {
    tokio::task::spawn_blocking(move || process_image_blocking(&data, &settings))
        .await
        .map_err(|e| ImagingError::Task(e.to_string()))?
}

/// Re-encode in the source format, or PNG when the source format has no
/// encoder or rejects the canvas
fn encode_like_source(
    image: &DynamicImage,
    source: ImageFormat,
    jpeg_quality: u8,
) -> Result<(ImageFormat, Vec<u8>), ImagingError> {
    if source.can_write() {
        match encode(image, source, jpeg_quality) {
            Ok(bytes) => return Ok((source, bytes)),
            Err(e) => {
                warn!(source = ?source, error = %e, "Re-encoding failed, falling back to PNG")
            }
        }
    } else {
        warn!(source = ?source, "Source format cannot be re-encoded, falling back to PNG");
    }

    Ok((ImageFormat::Png, encode(image, ImageFormat::Png, jpeg_quality)?))
}

fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, ImagingError> {
    let mut cursor = Cursor::new(Vec::new());

    match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut cursor, ImageOutputFormat::Jpeg(jpeg_quality)),
        other => image.write_to(&mut cursor, ImageOutputFormat::from(other)),
    }
    .map_err(ImagingError::Encode)?;

    Ok(cursor.into_inner())
}
