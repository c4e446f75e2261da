//! Pure Rust thumbnail engine built on the `image` crate.
//!
//! Registered under the name `pil`, the default engine.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG, GIF) | `image::ImageReader` with format guessing |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Encode | source format; JPEG through `JpegEncoder` with the configured quality |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::operations::plan_thumbnail;
use super::params::{Quality, ThumbnailParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Raster formats the engine reads and writes.
const SUPPORTED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Gif];

/// Pure Rust engine using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, returning it with its detected format.
fn load_image(path: &Path) -> Result<(DynamicImage, ImageFormat), BackendError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format().ok_or_else(|| {
        BackendError::ProcessingFailed(format!("Unknown image format: {}", path.display()))
    })?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(BackendError::ProcessingFailed(format!(
            "Unsupported image format {:?}: {}",
            format,
            path.display()
        )));
    }
    let img = reader.decode().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    })?;
    Ok((img, format))
}

/// Save in `format`, applying `quality` where the encoder supports it.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: ImageFormat,
    quality: Quality,
) -> Result<(), BackendError> {
    let encode_err = |e: image::ImageError| {
        BackendError::ProcessingFailed(format!("Encode failed for {}: {}", path.display(), e))
    };

    match format {
        ImageFormat::Jpeg => {
            let writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(writer, quality.value() as u8);
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(encode_err)
        }
        ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
            .save_with_format(path, format)
            .map_err(encode_err),
        other => img.save_with_format(path, other).map_err(encode_err),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
        let (img, format) = load_image(&params.source)?;
        let native = Dimensions::new(img.width(), img.height());
        let plan = plan_thumbnail(native, params)?;

        tracing::debug!(
            "Resize {} to {}x{}",
            params.source.display(),
            plan.resize.width,
            plan.resize.height
        );
        let resized = img.resize_exact(plan.resize.width, plan.resize.height, FilterType::Lanczos3);

        let final_img = match plan.crop {
            Some(b) => resized.crop_imm(b.left, b.top, b.width(), b.height()),
            None => resized,
        };

        save_image(&final_img, &params.output, format, params.quality)
    }
}
