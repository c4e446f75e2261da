//! High-level image operations.
//!
//! These functions combine calculations with backend execution. Engines
//! call [`plan_thumbnail`] once they know the native size of the source, so
//! every engine produces the same geometry.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{crop_box, thumb_scale_size};
use super::params::{ThumbnailParams, ThumbnailPlan};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &dyn ImageBackend, path: &Path) -> Result<Dimensions> {
    let dims = backend.identify(path)?;
    if dims.width == 0 || dims.height == 0 {
        return Err(BackendError::EmptyImage(path.display().to_string()));
    }
    Ok(dims)
}

/// Plan the resize and crop for a source of `native` size.
///
/// In orientation-preserving mode the requested axes are swapped for
/// portrait sources, so "larger" always lands on the dominant edge.
pub fn plan_thumbnail(native: Dimensions, params: &ThumbnailParams) -> Result<ThumbnailPlan> {
    if native.width == 0 || native.height == 0 {
        return Err(BackendError::EmptyImage(params.source.display().to_string()));
    }

    let (width, height) = if params.preserve_orientation && native.is_portrait() {
        (params.height, params.width)
    } else {
        (params.width, params.height)
    };

    let resize = thumb_scale_size(native, width, height);
    let crop = match (width, height) {
        (Some(w), Some(h)) => Some(crop_box(resize, Dimensions::new(w, h), params.crop)),
        _ => None,
    };

    Ok(ThumbnailPlan { resize, crop })
}
