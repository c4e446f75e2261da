//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the thumbnail pipeline (which decides what images to
//! create) and the [`backend`](super::backend) (which does the actual pixel
//! work). This separation allows swapping engines (e.g. for testing with a
//! mock) without changing pipeline logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`ThumbnailParams`]: Full specification for a thumbnail: source, output, requested
//!   axes, orientation flag, crop type, quality.
//! - [`ThumbnailPlan`]: Resolved geometry for one source: resize size and optional crop box.

use super::backend::Dimensions;
use super::calculations::{CropBox, CropType};
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Parameters for a thumbnail operation (resize + optional crop).
///
/// At least one of `width`/`height` is set. When `preserve_orientation` is
/// true the axes hold the larger/smaller edge for a landscape source and are
/// swapped by the planner for portrait sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub preserve_orientation: bool,
    pub crop: CropType,
    pub quality: Quality,
}

/// Geometry computed for a concrete source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailPlan {
    pub resize: Dimensions,
    /// Present only when both axes were requested.
    pub crop: Option<CropBox>,
}
