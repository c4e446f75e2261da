//! Image engine trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every thumbnail
//! engine must support: identify and thumbnail. Engines are selected by
//! name through [`EngineRegistry`](super::EngineRegistry).
//!
//! | Engine | Name | Identify | Resize / crop / save |
//! |---|---|---|---|
//! | [`RustBackend`] | `pil` | `image::image_dimensions` | `image` crate, Lanczos3 |
//! | [`SipsBackend`] | `sips` | `sips -g pixelWidth/pixelHeight` | `sips -z`, crop flags |
//!
//! [`RustBackend`]: super::rust_backend::RustBackend
//! [`SipsBackend`]: super::sips_backend::SipsBackend

use super::params::ThumbnailParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unrecognized output from {tool}: {output:?}")]
    UnrecognizedOutput { tool: &'static str, output: String },
    #[error("Image has no pixels: {0}")]
    EmptyImage(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Taller than wide.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// Trait for thumbnail engines.
///
/// Every engine must implement both operations so the pipeline and the
/// tag rewriter stay engine-agnostic.
pub trait ImageBackend: Send + Sync {
    /// Get native pixel dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Read the source, resize, optionally crop, and write the output.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError>;
}
