//! Image engines and geometry.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` or `sips -g pixelWidth -g pixelHeight` |
//! | **Resize** | Lanczos3 (`image`) or `sips -z` |
//! | **Crop** | `crop_imm` or `sips --cropToHeightWidth` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`] + [`SipsBackend`]
//! - **Operations**: Geometry planning shared by every engine
//! - **Registry**: engine lookup by configured name

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod registry;
pub mod rust_backend;
pub mod sips_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{CropBox, CropType, crop_box, scale_aspect, scale_floor, thumb_scale_size};
pub use operations::{get_dimensions, plan_thumbnail};
pub use params::{Quality, ThumbnailParams, ThumbnailPlan};
pub use registry::EngineRegistry;
pub use rust_backend::RustBackend;
pub use sips_backend::SipsBackend;
