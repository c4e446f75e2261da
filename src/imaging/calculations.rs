//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// How a thumbnail is cropped once it has been scaled to cover the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropType {
    #[default]
    TopLeft,
    Center,
    BottomRight,
}

impl CropType {
    /// Parse a configuration value (`topleft`, `center`, `bottomright`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "topleft" => Some(Self::TopLeft),
            "center" => Some(Self::Center),
            "bottomright" => Some(Self::BottomRight),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "topleft",
            Self::Center => "center",
            Self::BottomRight => "bottomright",
        }
    }
}

/// Crop rectangle in pixel coordinates of the scaled image.
///
/// `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Scale `a` by `to / from`, rounding up to the nearest integer.
///
/// # Examples
/// ```
/// # use sitepix::imaging::scale_aspect;
/// assert_eq!(scale_aspect(100, 3, 7), 234);
/// ```
pub fn scale_aspect(a: u32, from: u32, to: u32) -> u32 {
    (u64::from(a) * u64::from(to)).div_ceil(u64::from(from)) as u32
}

/// Scale `a` by `to / from`, truncating.
///
/// Used for the `width`/`height` attributes written into markup, where
/// the rendered value must never exceed the true proportion.
pub fn scale_floor(a: u32, from: u32, to: u32) -> u32 {
    (u64::from(a) * u64::from(to) / u64::from(from)) as u32
}

/// Size to resize an image to before an optional crop.
///
/// With a single axis the other one is derived from the original aspect
/// ratio. With both axes, the axis that makes the result cover the whole
/// requested box is kept exact and the other one is derived, so a crop can
/// follow. With neither axis the original size is returned.
pub fn thumb_scale_size(
    original: Dimensions,
    width: Option<u32>,
    height: Option<u32>,
) -> Dimensions {
    let Dimensions {
        width: orig_w,
        height: orig_h,
    } = original;

    let (width, height) = match (width, height) {
        (None, None) => return original,
        (None, Some(h)) => (scale_aspect(orig_w, orig_h, h), h),
        (Some(w), None) => (w, scale_aspect(orig_h, orig_w, w)),
        (Some(w), Some(h)) => {
            if u64::from(orig_w) * u64::from(h) >= u64::from(orig_h) * u64::from(w) {
                (scale_aspect(orig_w, orig_h, h), h)
            } else {
                (w, scale_aspect(orig_h, orig_w, w))
            }
        }
    };

    Dimensions { width, height }
}

/// Crop rectangle selecting a `target` box out of a `scaled` image.
///
/// Shifts use integer division for `center`.
pub fn crop_box(scaled: Dimensions, target: Dimensions, crop: CropType) -> CropBox {
    let spare_w = scaled.width.saturating_sub(target.width);
    let spare_h = scaled.height.saturating_sub(target.height);

    let (left, top) = match crop {
        CropType::TopLeft => (0, 0),
        CropType::Center => (spare_w / 2, spare_h / 2),
        CropType::BottomRight => (spare_w, spare_h),
    };

    CropBox {
        left,
        top,
        right: left + target.width,
        bottom: top + target.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    // =========================================================================
    // scale_aspect / scale_floor
    // =========================================================================

    #[test]
    fn scale_aspect_rounds_up() {
        // 100 * 7 / 3 = 233.33
        assert_eq!(scale_aspect(100, 3, 7), 234);
    }

    #[test]
    fn scale_aspect_exact_ratio() {
        assert_eq!(scale_aspect(200, 100, 25), 50);
    }

    #[test]
    fn scale_aspect_does_not_overflow_u32() {
        assert_eq!(scale_aspect(60_000, 60_000, 70_000), 70_000);
    }

    #[test]
    fn scale_floor_truncates() {
        // 50 * 50 / 101 = 24.75
        assert_eq!(scale_floor(50, 101, 50), 24);
        assert_eq!(scale_floor(50, 100, 50), 25);
    }

    // =========================================================================
    // thumb_scale_size
    // =========================================================================

    #[test]
    fn width_only_derives_height() {
        assert_eq!(thumb_scale_size(dims(200, 100), Some(50), None), dims(50, 25));
    }

    #[test]
    fn height_only_derives_width() {
        assert_eq!(thumb_scale_size(dims(200, 100), None, Some(25)), dims(50, 25));
    }

    #[test]
    fn both_axes_keep_height_when_target_is_narrower() {
        // 200*60 = 12000 >= 100*50 = 5000 → width derived from height
        assert_eq!(
            thumb_scale_size(dims(200, 100), Some(50), Some(60)),
            dims(120, 60)
        );
    }

    #[test]
    fn both_axes_keep_width_when_target_is_wider() {
        // 100*50 = 5000 < 200*100 = 20000 → height derived from width
        assert_eq!(
            thumb_scale_size(dims(100, 200), Some(100), Some(50)),
            dims(100, 200)
        );
    }

    #[test]
    fn both_axes_cover_requested_box() {
        let scaled = thumb_scale_size(dims(640, 480), Some(100), Some(100));
        assert!(scaled.width >= 100 && scaled.height >= 100);
        assert_eq!(scaled, dims(134, 100));
    }

    #[test]
    fn no_axes_returns_original() {
        assert_eq!(thumb_scale_size(dims(30, 40), None, None), dims(30, 40));
    }

    // =========================================================================
    // crop_box
    // =========================================================================

    #[test]
    fn crop_center() {
        let b = crop_box(dims(120, 60), dims(50, 60), CropType::Center);
        assert_eq!(
            b,
            CropBox {
                left: 35,
                top: 0,
                right: 85,
                bottom: 60
            }
        );
    }

    #[test]
    fn crop_center_floors_odd_spare() {
        let b = crop_box(dims(121, 61), dims(50, 50), CropType::Center);
        assert_eq!((b.left, b.top), (35, 5));
    }

    #[test]
    fn crop_topleft_starts_at_origin() {
        let b = crop_box(dims(120, 60), dims(50, 60), CropType::TopLeft);
        assert_eq!((b.left, b.top, b.right, b.bottom), (0, 0, 50, 60));
    }

    #[test]
    fn crop_bottomright_takes_far_corner() {
        let b = crop_box(dims(120, 80), dims(50, 60), CropType::BottomRight);
        assert_eq!((b.left, b.top, b.right, b.bottom), (70, 20, 120, 80));
        assert_eq!((b.width(), b.height()), (50, 60));
    }

    #[test]
    fn crop_type_parse() {
        assert_eq!(CropType::parse("center"), Some(CropType::Center));
        assert_eq!(CropType::parse("topleft"), Some(CropType::TopLeft));
        assert_eq!(CropType::parse("bottomright"), Some(CropType::BottomRight));
        assert_eq!(CropType::parse("middle"), None);
        assert_eq!(CropType::BottomRight.as_str(), "bottomright");
    }
}
