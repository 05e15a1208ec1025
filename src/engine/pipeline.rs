// src/engine/pipeline.rs
//
// Resize helpers shared by the dimension fit and the downscale loop.

use crate::error::ReduceImageError;
use image::imageops::FilterType;
use image::DynamicImage;
use std::borrow::Cow;

#[derive(Debug)]
pub struct ResizeError {
    pub source_dims: (u32, u32),
    pub target_dims: (u32, u32),
    pub reason: String,
}

impl ResizeError {
    pub fn new(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_dims,
            target_dims,
            reason: reason.into(),
        }
    }
}

impl From<ResizeError> for ReduceImageError {
    fn from(err: ResizeError) -> Self {
        ReduceImageError::resize_failed(err.source_dims, err.target_dims, err.reason)
    }
}

/// Calculate the target size for a dimension fit.
///
/// Both sides given: exactly that size. One side: the other follows the
/// original aspect ratio. Every side is at least 1px.
pub fn calc_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    target_w: Option<u32>,
    target_h: Option<u32>,
) -> (u32, u32) {
    let (w, h) = match (target_w, target_h) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let ratio = w as f64 / orig_w.max(1) as f64;
            (w, (orig_h as f64 * ratio).round() as u32)
        }
        (None, Some(h)) => {
            let ratio = h as f64 / orig_h.max(1) as f64;
            ((orig_w as f64 * ratio).round() as u32, h)
        }
        (None, None) => (orig_w, orig_h),
    };
    (w.max(1), h.max(1))
}

/// Dimensions after applying `scale` to the original size.
///
/// Never larger than the original and never below 1px per side.
pub fn scaled_dimensions(orig_w: u32, orig_h: u32, scale: f64) -> (u32, u32) {
    let scale = scale.clamp(0.0, 1.0);
    let side = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, v.max(1));
    (side(orig_w), side(orig_h))
}

/// Lanczos3 resize to exactly `dst_width` x `dst_height`.
///
/// Borrows the input untouched when the size already matches.
pub fn resize_exact(
    img: &DynamicImage,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<Cow<'_, DynamicImage>, ResizeError> {
    let (src_width, src_height) = (img.width(), img.height());
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(ResizeError::new(
            (src_width, src_height),
            (dst_width, dst_height),
            "invalid dimensions for resize",
        ));
    }
    if (src_width, src_height) == (dst_width, dst_height) {
        return Ok(Cow::Borrowed(img));
    }
    Ok(Cow::Owned(img.resize_exact(
        dst_width,
        dst_height,
        FilterType::Lanczos3,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    mod calc_tests {
        use super::*;

        #[test]
        fn test_width_only_keeps_aspect() {
            assert_eq!(calc_resize_dimensions(1920, 1080, Some(960), None), (960, 540));
        }

        #[test]
        fn test_height_only_keeps_aspect() {
            assert_eq!(calc_resize_dimensions(1920, 1080, None, Some(540)), (960, 540));
        }

        #[test]
        fn test_both_sides_are_exact() {
            assert_eq!(calc_resize_dimensions(1920, 1080, Some(800), Some(800)), (800, 800));
        }

        #[test]
        fn test_tiny_ratio_clamps_to_one() {
            assert_eq!(calc_resize_dimensions(1000, 1, Some(10), None), (10, 1));
            assert_eq!(calc_resize_dimensions(1, 1000, Some(1), None), (1, 1000));
            assert_eq!(calc_resize_dimensions(10_000, 1, Some(1), None), (1, 1));
        }

        #[test]
        fn test_none_keeps_original() {
            assert_eq!(calc_resize_dimensions(7, 9, None, None), (7, 9));
        }
    }

    mod scale_tests {
        use super::*;

        #[test]
        fn test_scaled_dimensions_steps() {
            assert_eq!(scaled_dimensions(1920, 1080, 1.0), (1920, 1080));
            assert_eq!(scaled_dimensions(1920, 1080, 0.9), (1728, 972));
            assert_eq!(scaled_dimensions(100, 100, 0.81), (81, 81));
        }

        #[test]
        fn test_scaled_dimensions_floor_and_ceiling() {
            assert_eq!(scaled_dimensions(3, 3, 0.01), (1, 1));
            assert_eq!(scaled_dimensions(3, 3, 4.0), (3, 3));
        }

        #[test]
        fn test_scaled_dimensions_non_increasing() {
            let mut prev = (500, 333);
            let mut scale = 1.0;
            while scale >= 0.1 {
                let next = scaled_dimensions(500, 333, scale);
                assert!(next.0 <= prev.0 && next.1 <= prev.1);
                prev = next;
                scale *= 0.9;
            }
        }
    }

    #[test]
    fn test_resize_exact_changes_size() {
        let img = create_test_image(40, 20);
        let out = resize_exact(&img, 10, 5).unwrap();
        assert_eq!((out.width(), out.height()), (10, 5));
        assert!(matches!(out, Cow::Owned(_)));
    }

    #[test]
    fn test_resize_exact_same_size_borrows() {
        let img = create_test_image(8, 8);
        let out = resize_exact(&img, 8, 8).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_resize_exact_rejects_zero() {
        let img = create_test_image(8, 8);
        let err = resize_exact(&img, 0, 8).unwrap_err();
        assert_eq!(err.target_dims, (0, 8));
        let converted: ReduceImageError = err.into();
        assert!(matches!(converted, ReduceImageError::ResizeFailed { .. }));
    }
}
