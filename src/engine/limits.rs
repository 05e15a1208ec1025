// src/engine/limits.rs
//
// Per-upload limits, checked before and right after header inspection.

use crate::engine::{MAX_PIXELS, MAX_TARGET_BYTES};
use crate::error::ReduceImageError;
use crate::ops::{ReduceRequest, SizingMode};

/// Default upload cap: 16MB, matching the web form's request limit.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Default cap on an exact target size: 64MB.
pub const DEFAULT_MAX_TARGET_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_upload_bytes: u64,
    /// Never above the engine-wide [`MAX_PIXELS`].
    pub max_pixels: u64,
    /// Largest exact target a request may ask for. Never above [`MAX_TARGET_BYTES`].
    pub max_target_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_pixels: MAX_PIXELS,
            max_target_bytes: DEFAULT_MAX_TARGET_BYTES,
        }
    }
}

impl UploadLimits {
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_max_pixels(mut self, pixels: u64) -> Self {
        self.max_pixels = pixels.min(MAX_PIXELS);
        self
    }

    pub fn with_max_target_bytes(mut self, bytes: u64) -> Self {
        self.max_target_bytes = bytes.min(MAX_TARGET_BYTES);
        self
    }

    pub fn enforce_source_len(&self, len: u64) -> Result<(), ReduceImageError> {
        if len > self.max_upload_bytes {
            return Err(ReduceImageError::upload_too_large(len, self.max_upload_bytes));
        }
        Ok(())
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<(), ReduceImageError> {
        let pixels = width as u64 * height as u64;
        let limit = self.max_pixels.min(MAX_PIXELS);
        if pixels > limit {
            return Err(ReduceImageError::pixel_count_exceeds_limit(pixels, limit));
        }
        Ok(())
    }

    /// Reject exact targets the grow path would have to pad past the limit.
    ///
    /// Max-size ceilings never pad, so any value passes.
    pub fn enforce_request(&self, request: &ReduceRequest) -> Result<(), ReduceImageError> {
        if let Some(SizingMode::Exact(target)) = request.sizing {
            let limit = self.max_target_bytes.min(MAX_TARGET_BYTES);
            if target > limit {
                return Err(ReduceImageError::target_too_large(target, limit));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = UploadLimits::default();
        assert!(limits.enforce_source_len(DEFAULT_MAX_UPLOAD_BYTES).is_ok());
        let err = limits
            .enforce_source_len(DEFAULT_MAX_UPLOAD_BYTES + 1)
            .unwrap_err();
        assert!(matches!(err, ReduceImageError::UploadTooLarge { .. }));
    }

    #[test]
    fn test_custom_pixel_limit() {
        let limits = UploadLimits::default().with_max_pixels(100);
        assert!(limits.enforce_pixels(10, 10).is_ok());
        assert!(matches!(
            limits.enforce_pixels(11, 10),
            Err(ReduceImageError::PixelCountExceedsLimit { pixels: 110, max: 100 })
        ));
    }

    #[test]
    fn test_pixel_limit_never_exceeds_engine_max() {
        let limits = UploadLimits::default().with_max_pixels(u64::MAX);
        assert_eq!(limits.max_pixels, MAX_PIXELS);
    }

    mod target_limit_tests {
        use super::*;

        #[test]
        fn test_exact_target_at_limit_passes() {
            let limits = UploadLimits::default();
            let request =
                ReduceRequest::new().with_sizing(SizingMode::Exact(DEFAULT_MAX_TARGET_BYTES));
            assert!(limits.enforce_request(&request).is_ok());
        }

        #[test]
        fn test_exact_target_over_limit_rejected() {
            let limits = UploadLimits::default().with_max_target_bytes(1000);
            let request = ReduceRequest::new().with_sizing(SizingMode::Exact(1001));
            assert!(matches!(
                limits.enforce_request(&request),
                Err(ReduceImageError::TargetTooLarge { target: 1001, max: 1000 })
            ));
        }

        #[test]
        fn test_max_size_ceiling_is_not_a_target() {
            let limits = UploadLimits::default().with_max_target_bytes(1000);
            let request = ReduceRequest::new().with_sizing(SizingMode::AtMost(u64::MAX));
            assert!(limits.enforce_request(&request).is_ok());
            assert!(limits.enforce_request(&ReduceRequest::new()).is_ok());
        }

        #[test]
        fn test_target_limit_never_exceeds_engine_max() {
            let limits = UploadLimits::default().with_max_target_bytes(u64::MAX);
            assert_eq!(limits.max_target_bytes, MAX_TARGET_BYTES);
        }
    }
}
