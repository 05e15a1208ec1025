// src/engine/encoder.rs
//
// Encoder primitives: JPEG (mozjpeg), PNG (oxipng), WebP (libwebp),
// and a plain image-crate path for everything else.
// Each call produces one complete, decodable stream held in memory.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::MAX_DIMENSION;
use crate::error::ReduceImageError;
use crate::ops::OutputFormat;
use image::{DynamicImage, ImageFormat, RgbImage};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;

/// Strongest PNG compression level.
pub const PNG_MAX_LEVEL: u8 = 9;
/// Level used when a PNG is encoded without a byte constraint.
pub const PNG_DEFAULT_LEVEL: u8 = 6;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

fn rgb_view(img: &DynamicImage) -> Cow<'_, RgbImage> {
    // Zero-copy when already RGB8
    match img {
        DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
        _ => Cow::Owned(img.to_rgb8()),
    }
}

fn ensure_encodable(w: u32, h: u32) -> EngineResult<()> {
    if w == 0 || h == 0 {
        return Err(ReduceImageError::internal_panic(
            "Invalid image dimensions: width or height is zero",
        ));
    }
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(ReduceImageError::dimension_exceeds_limit(
            w.max(h),
            MAX_DIMENSION,
        ));
    }
    Ok(())
}

/// Encode to JPEG using mozjpeg at `quality` (clamped to 1..=100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
        let rgb = rgb_view(img);
        let (w, h) = rgb.dimensions();
        ensure_encodable(w, h)?;

        let pixels: &[u8] = rgb.as_raw();
        if pixels.len() != (w as usize) * (h as usize) * 3 {
            return Err(ReduceImageError::corrupted_image());
        }

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(quality as f32);

        // Full-resolution chroma above 90 so quality 100 is really the largest encode.
        if quality >= 90 {
            comp.set_chroma_sampling_pixel_sizes((1, 1), (1, 1));
        } else {
            comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        }
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

        let mut output = Vec::with_capacity((w as usize * h as usize * 3 / 10).max(4096));
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                ReduceImageError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;

            let stride = w as usize * 3;
            for row in pixels.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    ReduceImageError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                ReduceImageError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }

        Ok(output)
    })
}

/// Map a 0..=9 compression level onto libdeflate's 0..=12 scale.
pub fn png_deflate_level(level: u8) -> u8 {
    let level = level.min(PNG_MAX_LEVEL) as u32;
    ((level * 12 + 4) / 9) as u8
}

fn png_options(level: u8) -> oxipng::Options {
    let level = level.min(PNG_MAX_LEVEL);
    let mut options = oxipng::Options::from_preset(if level >= 7 { 4 } else { 2 });
    options.deflater = oxipng::Deflater::Libdeflater {
        compression: png_deflate_level(level),
    };
    if level == 0 {
        options.filters = oxipng::indexset! { oxipng::FilterStrategy::NONE };
    }
    options.strip = oxipng::StripChunks::None;
    // Keep the requested level even when the result is larger than the input.
    options.force = true;
    options
}

/// Encode to PNG at compression `level` (0 = fastest/largest, 9 = strongest).
pub fn encode_png(img: &DynamicImage, level: u8) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        ensure_encodable(img.width(), img.height())?;
        let raw = encode_plain(img, OutputFormat::Png)?;
        oxipng::optimize_from_memory(&raw, &png_options(level)).map_err(|e| {
            ReduceImageError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode to lossy WebP at `quality` (clamped to 1..=100).
pub fn encode_webp(img: &DynamicImage, quality: u8) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
        let rgb = rgb_view(img);
        let (w, h) = rgb.dimensions();
        ensure_encodable(w, h)?;

        let encoder = webp::Encoder::from_rgb(&rgb, w, h);
        let mut config = webp::WebPConfig::new()
            .map_err(|_| ReduceImageError::internal_panic("failed to create WebPConfig"))?;
        config.quality = quality as f32;
        config.method = 4;
        config.pass = 1;
        config.autofilter = 1;

        let mem = encoder.encode_advanced(&config).map_err(|e| {
            ReduceImageError::encode_failed("webp", format!("WebP encode failed: {e:?}"))
        })?;
        Ok(mem.to_vec())
    })
}

/// Encode with the image crate's stock encoder, no tuning.
///
/// Used for GIF/BMP and as the last-resort fallback for every format.
pub fn encode_plain(img: &DynamicImage, format: OutputFormat) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:plain", || {
        ensure_encodable(img.width(), img.height())?;
        let mut buf = Vec::new();
        let result = match format.image_format() {
            // No alpha in these encoders
            ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(img.to_rgb8())
                .write_to(&mut Cursor::new(&mut buf), format.image_format()),
            ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif),
            other => img.write_to(&mut Cursor::new(&mut buf), other),
        };
        result.map_err(|e| {
            ReduceImageError::encode_failed(format.as_str(), format!("encode failed: {e}"))
        })?;
        Ok(buf)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{RgbImage, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn create_test_image_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        }))
    }

    mod encode_tests {
        use super::*;

        #[test]
        fn test_encode_jpeg_produces_valid_jpeg() {
            let img = create_test_image(100, 100);
            let result = encode_jpeg(&img, 80).unwrap();
            assert_eq!(&result[0..2], &[0xFF, 0xD8]);
            assert_eq!(&result[result.len() - 2..], &[0xFF, 0xD9]);
        }

        #[test]
        fn test_encode_jpeg_quality_orders_size() {
            let img = create_test_image(128, 128);
            let q100 = encode_jpeg(&img, 100).unwrap();
            let q10 = encode_jpeg(&img, 10).unwrap();
            assert!(q100.len() > q10.len());
        }

        #[test]
        fn test_encode_jpeg_clamps_quality_zero() {
            let img = create_test_image(16, 16);
            let q0 = encode_jpeg(&img, 0).unwrap();
            let q1 = encode_jpeg(&img, 1).unwrap();
            assert_eq!(q0, q1);
        }

        #[test]
        fn test_encode_png_produces_valid_png() {
            let img = create_test_image(100, 100);
            let result = encode_png(&img, PNG_DEFAULT_LEVEL).unwrap();
            assert_eq!(&result[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        }

        #[test]
        fn test_encode_png_level_zero_not_smaller_than_nine() {
            let img = create_test_image(96, 96);
            let fast = encode_png(&img, 0).unwrap();
            let strong = encode_png(&img, PNG_MAX_LEVEL).unwrap();
            assert!(fast.len() >= strong.len());
        }

        #[test]
        fn test_encode_png_round_trips_pixels() {
            let img = create_test_image(20, 10);
            let encoded = encode_png(&img, 9).unwrap();
            let decoded = image::load_from_memory(&encoded).unwrap();
            assert_eq!(decoded.to_rgb8(), img.to_rgb8());
        }

        #[test]
        fn test_encode_webp_produces_valid_webp() {
            let img = create_test_image(100, 100);
            let result = encode_webp(&img, 80).unwrap();
            assert_eq!(&result[0..4], b"RIFF");
            assert_eq!(&result[8..12], b"WEBP");
        }

        #[test]
        fn test_encode_plain_gif_and_bmp() {
            let img = create_test_image_rgba(8, 8);
            let gif = encode_plain(&img, OutputFormat::Gif).unwrap();
            assert_eq!(&gif[0..3], b"GIF");
            let bmp = encode_plain(&img, OutputFormat::Bmp).unwrap();
            assert_eq!(&bmp[0..2], b"BM");
        }

        #[test]
        fn test_encode_rgba_image() {
            let img = create_test_image_rgba(50, 50);
            assert!(encode_jpeg(&img, 80).is_ok());
            assert!(encode_png(&img, 3).is_ok());
            assert!(encode_webp(&img, 80).is_ok());
        }
    }

    #[test]
    fn test_png_deflate_level_mapping() {
        assert_eq!(png_deflate_level(0), 0);
        assert_eq!(png_deflate_level(9), 12);
        assert_eq!(png_deflate_level(20), 12);
        let mut prev = 0;
        for level in 0..=PNG_MAX_LEVEL {
            let mapped = png_deflate_level(level);
            assert!(mapped >= prev);
            prev = mapped;
        }
    }
}
