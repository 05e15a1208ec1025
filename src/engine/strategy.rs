// src/engine/strategy.rs
//
// Per-format encode strategies.
// The size search never matches on a concrete format: it asks a strategy
// what it can do (capabilities) and how to encode at a given setting.

use crate::engine::common::EngineResult;
use crate::engine::encoder::{
    encode_jpeg, encode_plain, encode_png, encode_webp, MAX_QUALITY, MIN_QUALITY,
    PNG_DEFAULT_LEVEL, PNG_MAX_LEVEL,
};
use crate::error::ReduceImageError;
use crate::ops::OutputFormat;
use image::DynamicImage;

bitflags::bitflags! {
    /// Knobs a format exposes to the size search.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        /// Lossless compression levels (0 weakest .. 9 strongest).
        const COMPRESSION_LEVEL = 0b0000_0001;
        /// Lossy quality (1 .. 100).
        const QUALITY           = 0b0000_0010;
        /// Can be re-encoded at smaller pixel dimensions.
        const RESIZE            = 0b0000_0100;
    }
}

/// Coarse grouping that decides the grow behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatClass {
    /// PNG
    LosslessIndexed,
    /// JPEG
    LossyQuality,
    /// WebP, GIF, BMP and anything unrecognised
    Other,
}

/// One point in a format's parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Level(u8),
    Quality(u8),
    Default,
}

impl std::fmt::Display for Setting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Setting::Level(l) => write!(f, "level {l}"),
            Setting::Quality(q) => write!(f, "quality {q}"),
            Setting::Default => f.write_str("default"),
        }
    }
}

pub trait FormatStrategy: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn class(&self) -> FormatClass;

    fn capabilities(&self) -> Capabilities;

    /// Setting used when nothing constrains the output size.
    fn default_setting(&self) -> Setting;

    fn encode(&self, img: &DynamicImage, setting: Setting) -> EngineResult<Vec<u8>>;

    /// Untuned image-crate encode, used when every tuned attempt failed.
    fn encode_fallback(&self, img: &DynamicImage) -> EngineResult<Vec<u8>> {
        encode_plain(img, self.format())
    }
}

fn unsupported_setting(format: OutputFormat, setting: Setting) -> ReduceImageError {
    ReduceImageError::invalid_argument(
        "setting",
        setting.to_string(),
        format!("not supported by {format}"),
    )
}

#[derive(Debug, Default)]
pub struct PngStrategy;

impl FormatStrategy for PngStrategy {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn class(&self) -> FormatClass {
        FormatClass::LosslessIndexed
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::COMPRESSION_LEVEL | Capabilities::RESIZE
    }

    fn default_setting(&self) -> Setting {
        Setting::Level(PNG_DEFAULT_LEVEL)
    }

    fn encode(&self, img: &DynamicImage, setting: Setting) -> EngineResult<Vec<u8>> {
        match setting {
            Setting::Level(level) => encode_png(img, level.min(PNG_MAX_LEVEL)),
            Setting::Default => encode_png(img, PNG_DEFAULT_LEVEL),
            other => Err(unsupported_setting(self.format(), other)),
        }
    }
}

#[derive(Debug, Default)]
pub struct JpegStrategy;

impl FormatStrategy for JpegStrategy {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn class(&self) -> FormatClass {
        FormatClass::LossyQuality
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::QUALITY | Capabilities::RESIZE
    }

    fn default_setting(&self) -> Setting {
        Setting::Quality(DEFAULT_QUALITY)
    }

    fn encode(&self, img: &DynamicImage, setting: Setting) -> EngineResult<Vec<u8>> {
        match setting {
            Setting::Quality(q) => encode_jpeg(img, q.clamp(MIN_QUALITY, MAX_QUALITY)),
            Setting::Default => encode_jpeg(img, DEFAULT_QUALITY),
            other => Err(unsupported_setting(self.format(), other)),
        }
    }
}

#[derive(Debug, Default)]
pub struct WebPStrategy;

impl FormatStrategy for WebPStrategy {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn class(&self) -> FormatClass {
        FormatClass::Other
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::QUALITY | Capabilities::RESIZE
    }

    fn default_setting(&self) -> Setting {
        Setting::Quality(DEFAULT_QUALITY)
    }

    fn encode(&self, img: &DynamicImage, setting: Setting) -> EngineResult<Vec<u8>> {
        match setting {
            Setting::Quality(q) => encode_webp(img, q.clamp(MIN_QUALITY, MAX_QUALITY)),
            Setting::Default => encode_webp(img, DEFAULT_QUALITY),
            other => Err(unsupported_setting(self.format(), other)),
        }
    }
}

/// GIF, BMP: no tuning knob, only resizing.
#[derive(Debug)]
pub struct PlainStrategy {
    format: OutputFormat,
}

impl PlainStrategy {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl FormatStrategy for PlainStrategy {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn class(&self) -> FormatClass {
        FormatClass::Other
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RESIZE
    }

    fn default_setting(&self) -> Setting {
        Setting::Default
    }

    fn encode(&self, img: &DynamicImage, setting: Setting) -> EngineResult<Vec<u8>> {
        match setting {
            Setting::Default => encode_plain(img, self.format),
            other => Err(unsupported_setting(self.format, other)),
        }
    }
}

/// High-quality default for lossy formats.
pub const DEFAULT_QUALITY: u8 = 95;

pub fn strategy_for(format: OutputFormat) -> Box<dyn FormatStrategy> {
    match format {
        OutputFormat::Png => Box::new(PngStrategy),
        OutputFormat::Jpeg => Box::new(JpegStrategy),
        OutputFormat::WebP => Box::new(WebPStrategy),
        OutputFormat::Gif | OutputFormat::Bmp => Box::new(PlainStrategy::new(format)),
    }
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

    #[test]
    fn test_capabilities_per_format() {
        let png = strategy_for(OutputFormat::Png);
        assert!(png.capabilities().contains(Capabilities::COMPRESSION_LEVEL));
        assert!(!png.capabilities().contains(Capabilities::QUALITY));
        assert_eq!(png.class(), FormatClass::LosslessIndexed);

        let jpeg = strategy_for(OutputFormat::Jpeg);
        assert!(jpeg.capabilities().contains(Capabilities::QUALITY));
        assert_eq!(jpeg.class(), FormatClass::LossyQuality);

        let webp = strategy_for(OutputFormat::WebP);
        assert!(webp.capabilities().contains(Capabilities::QUALITY));
        assert_eq!(webp.class(), FormatClass::Other);

        let gif = strategy_for(OutputFormat::Gif);
        assert_eq!(gif.capabilities(), Capabilities::RESIZE);
        assert_eq!(gif.format(), OutputFormat::Gif);
    }

    #[test]
    fn test_every_strategy_encodes_its_default() {
        let img = create_test_image(24, 16);
        for format in [
            OutputFormat::Png,
            OutputFormat::Jpeg,
            OutputFormat::WebP,
            OutputFormat::Gif,
            OutputFormat::Bmp,
        ] {
            let strategy = strategy_for(format);
            let bytes = strategy.encode(&img, strategy.default_setting()).unwrap();
            assert!(!bytes.is_empty(), "{format} produced no bytes");
            assert_eq!(
                crate::engine::decoder::detect_format(&bytes),
                Some(format.image_format())
            );
        }
    }

    #[test]
    fn test_mismatched_setting_is_rejected() {
        let img = create_test_image(4, 4);
        let err = PngStrategy.encode(&img, Setting::Quality(50)).unwrap_err();
        assert!(matches!(err, ReduceImageError::InvalidArgument { .. }));
        let err = PlainStrategy::new(OutputFormat::Bmp)
            .encode(&img, Setting::Level(3))
            .unwrap_err();
        assert!(matches!(err, ReduceImageError::InvalidArgument { .. }));
    }

    #[test]
    fn test_fallback_encode_matches_format() {
        let img = create_test_image(4, 4);
        let bytes = JpegStrategy.encode_fallback(&img).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }
}
