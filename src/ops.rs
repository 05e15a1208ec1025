// src/ops.rs
//
// Request model for a reduce call.
// These are cheap to build from form fields - the expensive work happens in the engine.

use crate::engine::MAX_TARGET_BYTES;
use crate::error::{ReduceImageError, Result};
use image::ImageFormat;

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * 1024;

/// Unit for a custom target size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeUnit {
    Kb,
    Mb,
}

impl SizeUnit {
    pub fn parse(unit: &str) -> Result<Self> {
        match unit.trim().to_ascii_lowercase().as_str() {
            "kb" => Ok(Self::Kb),
            "mb" => Ok(Self::Mb),
            other => Err(ReduceImageError::invalid_size_unit(other.to_string())),
        }
    }

    pub fn bytes(&self) -> u64 {
        match self {
            Self::Kb => KB,
            Self::Mb => MB,
        }
    }
}

/// Byte constraint for the encoder.
///
/// `Exact` may grow the output (with padding); `AtMost` only ever shrinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizingMode {
    /// Hit exactly this many bytes (custom target size).
    Exact(u64),
    /// Stay at or below this many bytes (max file size).
    AtMost(u64),
}

impl SizingMode {
    /// Custom target: `value` in `unit`, rounded to the nearest byte.
    ///
    /// Never above [`MAX_TARGET_BYTES`]; per-request limits may be lower.
    pub fn exact(value: f64, unit: SizeUnit) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ReduceImageError::invalid_argument(
                "custom_target_size",
                value.to_string(),
                "must be a positive number",
            ));
        }
        let bytes = (value * unit.bytes() as f64).round();
        if bytes < 1.0 {
            return Err(ReduceImageError::invalid_argument(
                "custom_target_size",
                value.to_string(),
                "rounds to zero bytes",
            ));
        }
        // Compare before the cast: `as u64` saturates.
        if bytes > MAX_TARGET_BYTES as f64 {
            return Err(ReduceImageError::target_too_large(
                if bytes >= u64::MAX as f64 { u64::MAX } else { bytes as u64 },
                MAX_TARGET_BYTES,
            ));
        }
        Ok(Self::Exact(bytes as u64))
    }

    /// Max file size in KB.
    pub fn at_most_kb(kb: u64) -> Result<Self> {
        if kb == 0 {
            return Err(ReduceImageError::invalid_argument(
                "max_file_size",
                "0",
                "must be at least 1 KB",
            ));
        }
        Ok(Self::AtMost(kb.saturating_mul(KB)))
    }

    pub fn target_bytes(&self) -> u64 {
        match self {
            Self::Exact(b) | Self::AtMost(b) => *b,
        }
    }
}

/// Named dimension presets offered by the upload form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimensionPreset {
    Xga,
    Square800,
    Svga,
    Vga,
    Thumb,
}

impl DimensionPreset {
    pub const ALL: [DimensionPreset; 5] = [
        Self::Xga,
        Self::Square800,
        Self::Svga,
        Self::Vga,
        Self::Thumb,
    ];

    /// Get the built-in preset by its form value (`"800x600"` etc.)
    pub fn get(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Xga => "1024x768",
            Self::Square800 => "800x800",
            Self::Svga => "800x600",
            Self::Vga => "640x480",
            Self::Thumb => "350x270",
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Xga => (1024, 768),
            Self::Square800 => (800, 800),
            Self::Svga => (800, 600),
            Self::Vga => (640, 480),
            Self::Thumb => (350, 270),
        }
    }
}

/// Pixel dimension constraint, applied before any byte search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeTarget {
    /// Width and/or height; a missing side keeps the aspect ratio.
    Explicit {
        width: Option<u32>,
        height: Option<u32>,
    },
    Preset(DimensionPreset),
}

impl ResizeTarget {
    pub fn explicit(width: Option<u32>, height: Option<u32>) -> Result<Self> {
        if (width.is_none() && height.is_none()) || width == Some(0) || height == Some(0) {
            return Err(ReduceImageError::invalid_resize_dimensions(width, height));
        }
        Ok(Self::Explicit { width, height })
    }

    /// Requested sides; a preset always names both.
    pub fn sides(&self) -> (Option<u32>, Option<u32>) {
        match self {
            Self::Explicit { width, height } => (*width, *height),
            Self::Preset(p) => {
                let (w, h) = p.dimensions();
                (Some(w), Some(h))
            }
        }
    }
}

/// Encodable output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
}

impl OutputFormat {
    /// Format from a file extension (case-insensitive, leading dot allowed).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Bmp => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Resolve the output format for an upload.
    ///
    /// Extension first, then the sniffed input format, then PNG.
    pub fn resolve(filename: &str, detected: Option<ImageFormat>) -> Self {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .or_else(|| detected.and_then(Self::from_image_format))
            .unwrap_or(Self::Png)
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a client asks of one reduce call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReduceRequest {
    pub resize: Option<ResizeTarget>,
    pub sizing: Option<SizingMode>,
}

impl ReduceRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resize(mut self, resize: ResizeTarget) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn with_sizing(mut self, sizing: SizingMode) -> Self {
        self.sizing = Some(sizing);
        self
    }

    /// Build a request from posted form fields.
    ///
    /// Recognised keys: `preset_size`, `width`, `height`, `max_file_size`,
    /// `custom_target_size`, `size_unit`. Empty values count as absent and
    /// unknown keys are ignored. Explicit width/height win over a preset and a
    /// custom target size wins over a max file size.
    pub fn from_form<'a, I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut preset = None;
        let mut width = None;
        let mut height = None;
        let mut max_kb = None;
        let mut custom = None;
        let mut unit = SizeUnit::Kb;

        for (key, value) in fields {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "preset_size" => {
                    preset = Some(
                        DimensionPreset::get(value)
                            .ok_or_else(|| ReduceImageError::invalid_preset(value.to_string()))?,
                    )
                }
                "width" => width = Some(parse_field::<u32>("width", value)?),
                "height" => height = Some(parse_field::<u32>("height", value)?),
                "max_file_size" => max_kb = Some(parse_field::<u64>("max_file_size", value)?),
                "custom_target_size" => {
                    custom = Some(parse_field::<f64>("custom_target_size", value)?)
                }
                "size_unit" => unit = SizeUnit::parse(value)?,
                _ => {}
            }
        }

        let resize = if width.is_some() || height.is_some() {
            Some(ResizeTarget::explicit(width, height)?)
        } else {
            preset.map(ResizeTarget::Preset)
        };

        let sizing = match (custom, max_kb) {
            (Some(value), _) => Some(SizingMode::exact(value, unit)?),
            (None, Some(kb)) => Some(SizingMode::at_most_kb(kb)?),
            (None, None) => None,
        };

        Ok(Self { resize, sizing })
    }
}

fn parse_field<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        ReduceImageError::invalid_argument(name, value.to_string(), "not a valid number")
    })
}
