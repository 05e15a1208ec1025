// src/engine/tasks.rs
//
// Single-file and batch reduce tasks.
//
// A task runs: limits -> header check -> decode -> dimension fit -> size search.
// Each file's search is sequential; a batch fans files out over the global pool
// and never aborts because one file failed.

use crate::config::ReduceConfig;
use crate::engine::common::EngineResult;
use crate::engine::decoder::decode_image;
use crate::engine::io::{data_url, output_filename, write_atomic, Source};
use crate::engine::pipeline::{calc_resize_dimensions, resize_exact};
use crate::engine::pool;
use crate::engine::search::{
    encode_unconstrained, fit_within_max, reduce_to_target, FitStatus, SearchOutcome,
};
use crate::engine::strategy::{strategy_for, Setting};
use crate::error::{ErrorCategory, ReduceImageError};
use crate::ops::{OutputFormat, ReduceRequest, ResizeTarget, SizingMode};
use image::DynamicImage;
use rayon::prelude::*;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of reducing one image.
#[derive(Debug, Clone)]
pub struct ReducedImage {
    /// `reduced_<original name>` with the output extension.
    pub file_name: String,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
    pub original_size: u64,
    pub original_dimensions: (u32, u32),
    pub final_dimensions: (u32, u32),
    pub status: FitStatus,
    /// Encoder setting of the chosen candidate.
    pub setting: Setting,
}

impl ReducedImage {
    /// Always the real output length, padding included.
    pub fn final_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn achieved(&self) -> bool {
        self.status.is_achieved()
    }

    pub fn original_dimensions_label(&self) -> String {
        format_dimensions(self.original_dimensions)
    }

    pub fn final_dimensions_label(&self) -> String {
        format_dimensions(self.final_dimensions)
    }

    pub fn data_url(&self) -> String {
        data_url(&self.bytes, self.format)
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Atomically write the output into `dir` under [`file_name`](Self::file_name).
    pub fn write_to_dir(&self, dir: &Path) -> EngineResult<PathBuf> {
        write_atomic(dir, &self.file_name, &self.bytes)
    }

    /// [`write_to_dir`](Self::write_to_dir) into the configured output directory.
    pub fn write_to_output_dir(&self, config: &ReduceConfig) -> EngineResult<PathBuf> {
        self.write_to_dir(&config.output_dir)
    }
}

fn format_dimensions((w, h): (u32, u32)) -> String {
    format!("{w}x{h}")
}

/// Apply a pixel dimension fit; borrows when the size already matches.
pub fn fit_to_dimensions<'a>(
    img: &'a DynamicImage,
    target: &ResizeTarget,
) -> EngineResult<Cow<'a, DynamicImage>> {
    let (w, h) = target.sides();
    if w == Some(0) || h == Some(0) {
        return Err(ReduceImageError::invalid_resize_dimensions(w, h));
    }
    let (dst_w, dst_h) = calc_resize_dimensions(img.width(), img.height(), w, h);
    crate::engine::decoder::check_dimensions(dst_w, dst_h)?;
    debug!(
        from_width = img.width(),
        from_height = img.height(),
        to_width = dst_w,
        to_height = dst_h,
        "dimension fit"
    );
    Ok(resize_exact(img, dst_w, dst_h)?)
}

/// Run the size search requested by `request` on an already-decoded image.
pub fn reduce_decoded(
    img: &DynamicImage,
    format: OutputFormat,
    request: &ReduceRequest,
    config: &ReduceConfig,
) -> EngineResult<SearchOutcome> {
    config.limits.enforce_request(request)?;
    let fitted = match &request.resize {
        Some(target) => fit_to_dimensions(img, target)?,
        None => Cow::Borrowed(img),
    };
    let strategy = strategy_for(format);
    match request.sizing {
        Some(SizingMode::Exact(target)) => {
            reduce_to_target(&fitted, strategy.as_ref(), target, &config.search)
        }
        Some(SizingMode::AtMost(max)) => {
            fit_within_max(&fitted, strategy.as_ref(), max, &config.search)
        }
        None => encode_unconstrained(&fitted, strategy.as_ref(), &config.search),
    }
}

/// Reduce one uploaded image.
///
/// `file_name` is the client's name for the upload; it picks the output format
/// and names the output.
pub fn reduce_source(
    source: &Source,
    file_name: &str,
    request: &ReduceRequest,
    config: &ReduceConfig,
) -> EngineResult<ReducedImage> {
    config.limits.enforce_request(request)?;
    config.limits.enforce_source_len(source.len()?)?;
    let data = source.bytes()?;

    if let Ok(header) = crate::inspect_header_from_bytes(&data) {
        config.limits.enforce_pixels(header.width, header.height)?;
    }

    let (img, detected) = decode_image(&data)?;
    config.limits.enforce_pixels(img.width(), img.height())?;

    let format = OutputFormat::resolve(file_name, detected);
    let outcome = reduce_decoded(&img, format, request, config)?;

    let reduced = ReducedImage {
        file_name: output_filename(file_name, format),
        format,
        original_size: data.len() as u64,
        original_dimensions: (img.width(), img.height()),
        final_dimensions: outcome.dims,
        status: outcome.status,
        setting: outcome.setting,
        bytes: outcome.bytes,
    };

    info!(
        file = %file_name,
        format = %format,
        setting = %reduced.setting,
        status = reduced.status.as_str(),
        trials = outcome.trials,
        original_size = reduced.original_size,
        final_size = reduced.final_size(),
        dimensions = %reduced.final_dimensions_label(),
        "image reduced"
    );
    Ok(reduced)
}

/// Reduce an in-memory upload.
pub fn reduce_bytes(
    data: &[u8],
    file_name: &str,
    request: &ReduceRequest,
    config: &ReduceConfig,
) -> EngineResult<ReducedImage> {
    reduce_source(&Source::from_bytes(data), file_name, request, config)
}

/// One file in a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub file_name: String,
    pub source: Source,
}

impl BatchItem {
    pub fn new(file_name: impl Into<String>, source: Source) -> Self {
        Self {
            file_name: file_name.into(),
            source,
        }
    }

    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::new(file_name, Source::from_bytes(data))
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::new(file_name, Source::Path(path))
    }
}

/// Per-file batch outcome. Exactly one of `output` / `error` is set.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub source: String,
    pub success: bool,
    pub output: Option<ReducedImage>,
    /// Where the output was written, when the batch writes to disk.
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
    pub error_category: Option<ErrorCategory>,
}

impl BatchResult {
    fn ok(source: &str, output: ReducedImage, output_path: Option<PathBuf>) -> Self {
        Self {
            source: source.to_string(),
            success: true,
            output: Some(output),
            output_path,
            error: None,
            error_code: None,
            error_category: None,
        }
    }

    fn failed(source: &str, err: ReduceImageError) -> Self {
        let code = err.code();
        Self {
            source: source.to_string(),
            success: false,
            output: None,
            output_path: None,
            error: Some(format!("[{code}] {source}: {err}")),
            error_code: Some(code),
            error_category: Some(err.category()),
        }
    }
}

/// Reduce every item in parallel; results keep input order.
///
/// With `write_to` set, each output is also written there atomically.
pub fn process_batch(
    items: &[BatchItem],
    request: &ReduceRequest,
    config: &ReduceConfig,
    write_to: Option<&Path>,
) -> Vec<BatchResult> {
    let process_one = |item: &BatchItem| -> BatchResult {
        let result = reduce_source(&item.source, &item.file_name, request, config).and_then(
            |reduced| match write_to {
                Some(dir) => {
                    let path = reduced.write_to_dir(dir)?;
                    Ok((reduced, Some(path)))
                }
                None => Ok((reduced, None)),
            },
        );
        match result {
            Ok((reduced, path)) => BatchResult::ok(&item.file_name, reduced, path),
            Err(err) => {
                tracing::warn!(file = %item.file_name, error = %err, "batch item failed");
                BatchResult::failed(&item.file_name, err)
            }
        }
    };

    match pool::get_pool(config.worker_threads) {
        Some(pool) => pool.install(|| items.par_iter().map(process_one).collect()),
        None => items.iter().map(process_one).collect(),
    }
}

/// [`process_batch`] writing every output into `config.output_dir`.
pub fn process_batch_to_output_dir(
    items: &[BatchItem],
    request: &ReduceRequest,
    config: &ReduceConfig,
) -> Vec<BatchResult> {
    process_batch(items, request, config, Some(&config.output_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{DimensionPreset, KB, MB};
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        create_test_image(width, height)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    #[test]
    fn test_reduce_bytes_exact_mb_target() {
        let data = encoded(100, 100, ImageFormat::Jpeg);
        let request = ReduceRequest::new().with_sizing(SizingMode::Exact(MB));
        let out = reduce_bytes(&data, "cat.jpg", &request, &ReduceConfig::default()).unwrap();
        assert_eq!(out.final_size(), MB);
        assert_eq!(out.file_name, "reduced_cat.jpg");
        assert_eq!(out.final_dimensions_label(), "100x100");
        assert!(out.achieved());
    }

    #[test]
    fn test_reduce_bytes_preset_then_max_size() {
        let data = encoded(1200, 900, ImageFormat::Png);
        let request = ReduceRequest::new()
            .with_resize(ResizeTarget::Preset(DimensionPreset::Vga))
            .with_sizing(SizingMode::AtMost(500 * KB));
        let out = reduce_bytes(&data, "shot.png", &request, &ReduceConfig::default()).unwrap();
        assert_eq!(out.final_dimensions, (640, 480));
        assert_eq!(out.original_dimensions_label(), "1200x900");
        assert!(out.final_size() <= 500 * KB);
        assert_eq!(out.status, FitStatus::Met);
    }

    #[test]
    fn test_reduce_bytes_width_only_keeps_aspect() {
        let data = encoded(400, 200, ImageFormat::Png);
        let request = ReduceRequest::new().with_resize(ResizeTarget::Explicit {
            width: Some(100),
            height: None,
        });
        let out = reduce_bytes(&data, "wide.png", &request, &ReduceConfig::default()).unwrap();
        assert_eq!(out.final_dimensions, (100, 50));
        assert_eq!(out.status, FitStatus::Unconstrained);
    }

    #[test]
    fn test_output_format_follows_extension() {
        let data = encoded(16, 16, ImageFormat::Png);
        let out =
            reduce_bytes(&data, "pic.webp", &ReduceRequest::new(), &ReduceConfig::default())
                .unwrap();
        assert_eq!(out.format, OutputFormat::WebP);
        assert_eq!(out.mime_type(), "image/webp");
        assert!(out.data_url().starts_with("data:image/webp;base64,"));
    }

    #[test]
    fn test_unknown_extension_uses_detected_format() {
        let data = encoded(16, 16, ImageFormat::Png);
        let out = reduce_bytes(&data, "upload.bin", &ReduceRequest::new(), &ReduceConfig::default())
            .unwrap();
        assert_eq!(out.format, OutputFormat::Png);
        assert_eq!(out.file_name, "reduced_upload.png");
    }

    #[test]
    fn test_upload_limit_rejects_before_decode() {
        let data = encoded(16, 16, ImageFormat::Png);
        let mut config = ReduceConfig::default();
        config.limits = config.limits.with_max_upload_bytes(8);
        let err = reduce_bytes(&data, "a.png", &ReduceRequest::new(), &config).unwrap_err();
        assert!(matches!(err, ReduceImageError::UploadTooLarge { .. }));
    }

    #[test]
    fn test_pixel_limit_from_config() {
        let data = encoded(32, 32, ImageFormat::Png);
        let mut config = ReduceConfig::default();
        config.limits = config.limits.with_max_pixels(100);
        let err = reduce_bytes(&data, "a.png", &ReduceRequest::new(), &config).unwrap_err();
        assert!(matches!(err, ReduceImageError::PixelCountExceedsLimit { .. }));
    }

    #[test]
    fn test_write_to_dir_uses_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let data = encoded(8, 8, ImageFormat::Png);
        let out = reduce_bytes(&data, "x.png", &ReduceRequest::new(), &ReduceConfig::default())
            .unwrap();
        let path = out.write_to_dir(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("reduced_x.png"));
        assert_eq!(std::fs::read(path).unwrap(), out.bytes);
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let items = vec![
            BatchItem::from_bytes("a.png", encoded(8, 8, ImageFormat::Png)),
            BatchItem::from_bytes("broken.jpg", b"not an image".to_vec()),
            BatchItem::from_bytes("c.jpg", encoded(8, 8, ImageFormat::Jpeg)),
            BatchItem::from_path("/no/such/file.png"),
        ];
        let results =
            process_batch(&items, &ReduceRequest::new(), &ReduceConfig::default(), None);
        assert_eq!(results.len(), 4);
        let names: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(names, ["a.png", "broken.jpg", "c.jpg", "file.png"]);

        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].error_category, Some(ErrorCategory::CodecError));
        assert!(results[1].error.as_deref().unwrap_or("").contains("broken.jpg"));
        assert!(results[2].success);
        assert_eq!(results[3].error_code, Some("FILE_NOT_FOUND"));
    }

    #[test]
    fn test_batch_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![BatchItem::from_bytes("a.png", encoded(8, 8, ImageFormat::Png))];
        let results = process_batch(
            &items,
            &ReduceRequest::new(),
            &ReduceConfig::default(),
            Some(dir.path()),
        );
        let path = results[0].output_path.clone().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_to_output_dir_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReduceConfig {
            output_dir: dir.path().join("out"),
            ..ReduceConfig::default()
        };
        let data = encoded(8, 8, ImageFormat::Png);
        let out = reduce_bytes(&data, "y.png", &ReduceRequest::new(), &config).unwrap();
        let path = out.write_to_output_dir(&config).unwrap();
        assert_eq!(path, dir.path().join("out").join("reduced_y.png"));
        assert_eq!(std::fs::read(path).unwrap(), out.bytes);
    }

    #[test]
    fn test_batch_to_output_dir_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReduceConfig {
            output_dir: dir.path().to_path_buf(),
            ..ReduceConfig::default()
        };
        let items = vec![BatchItem::from_bytes("a.png", encoded(8, 8, ImageFormat::Png))];
        let results = process_batch_to_output_dir(&items, &ReduceRequest::new(), &config);
        assert_eq!(
            results[0].output_path.as_deref(),
            Some(dir.path().join("reduced_a.png").as_path())
        );
    }

    #[test]
    fn test_batch_reports_oversized_target_per_file() {
        let items = vec![
            BatchItem::from_bytes("a.png", encoded(8, 8, ImageFormat::Png)),
            BatchItem::from_bytes("b.jpg", encoded(8, 8, ImageFormat::Jpeg)),
        ];
        let mut config = ReduceConfig::default();
        config.limits = config.limits.with_max_target_bytes(4 * KB);
        let request = ReduceRequest::new().with_sizing(SizingMode::Exact(4 * KB + 1));

        let results = process_batch(&items, &request, &config, None);

        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(!result.success);
            assert!(result.output.is_none());
            assert_eq!(result.error_code, Some("TARGET_TOO_LARGE"));
            assert_eq!(result.error_category, Some(ErrorCategory::ResourceLimit));
        }
    }

    #[test]
    fn test_reduce_decoded_enforces_target_limit() {
        let img = create_test_image(4, 4);
        let mut config = ReduceConfig::default();
        config.limits = config.limits.with_max_target_bytes(KB);
        let request = ReduceRequest::new().with_sizing(SizingMode::Exact(KB + 1));
        let err = reduce_decoded(&img, OutputFormat::Png, &request, &config).unwrap_err();
        assert!(matches!(err, ReduceImageError::TargetTooLarge { .. }));
    }

    #[test]
    fn test_fit_to_dimensions_borrows_when_equal() {
        let img = create_test_image(10, 10);
        let target = ResizeTarget::Explicit {
            width: Some(10),
            height: Some(10),
        };
        assert!(matches!(
            fit_to_dimensions(&img, &target).unwrap(),
            Cow::Borrowed(_)
        ));
    }
}
