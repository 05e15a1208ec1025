// src/engine.rs
//
// The core of reduce-image. Re-encodes an image to meet a byte budget:
// 1. Decode with header-first limit checks
// 2. Optionally fit to explicit or preset pixel dimensions
// 3. Search compression levels, qualities and scales for the budget
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Largest exact target any request may ask for (1GB).
/// Growing pads in memory, so this bounds the output buffer.
pub const MAX_TARGET_BYTES: u64 = 1024 * 1024 * 1024;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod common;
mod decoder;
mod encoder;
mod io;
mod limits;
mod pipeline;
mod pool;
mod search;
mod strategy;
mod tasks;

pub use common::{run_with_panic_policy, EngineResult};
pub use decoder::{check_dimensions, decode_image, detect_format, ensure_dimensions_safe};
pub use encoder::{
    encode_jpeg, encode_plain, encode_png, encode_webp, png_deflate_level, MAX_QUALITY,
    MIN_QUALITY, PNG_DEFAULT_LEVEL, PNG_MAX_LEVEL,
};
pub use io::{data_url, output_filename, write_atomic, Source, OUTPUT_PREFIX};
pub use limits::{UploadLimits, DEFAULT_MAX_TARGET_BYTES, DEFAULT_MAX_UPLOAD_BYTES};
pub use pipeline::{calc_resize_dimensions, resize_exact, scaled_dimensions, ResizeError};
pub use pool::{get_pool, resolve_thread_count, MAX_THREADS};
pub use search::{
    encode_unconstrained, fit_within_max, pad_to, reduce_to_target, FitStatus, QualitySearch,
    SearchOutcome, SearchPolicy,
};
pub use strategy::{
    strategy_for, Capabilities, FormatClass, FormatStrategy, JpegStrategy, PlainStrategy,
    PngStrategy, Setting, WebPStrategy, DEFAULT_QUALITY,
};
pub use tasks::{
    fit_to_dimensions, process_batch, process_batch_to_output_dir, reduce_bytes, reduce_decoded,
    reduce_source, BatchItem, BatchResult, ReducedImage,
};
