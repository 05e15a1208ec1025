// lib.rs
//
// reduce-image: re-encode an image to hit a byte budget
//
// Design goals:
// - Exact targets are exact (grow pads, shrink searches)
// - Ceilings never pad and never resize
// - Every format goes through one capability-driven search loop
// - A bad file fails alone; nothing panics across the API

// Memory allocator optimization - jemalloc for the many short-lived encode buffers
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod config;
pub mod engine;
pub mod error;
pub mod ops;

use error::ReduceImageError;
use image::ImageReader;
use std::io::{BufRead, BufReader, Cursor, Seek};

pub use config::ReduceConfig;
pub use engine::{
    process_batch, process_batch_to_output_dir, reduce_bytes, reduce_source, BatchItem,
    BatchResult, FitStatus, ReducedImage, Source,
};
pub use error::{ErrorCategory, Result};
pub use ops::{OutputFormat, ReduceRequest, ResizeTarget, SizingMode};

/// Header facts read without decoding pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    /// Detected format (jpeg, png, webp, gif, ...)
    pub format: Option<String>,
}

fn read_inspect_metadata<R: BufRead + Seek>(reader: R) -> Result<InspectMetadata> {
    let reader = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| ReduceImageError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{:?}", f).to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ReduceImageError::decode_failed(format!("failed to read dimensions: {e}")))?;

    Ok(InspectMetadata {
        width,
        height,
        format,
    })
}

/// Inspect image metadata WITHOUT decoding pixels.
///
/// Use this to reject oversized uploads before spending CPU on a decode.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata> {
    read_inspect_metadata(Cursor::new(data))
}

pub fn inspect_header_from_path(path: &str) -> Result<InspectMetadata> {
    use std::fs::File;

    let file =
        File::open(path).map_err(|e| ReduceImageError::file_read_failed(path.to_string(), e))?;
    read_inspect_metadata(BufReader::new(file))
}

/// Get library version
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
