// src/engine/io.rs
//
// I/O operations: input sources, output naming, data URLs and atomic output writes.

use crate::error::ReduceImageError;
use crate::ops::OutputFormat;
use base64::{engine::general_purpose, Engine as _};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

type IoResult<T> = std::result::Result<T, ReduceImageError>;

/// Prefix every output file name carries.
pub const OUTPUT_PREFIX: &str = "reduced_";

/// Image source - in-memory upload, memory-mapped file, or a path read on demand.
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory image data (an uploaded body)
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access)
    Mapped(Arc<Mmap>),
    /// File path for lazy loading (data is read only when needed)
    Path(PathBuf),
}

impl Source {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Source::Memory(Arc::new(data.into()))
    }

    /// Memory-map `path` for zero-copy decoding.
    pub fn map_file(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref();
        let display = path.to_string_lossy().to_string();
        if !path.exists() {
            return Err(ReduceImageError::file_not_found(display));
        }
        let file =
            File::open(path).map_err(|e| ReduceImageError::file_read_failed(display.clone(), e))?;
        // Safety: the file is assumed not to be truncated while the map is alive.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| ReduceImageError::mmap_failed(display, e))?;
        Ok(Source::Mapped(Arc::new(mmap)))
    }

    /// Borrow the bytes, reading Path sources from disk.
    pub fn bytes(&self) -> IoResult<Cow<'_, [u8]>> {
        match self {
            Source::Memory(data) => Ok(Cow::Borrowed(data.as_slice())),
            Source::Mapped(mmap) => Ok(Cow::Borrowed(mmap.as_ref())),
            Source::Path(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| read_error(path, e)),
        }
    }

    /// Size in bytes; Path sources ask the filesystem.
    pub fn len(&self) -> IoResult<u64> {
        match self {
            Source::Memory(data) => Ok(data.len() as u64),
            Source::Mapped(mmap) => Ok(mmap.len() as u64),
            Source::Path(path) => std::fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| read_error(path, e)),
        }
    }

    pub fn is_empty(&self) -> IoResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn read_error(path: &Path, e: std::io::Error) -> ReduceImageError {
    let display = path.to_string_lossy().to_string();
    if e.kind() == std::io::ErrorKind::NotFound {
        ReduceImageError::file_not_found(display)
    } else {
        ReduceImageError::file_read_failed(display, e)
    }
}

/// Name for the reduced file: `reduced_<name>` with an extension matching `format`.
///
/// Directory components are dropped, so client-supplied names cannot escape
/// the output directory.
pub fn output_filename(original: &str, format: OutputFormat) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("image");

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };

    match ext {
        Some(ext) if OutputFormat::from_extension(ext) == Some(format) => {
            format!("{OUTPUT_PREFIX}{base}")
        }
        Some(_) => format!("{OUTPUT_PREFIX}{stem}.{}", format.extension()),
        None => format!("{OUTPUT_PREFIX}{base}.{}", format.extension()),
    }
}

/// `data:<mime>;base64,<payload>` for inline previews.
pub fn data_url(bytes: &[u8], format: OutputFormat) -> String {
    format!(
        "data:{};base64,{}",
        format.mime_type(),
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Write `bytes` to `dir/file_name` atomically.
///
/// The data goes to a temp file in `dir` first (same filesystem, so the final
/// rename is atomic), is synced, then persisted over the target. Creates `dir`
/// when missing.
pub fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> IoResult<PathBuf> {
    let dir_display = dir.to_string_lossy().to_string();
    std::fs::create_dir_all(dir)
        .map_err(|e| ReduceImageError::file_write_failed(dir_display.clone(), e))?;

    let output_path = dir.join(file_name);
    let mut temp_file = NamedTempFile::new_in(dir)
        .map_err(|e| ReduceImageError::file_write_failed(dir_display, e))?;

    let temp_path = temp_file.path().to_path_buf();
    temp_file
        .write_all(bytes)
        .map_err(|e| ReduceImageError::file_write_failed(temp_path.display().to_string(), e))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| ReduceImageError::file_write_failed(temp_path.display().to_string(), e))?;

    // tempfile removes the temp file if persist fails
    temp_file.persist(&output_path).map_err(|e| {
        ReduceImageError::file_write_failed(output_path.display().to_string(), e.error)
    })?;

    Ok(output_path)
}
