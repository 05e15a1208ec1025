// src/config.rs
//
// Runtime configuration: search policy, upload limits, pool size, output directory.
// Every field has a default; `from_env` overrides them from REDUCE_IMAGE_* variables.

use crate::engine::{QualitySearch, SearchPolicy, UploadLimits};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_PREFIX: &str = "REDUCE_IMAGE_";

/// Where reduced files land unless told otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/uploads/";

#[derive(Clone, Debug, PartialEq)]
pub struct ReduceConfig {
    pub search: SearchPolicy,
    pub limits: UploadLimits,
    /// Batch pool size; `None` = available parallelism.
    pub worker_threads: Option<usize>,
    pub output_dir: PathBuf,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            search: SearchPolicy::default(),
            limits: UploadLimits::default(),
            worker_threads: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl ReduceConfig {
    /// Defaults overridden by `REDUCE_IMAGE_*` environment variables.
    ///
    /// Unparseable or out-of-range values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let mut config = Self::default();
        let search = &mut config.search;

        if let Some(v) = env.parsed::<f64>("SCALE_STEP", |v| *v > 0.0 && *v < 1.0) {
            search.scale_step = v;
        }
        if let Some(v) = env.parsed::<f64>("SCALE_FLOOR", |v| *v > 0.0 && *v <= 1.0) {
            search.scale_floor = v;
        }
        if let Some(v) = env.parsed::<u8>("DEFAULT_QUALITY", is_quality) {
            search.default_quality = v;
        }
        if let Some(v) = env.parsed::<u8>("FIT_START_QUALITY", is_quality) {
            search.fit_start_quality = v;
        }
        if let Some(v) = env.parsed::<u8>("FIT_QUALITY_STEP", |v| (1..=100).contains(v)) {
            search.fit_quality_step = v;
        }
        if let Some(v) = env.parsed::<u8>("FIT_QUALITY_FLOOR", is_quality) {
            search.fit_quality_floor = v;
        }
        if let Some(v) = env.with("QUALITY_SEARCH", parse_quality_search) {
            search.quality_search = v;
        }
        if let Some(v) = env.with("PAD_ON_GROW", parse_bool) {
            search.pad_on_grow = v;
        }

        if let Some(v) = env.parsed::<u64>("MAX_UPLOAD_BYTES", |v| *v > 0) {
            config.limits = config.limits.with_max_upload_bytes(v);
        }
        if let Some(v) = env.parsed::<u64>("MAX_PIXELS", |v| *v > 0) {
            config.limits = config.limits.with_max_pixels(v);
        }
        if let Some(v) = env.parsed::<u64>("MAX_TARGET_BYTES", |v| *v > 0) {
            config.limits = config.limits.with_max_target_bytes(v);
        }
        if let Some(v) = env.parsed::<usize>("WORKER_THREADS", |v| *v > 0) {
            config.worker_threads = Some(v);
        }
        if let Some(v) = env.raw("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(v);
        }

        config
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{name}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn with<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = self.raw(name)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            tracing::warn!(
                variable = %format!("{ENV_PREFIX}{name}"),
                value = %raw,
                "ignoring invalid configuration value"
            );
        }
        parsed
    }

    fn parsed<T: FromStr>(&self, name: &str, valid: impl Fn(&T) -> bool) -> Option<T> {
        self.with(name, |raw| raw.parse::<T>().ok().filter(|v| valid(v)))
    }
}

fn is_quality(v: &u8) -> bool {
    (1..=100).contains(v)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_quality_search(raw: &str) -> Option<QualitySearch> {
    match raw.to_ascii_lowercase().as_str() {
        "binary" => Some(QualitySearch::Binary),
        "linear" => Some(QualitySearch::Linear),
        _ => None,
    }
}
