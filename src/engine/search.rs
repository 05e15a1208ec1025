// src/engine/search.rs
//
// Size-targeted encoding.
//
// Every procedure here is a sequential loop over candidate encodings of one
// image, driven only by the strategy's capabilities:
// - reduce_to_target: hit an exact byte count (grow with padding, or shrink)
// - fit_within_max:   stay at or below a byte ceiling, never pad
// - encode_unconstrained: one encode at the high-quality default
//
// A trial that errors (or panics inside a codec) is logged and skipped.
// Every procedure starts from a default encode that falls back to the plain
// image-crate encoder, so a result exists whenever anything can encode.

use crate::engine::common::EngineResult;
use crate::engine::encoder::{MAX_QUALITY, MIN_QUALITY, PNG_MAX_LEVEL};
use crate::engine::pipeline::{resize_exact, scaled_dimensions};
use crate::engine::strategy::{Capabilities, FormatClass, FormatStrategy, Setting};
use crate::engine::MAX_TARGET_BYTES;
use crate::error::ReduceImageError;
use image::DynamicImage;
use tracing::{debug, warn};

/// Weakest PNG level.
const PNG_MIN_LEVEL: u8 = 0;

/// How the shrink branch looks for the best fitting quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualitySearch {
    /// Highest fitting quality by bisection.
    #[default]
    Binary,
    /// Descending sweep, one quality step at a time.
    Linear,
}

/// Tunables for the search loops.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPolicy {
    /// Multiplier applied per downscale step.
    pub scale_step: f64,
    /// Smallest scale tried before giving up.
    pub scale_floor: f64,
    /// Quality used for unconstrained encodes and as the grow lower bound.
    pub default_quality: u8,
    /// Max-size mode: first quality tried.
    pub fit_start_quality: u8,
    /// Max-size mode: quality decrement.
    pub fit_quality_step: u8,
    /// Max-size mode: last quality tried.
    pub fit_quality_floor: u8,
    pub quality_search: QualitySearch,
    /// Append filler bytes so a grow hits the target exactly.
    pub pad_on_grow: bool,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            scale_step: 0.9,
            scale_floor: 0.1,
            default_quality: 95,
            fit_start_quality: 95,
            fit_quality_step: 5,
            fit_quality_floor: 10,
            quality_search: QualitySearch::Binary,
            pad_on_grow: true,
        }
    }
}

/// How a result relates to the requested byte constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// No byte constraint was requested.
    Unconstrained,
    /// A real encoding satisfies the constraint.
    Met,
    /// Exact target reached by appending filler bytes.
    Padded,
    /// Constraint not satisfiable; best candidate returned.
    BestEffort,
}

impl FitStatus {
    pub fn is_achieved(&self) -> bool {
        !matches!(self, FitStatus::BestEffort)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FitStatus::Unconstrained => "unconstrained",
            FitStatus::Met => "met",
            FitStatus::Padded => "padded",
            FitStatus::BestEffort => "best_effort",
        }
    }
}

/// One encoded candidate.
#[derive(Debug, Clone)]
struct Candidate {
    bytes: Vec<u8>,
    setting: Setting,
    dims: (u32, u32),
}

impl Candidate {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn fits(&self, limit: u64) -> bool {
        self.bytes.len() as u64 <= limit
    }
}

/// Final output of a search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub bytes: Vec<u8>,
    pub setting: Setting,
    pub dims: (u32, u32),
    pub status: FitStatus,
    /// Encodes attempted, including failed ones.
    pub trials: u32,
}

impl SearchOutcome {
    fn from_candidate(candidate: Candidate, status: FitStatus, trials: u32) -> Self {
        Self {
            bytes: candidate.bytes,
            setting: candidate.setting,
            dims: candidate.dims,
            status,
            trials,
        }
    }
}

/// Append `0x00` bytes until `bytes` is exactly `target` long.
///
/// Every supported container ignores trailing data, so the decodable prefix
/// is unchanged. Never truncates.
pub fn pad_to(bytes: &mut Vec<u8>, target: usize) {
    if bytes.len() < target {
        bytes.resize(target, 0x00);
    }
}

/// Shared state of one search: the strategy, the policy and a trial counter.
struct Search<'a> {
    strategy: &'a dyn FormatStrategy,
    policy: &'a SearchPolicy,
    trials: u32,
}

impl<'a> Search<'a> {
    fn new(strategy: &'a dyn FormatStrategy, policy: &'a SearchPolicy) -> Self {
        Self {
            strategy,
            policy,
            trials: 0,
        }
    }

    fn caps(&self) -> Capabilities {
        self.strategy.capabilities()
    }

    /// Encode once; failures are logged and become `None`.
    fn trial(&mut self, img: &DynamicImage, setting: Setting) -> Option<Candidate> {
        self.trials += 1;
        let dims = (img.width(), img.height());
        match self.strategy.encode(img, setting) {
            Ok(bytes) => {
                debug!(
                    format = %self.strategy.format(),
                    %setting,
                    width = dims.0,
                    height = dims.1,
                    size = bytes.len(),
                    "trial encode"
                );
                Some(Candidate {
                    bytes,
                    setting,
                    dims,
                })
            }
            Err(err) => {
                warn!(
                    format = %self.strategy.format(),
                    %setting,
                    width = dims.0,
                    height = dims.1,
                    error = %err,
                    "trial encode failed, skipping"
                );
                None
            }
        }
    }

    fn default_setting(&self) -> Setting {
        if self.caps().contains(Capabilities::QUALITY) {
            Setting::Quality(self.policy.default_quality.clamp(MIN_QUALITY, MAX_QUALITY))
        } else {
            self.strategy.default_setting()
        }
    }

    /// Default-setting encode with the plain fallback behind it.
    fn baseline(&mut self, img: &DynamicImage) -> EngineResult<Candidate> {
        let setting = self.default_setting();
        if let Some(candidate) = self.trial(img, setting) {
            return Ok(candidate);
        }
        self.fallback(img)
    }

    fn fallback(&mut self, img: &DynamicImage) -> EngineResult<Candidate> {
        self.trials += 1;
        let format = self.strategy.format();
        warn!(format = %format, "tuned encoders failed, using plain encode");
        self.strategy
            .encode_fallback(img)
            .map(|bytes| Candidate {
                bytes,
                setting: Setting::Default,
                dims: (img.width(), img.height()),
            })
            .map_err(|e| {
                ReduceImageError::encode_failed(
                    format.as_str(),
                    format!("all candidates failed: {e}"),
                )
            })
    }

    fn outcome(&self, candidate: Candidate, status: FitStatus) -> SearchOutcome {
        SearchOutcome::from_candidate(candidate, status, self.trials)
    }

    /// Bisect for the highest quality in `[lo.quality, hi_miss)` whose encoding
    /// is at most `limit` bytes. `lo` must already fit.
    fn highest_fitting_quality(
        &mut self,
        img: &DynamicImage,
        lo: Candidate,
        lo_quality: u8,
        hi_miss: u8,
        limit: u64,
    ) -> Candidate {
        let (mut lo_q, mut hi_q, mut best) = (lo_quality, hi_miss, lo);
        while hi_q.saturating_sub(lo_q) > 1 {
            let mid = lo_q + (hi_q - lo_q) / 2;
            match self.trial(img, Setting::Quality(mid)) {
                Some(c) if c.fits(limit) => {
                    lo_q = mid;
                    best = c;
                }
                _ => hi_q = mid,
            }
        }
        best
    }

    /// Re-encode progressively smaller copies of `img` at `setting`.
    ///
    /// Scales are `step^k` of the original size, so dimensions never grow
    /// between trials. Returns the first fit, or `None` once below the floor.
    fn downscale(
        &mut self,
        img: &DynamicImage,
        setting: Setting,
        limit: u64,
        smallest: &mut Candidate,
    ) -> Option<Candidate> {
        if !self.caps().contains(Capabilities::RESIZE) {
            return None;
        }
        let (orig_w, orig_h) = (img.width(), img.height());
        let step = self.policy.scale_step.clamp(0.01, 0.99);
        let floor = self.policy.scale_floor.max(0.0);
        let mut last_dims = (orig_w, orig_h);
        let mut k = 1;
        loop {
            let scale = step.powi(k);
            k += 1;
            if scale < floor {
                return None;
            }
            let dims = scaled_dimensions(orig_w, orig_h, scale);
            if dims == last_dims {
                // Rounding left the size unchanged; nothing new to try.
                if dims == (1, 1) {
                    return None;
                }
                continue;
            }
            last_dims = dims;

            let resized = match resize_exact(img, dims.0, dims.1) {
                Ok(resized) => resized,
                Err(err) => {
                    warn!(
                        width = dims.0,
                        height = dims.1,
                        reason = %err.reason,
                        "downscale failed, skipping"
                    );
                    continue;
                }
            };
            if let Some(candidate) = self.trial(&resized, setting) {
                if candidate.fits(limit) {
                    return Some(candidate);
                }
                if candidate.len() < smallest.len() {
                    *smallest = candidate;
                }
            }
        }
    }

    fn grow(&mut self, img: &DynamicImage, target: u64, baseline: Candidate) -> SearchOutcome {
        let caps = self.caps();
        let best = match self.strategy.class() {
            FormatClass::LosslessIndexed if caps.contains(Capabilities::COMPRESSION_LEVEL) => {
                // Largest encoding that still fits.
                let mut best = baseline;
                for level in (PNG_MIN_LEVEL..=PNG_MAX_LEVEL).rev() {
                    if let Some(c) = self.trial(img, Setting::Level(level)) {
                        if c.fits(target) && c.len() > best.len() {
                            best = c;
                        }
                    }
                }
                best
            }
            FormatClass::LossyQuality if caps.contains(Capabilities::QUALITY) => {
                let default_q = self.policy.default_quality.clamp(MIN_QUALITY, MAX_QUALITY);
                match self.trial(img, Setting::Quality(MAX_QUALITY)) {
                    Some(c) if c.fits(target) => c,
                    _ if baseline.setting == Setting::Quality(default_q) => {
                        self.highest_fitting_quality(img, baseline, default_q, MAX_QUALITY, target)
                    }
                    _ => baseline,
                }
            }
            _ => baseline,
        };

        let target_len = usize::try_from(target).unwrap_or(usize::MAX);
        if best.len() == target_len {
            return self.outcome(best, FitStatus::Met);
        }
        if self.policy.pad_on_grow {
            let mut padded = best;
            pad_to(&mut padded.bytes, target_len);
            return self.outcome(padded, FitStatus::Padded);
        }
        self.outcome(best, FitStatus::BestEffort)
    }

    fn shrink(&mut self, img: &DynamicImage, target: u64, baseline: Candidate) -> SearchOutcome {
        let caps = self.caps();
        let mut smallest = baseline;

        let floor_setting = if caps.contains(Capabilities::COMPRESSION_LEVEL) {
            // Weakest level first: the first fit keeps the most bytes.
            for level in PNG_MIN_LEVEL..=PNG_MAX_LEVEL {
                if let Some(c) = self.trial(img, Setting::Level(level)) {
                    if c.fits(target) {
                        return self.outcome(c, FitStatus::Met);
                    }
                    if c.len() < smallest.len() {
                        smallest = c;
                    }
                }
            }
            Setting::Level(PNG_MAX_LEVEL)
        } else if caps.contains(Capabilities::QUALITY) {
            let default_q = self.policy.default_quality.clamp(MIN_QUALITY, MAX_QUALITY);
            if let Some(c) = self.search_quality(img, target, default_q, &mut smallest) {
                return self.outcome(c, FitStatus::Met);
            }
            Setting::Quality(MIN_QUALITY)
        } else {
            self.strategy.default_setting()
        };

        match self.downscale(img, floor_setting, target, &mut smallest) {
            Some(c) => self.outcome(c, FitStatus::Met),
            None => self.outcome(smallest, FitStatus::BestEffort),
        }
    }

    /// Quality search below `miss` (a quality known not to fit).
    fn search_quality(
        &mut self,
        img: &DynamicImage,
        target: u64,
        miss: u8,
        smallest: &mut Candidate,
    ) -> Option<Candidate> {
        match self.policy.quality_search {
            QualitySearch::Binary => {
                let floor = self.trial(img, Setting::Quality(MIN_QUALITY))?;
                if !floor.fits(target) {
                    if floor.len() < smallest.len() {
                        *smallest = floor;
                    }
                    return None;
                }
                Some(self.highest_fitting_quality(img, floor, MIN_QUALITY, miss, target))
            }
            QualitySearch::Linear => {
                for q in (MIN_QUALITY..miss).rev() {
                    if let Some(c) = self.trial(img, Setting::Quality(q)) {
                        if c.fits(target) {
                            return Some(c);
                        }
                        if c.len() < smallest.len() {
                            *smallest = c;
                        }
                    }
                }
                None
            }
        }
    }
}

/// Re-encode `img` so its size is exactly `target` bytes when growing, or at
/// most `target` bytes when shrinking.
///
/// The direction comes from the default encode: larger target grows, anything
/// else shrinks. An unreachable shrink returns the smallest candidate seen
/// with [`FitStatus::BestEffort`]. Targets above [`MAX_TARGET_BYTES`] are
/// rejected before any encode.
pub fn reduce_to_target(
    img: &DynamicImage,
    strategy: &dyn FormatStrategy,
    target: u64,
    policy: &SearchPolicy,
) -> EngineResult<SearchOutcome> {
    if target == 0 {
        return Err(ReduceImageError::invalid_argument(
            "target",
            "0",
            "target size must be at least one byte",
        ));
    }
    if target > MAX_TARGET_BYTES {
        return Err(ReduceImageError::target_too_large(target, MAX_TARGET_BYTES));
    }
    let mut search = Search::new(strategy, policy);
    let baseline = search.baseline(img)?;
    let current = baseline.len() as u64;

    if target > current {
        debug!(target, current, "growing to target");
        Ok(search.grow(img, target, baseline))
    } else if target == current {
        Ok(search.outcome(baseline, FitStatus::Met))
    } else {
        debug!(target, current, "shrinking to target");
        Ok(search.shrink(img, target, baseline))
    }
}

/// Encode `img` at or below `max_bytes`, without padding or resizing.
///
/// Levels go strongest first; qualities sweep down from the policy's start in
/// fixed steps. Over budget yields the last (or smallest) candidate as
/// [`FitStatus::BestEffort`].
pub fn fit_within_max(
    img: &DynamicImage,
    strategy: &dyn FormatStrategy,
    max_bytes: u64,
    policy: &SearchPolicy,
) -> EngineResult<SearchOutcome> {
    let mut search = Search::new(strategy, policy);
    let caps = strategy.capabilities();

    let mut last: Option<Candidate> = None;
    if caps.contains(Capabilities::COMPRESSION_LEVEL) {
        for level in (PNG_MIN_LEVEL..=PNG_MAX_LEVEL).rev() {
            if let Some(c) = search.trial(img, Setting::Level(level)) {
                if c.fits(max_bytes) {
                    return Ok(search.outcome(c, FitStatus::Met));
                }
                // Keep the smallest, not the last.
                if last.as_ref().map_or(true, |l| c.len() < l.len()) {
                    last = Some(c);
                }
            }
        }
    } else if caps.contains(Capabilities::QUALITY) {
        let floor = policy.fit_quality_floor.clamp(MIN_QUALITY, MAX_QUALITY);
        let step = policy.fit_quality_step.max(1);
        let mut q = policy.fit_start_quality.clamp(floor, MAX_QUALITY);
        loop {
            if let Some(c) = search.trial(img, Setting::Quality(q)) {
                if c.fits(max_bytes) {
                    return Ok(search.outcome(c, FitStatus::Met));
                }
                last = Some(c);
            }
            if q <= floor {
                break;
            }
            q = q.saturating_sub(step).max(floor);
        }
    } else if let Some(c) = search.trial(img, strategy.default_setting()) {
        if c.fits(max_bytes) {
            return Ok(search.outcome(c, FitStatus::Met));
        }
        last = Some(c);
    }

    let candidate = match last {
        Some(c) => c,
        None => search.fallback(img)?,
    };
    let status = if candidate.fits(max_bytes) {
        FitStatus::Met
    } else {
        FitStatus::BestEffort
    };
    Ok(search.outcome(candidate, status))
}

/// Single encode at the high-quality default.
pub fn encode_unconstrained(
    img: &DynamicImage,
    strategy: &dyn FormatStrategy,
    policy: &SearchPolicy,
) -> EngineResult<SearchOutcome> {
    let mut search = Search::new(strategy, policy);
    let baseline = search.baseline(img)?;
    Ok(search.outcome(baseline, FitStatus::Unconstrained))
}
