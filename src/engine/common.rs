// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Provides the codec panic policy and the engine Result alias.

use crate::error::ReduceImageError;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub type EngineResult<T> = std::result::Result<T, ReduceImageError>;

/// Run a codec call, converting any panic into `InternalPanic`.
///
/// Codec bindings (mozjpeg in particular) report some failures by unwinding.
/// The label names the call site in the resulting error, e.g. `"encode:jpeg"`.
pub fn run_with_panic_policy<T, F>(label: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            tracing::warn!(label, detail = %detail, "codec panicked");
            Err(ReduceImageError::internal_panic(format!(
                "{label}: panic: {detail}"
            )))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
