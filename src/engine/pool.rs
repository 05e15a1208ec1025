// src/engine/pool.rs
//
// Global thread pool for batch processing.
//
// One pool serves every batch; it is created lazily on first use and its size
// is fixed from then on. Later `threads` overrides have no effect.
//
// Thread count: the caller's override if given, else
// std::thread::available_parallelism() (respects cgroup/CPU quota),
// else MIN_RAYON_THREADS.

use rayon::ThreadPool;
use std::sync::OnceLock;

/// Upper bound for a configured thread count.
pub const MAX_THREADS: usize = 1024;

/// Minimum number of rayon threads to ensure at least some parallelism
const MIN_RAYON_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Thread count for a given override.
pub fn resolve_thread_count(threads: Option<usize>) -> usize {
    match threads {
        Some(n) if n > 0 => n.min(MAX_THREADS),
        _ => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(MIN_RAYON_THREADS),
    }
}

/// The global pool, or `None` when no pool could be built (callers then run inline).
pub fn get_pool(threads: Option<usize>) -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let num_threads = resolve_thread_count(threads);
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("reduce-image-{i}"))
                .build()
                .or_else(|e| {
                    tracing::warn!(
                        num_threads,
                        error = %e,
                        "thread pool creation failed, retrying with minimum size"
                    );
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(MIN_RAYON_THREADS)
                        .build()
                })
                .map_err(|e| tracing::warn!(error = %e, "no thread pool, batches run inline"))
                .ok()
        })
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_thread_count_override() {
        assert_eq!(resolve_thread_count(Some(3)), 3);
        assert_eq!(resolve_thread_count(Some(MAX_THREADS * 2)), MAX_THREADS);
    }

    #[test]
    fn test_resolve_thread_count_auto() {
        assert!(resolve_thread_count(None) >= MIN_RAYON_THREADS);
        assert_eq!(resolve_thread_count(Some(0)), resolve_thread_count(None));
    }

    #[test]
    fn test_pool_is_shared() {
        let a = get_pool(Some(2)).map(|p| p as *const ThreadPool);
        let b = get_pool(Some(8)).map(|p| p as *const ThreadPool);
        assert_eq!(a, b);
    }
}
