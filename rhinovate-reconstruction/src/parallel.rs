//! Parallel processing utilities for reconstruction
//!
//! Grid work is split into x-slabs; each slab is an independent task whose
//! results are merged in slab order, so output never depends on scheduling.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static PARALLEL_ENABLED: AtomicBool = AtomicBool::new(true);
static MIN_PARALLEL_LEN: AtomicUsize = AtomicUsize::new(4);

/// Parallel processing configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelConfig {
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
    /// Inputs shorter than this run sequentially
    pub min_parallel_len: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_parallel_len: 4,
        }
    }
}

impl ParallelConfig {
    /// Enable or disable parallel processing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_parallel_len(mut self, len: usize) -> Self {
        self.min_parallel_len = len;
        self
    }

    /// Install this configuration process-wide
    pub fn apply(&self) {
        PARALLEL_ENABLED.store(self.enabled, Ordering::Relaxed);
        MIN_PARALLEL_LEN.store(self.min_parallel_len, Ordering::Relaxed);
    }

    /// Currently installed configuration
    pub fn current() -> Self {
        Self {
            enabled: PARALLEL_ENABLED.load(Ordering::Relaxed),
            min_parallel_len: MIN_PARALLEL_LEN.load(Ordering::Relaxed),
        }
    }
}

/// Map `f` over `0..len`, in parallel when enabled; results keep index order
pub fn parallel_map_range<U, F>(len: usize, f: F) -> Vec<U>
where
    U: Send,
    F: Fn(usize) -> U + Sync + Send,
{
    let config = ParallelConfig::current();
    if !config.enabled || len < config.min_parallel_len {
        return (0..len).map(f).collect();
    }
    (0..len).into_par_iter().map(f).collect()
}

/// Parallel map operation over a slice; results keep input order
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    let config = ParallelConfig::current();
    if !config.enabled || data.len() < config.min_parallel_len {
        return data.iter().map(f).collect();
    }
    data.par_iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ParallelConfig::default()
            .with_enabled(false)
            .with_min_parallel_len(64);
        assert!(!config.enabled);
        assert_eq!(config.min_parallel_len, 64);
    }

    #[test]
    fn test_parallel_map_keeps_order() {
        let data: Vec<u32> = (0..100).collect();
        let result = parallel_map(&data, |x| x * 2);
        assert_eq!(result, (0..100).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_parallel_map_range() {
        let result = parallel_map_range(10, |i| i * i);
        assert_eq!(result, vec![0, 1, 4, 9, 16, 25, 36, 49, 64, 81]);
    }
}
