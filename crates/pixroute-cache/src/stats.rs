//! Cache statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub descriptor_hits: u64,
    pub descriptor_misses: u64,
    pub artifact_hits: u64,
    pub artifact_misses: u64,
    /// Entries removed for capacity or expiry (not explicit invalidation)
    pub evictions: u64,
    /// Sources recorded as not found
    pub invalid_marks: u64,
}

impl CacheStats {
    /// Descriptor hit ratio in `[0, 1]`, or `None` before any lookup
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn descriptor_hit_ratio(&self) -> Option<f64> {
        let total = self.descriptor_hits + self.descriptor_misses;
        (total > 0).then(|| self.descriptor_hits as f64 / total as f64)
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    descriptor_hits: AtomicU64,
    descriptor_misses: AtomicU64,
    artifact_hits: AtomicU64,
    artifact_misses: AtomicU64,
    evictions: AtomicU64,
    invalid_marks: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn descriptor(&self, hit: bool) {
        let counter = if hit {
            &self.descriptor_hits
        } else {
            &self.descriptor_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn artifact(&self, hit: bool) {
        let counter = if hit {
            &self.artifact_hits
        } else {
            &self.artifact_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn invalid_mark(&self) {
        self.invalid_marks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            descriptor_hits: self.descriptor_hits.load(Ordering::Relaxed),
            descriptor_misses: self.descriptor_misses.load(Ordering::Relaxed),
            artifact_hits: self.artifact_hits.load(Ordering::Relaxed),
            artifact_misses: self.artifact_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalid_marks: self.invalid_marks.load(Ordering::Relaxed),
        }
    }
}
