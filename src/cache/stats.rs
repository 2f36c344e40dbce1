//! Cache Statistics Module
//!
//! Tracks cache performance counters: hits, misses, sets, evictions and
//! invalidations.

use serde::{Deserialize, Serialize};

// == Cache Stats ==
/// Monotonic cache counters, reset only through [`CacheStats::take`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed retrievals (absent or expired)
    pub misses: u64,
    /// Number of successful writes
    pub sets: u64,
    /// Number of entries evicted to respect capacity
    pub evictions: u64,
    /// Number of entries removed by invalidate or clear
    pub invalidations: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Ratio ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_invalidations(&mut self, count: u64) {
        self.invalidations += count;
    }

    // == Take ==
    /// Resets every counter to zero and returns the values held before.
    pub fn take(&mut self) -> CacheStats {
        std::mem::take(self)
    }
}
