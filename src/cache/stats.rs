//! Hit/miss bookkeeping for the result cache.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;

pub(crate) const METRIC_CACHE_HIT: &str = "rentdesk_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "rentdesk_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "rentdesk_cache_evict_total";
pub(crate) const METRIC_CACHE_EXPIRED: &str = "rentdesk_cache_expired_total";
pub(crate) const METRIC_CACHE_INVALIDATE: &str = "rentdesk_cache_invalidate_total";
pub(crate) const METRIC_CACHE_INVALIDATED_ENTRIES: &str = "rentdesk_cache_invalidated_entries_total";

/// Lookup counters kept alongside the store.
///
/// Every recording also increments the matching `metrics` counter labelled
/// with the table name.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, table: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_HIT, "table" => table.to_string()).increment(1);
    }

    pub fn record_miss(&self, table: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_MISS, "table" => table.to_string()).increment(1);
    }

    pub fn record_eviction(&self, table: &str) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_EVICT, "table" => table.to_string()).increment(1);
    }

    pub fn record_expiration(&self, table: &str) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_EXPIRED, "table" => table.to_string()).increment(1);
    }

    pub fn record_invalidation(&self, table: &str, removed: usize) {
        counter!(METRIC_CACHE_INVALIDATE, "table" => table.to_string()).increment(1);
        counter!(METRIC_CACHE_INVALIDATED_ENTRIES, "table" => table.to_string())
            .increment(removed as u64);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Percentage of lookups that were hits (0.0 to 100.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total * 100.0
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_a_percentage() {
        let counters = CacheCounters::new();
        assert_eq!(counters.hit_rate(), 0.0);

        counters.record_hit("cars");
        counters.record_hit("cars");
        counters.record_hit("cars");
        counters.record_miss("cars");

        assert!((counters.hit_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_clears_counts() {
        let counters = CacheCounters::new();
        counters.record_hit("cars");
        counters.record_miss("bookings");
        counters.record_eviction("cars");
        counters.record_expiration("profiles");

        counters.reset();

        assert_eq!(counters.hits(), 0);
        assert_eq!(counters.misses(), 0);
        assert_eq!(counters.evictions(), 0);
        assert_eq!(counters.expirations(), 0);
    }
}
