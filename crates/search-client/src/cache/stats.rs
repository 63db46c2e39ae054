use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for the suggestion memo, updated lock-free from concurrent lookups.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered from a fresh entry
    pub hits: AtomicUsize,
    /// Lookups that found nothing usable, expired entries included
    pub misses: AtomicUsize,
    /// Entries currently held
    pub entry_count: AtomicUsize,
    /// Entries dropped to stay within capacity
    pub evictions: AtomicUsize,
    /// Entries dropped because their TTL elapsed
    pub expirations: AtomicUsize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_entry_count(&self, count: usize) {
        self.entry_count.store(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self, count: usize) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entry_count.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: usize,
    pub misses: usize,
    pub entry_count: usize,
    pub evictions: usize,
    pub expirations: usize,
}

impl CacheStatsSnapshot {
    /// Hit rate as a percentage (0.0 - 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (self.hits as f64 / total as f64) * 100.0
    }

    pub fn total_requests(&self) -> usize {
        self.hits + self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_hits_and_misses() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert!((snapshot.hit_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn records_evictions_and_expirations_separately() {
        let stats = CacheStats::new();
        stats.record_eviction(3);
        stats.record_eviction(2);
        stats.record_expiration();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.evictions, 5);
        assert_eq!(snapshot.expirations, 1);
    }

    #[test]
    fn hit_rate_with_no_requests() {
        let snapshot = CacheStatsSnapshot::default();
        assert_eq!(snapshot.hit_rate(), 0.0);
        assert_eq!(snapshot.total_requests(), 0);
    }
}
