use dashmap::DashMap;
use time::{Duration, OffsetDateTime};

use super::stats::CacheStats;
use crate::types::CacheEntry;

/// Bounded in-memory cache with a TTL and least-recently-used eviction.
///
/// A capacity of zero disables storage entirely; every lookup misses.
#[derive(Debug)]
pub struct MemoryCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl: Duration,
    capacity: usize,
    stats: CacheStats,
}

impl<T: Clone> MemoryCache<T> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity,
            stats: CacheStats::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let now = OffsetDateTime::now_utc();
        let mut expired = false;
        let result = match self.entries.get_mut(key) {
            Some(mut entry) if now - entry.stored_at <= self.ttl => {
                entry.last_accessed = now;
                Some(entry.value.clone())
            }
            Some(_) => {
                expired = true;
                None
            }
            None => None,
        };

        if expired && self.entries.remove(key).is_some() {
            self.stats.record_expiration();
            self.stats.set_entry_count(self.entries.len());
        }

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }

        result
    }

    pub fn insert(&self, key: impl Into<String>, value: T) {
        if self.capacity == 0 {
            return;
        }

        let key = key.into();
        let now = OffsetDateTime::now_utc();
        let entry = CacheEntry {
            value,
            stored_at: now,
            last_accessed: now,
        };
        self.entries.insert(key.clone(), entry);

        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.least_recently_used(&key) else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.stats.record_eviction(evicted);
        }
        self.stats.set_entry_count(self.entries.len());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.stats.set_entry_count(0);
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn least_recently_used(&self, keep: &str) -> Option<String> {
        self.entries
            .iter()
            .filter(|entry| entry.key() != keep)
            .min_by_key(|entry| entry.value().last_accessed)
            .map(|entry| entry.key().clone())
    }
}
