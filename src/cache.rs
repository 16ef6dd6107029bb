// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Short-lived memoization for the dashboard read path.
//!
//! Entries are bounded by count (LRU) and by age (TTL checked lazily on
//! access). Serving a slightly stale value is accepted in exchange for
//! latency. A failed computation is never stored.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::period::Period;
use lru::LruCache;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Cache key built from the exact query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Start a key for a query kind, e.g. `"snapshot"`.
    pub fn new(kind: &str) -> Self {
        Self(kind.to_string())
    }

    /// Append a window.
    pub fn with_period(mut self, period: &Period) -> Self {
        self.0.push('|');
        self.0.push_str(&period.key());
        self
    }

    /// Append a named filter value.
    pub fn with_filter(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.0.push('|');
        self.0.push_str(name);
        self.0.push('=');
        self.0.push_str(&value.to_string());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Freshness class of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPolicy {
    /// Live dashboard KPIs.
    Live,
    /// Historical chart series.
    Historical,
}

impl TtlPolicy {
    pub fn ttl(&self, config: &CacheConfig) -> Duration {
        match self {
            TtlPolicy::Live => config.live_ttl(),
            TtlPolicy::Historical => config.historical_ttl(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }
}

/// Size- and time-bounded result cache.
pub struct ResultCache<V> {
    entries: Mutex<LruCache<CacheKey, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<V: Clone> ResultCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key` if younger than its TTL, otherwise
    /// run `compute`, store its value and return it.
    ///
    /// `compute` runs outside the lock; concurrent misses on one key may both
    /// compute, the last writer wins.
    pub fn get_or_compute<F>(&self, key: &CacheKey, ttl: Duration, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("cache hit: {}", key);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log::trace!("cache miss: {}", key);
        let value = compute()?;
        self.insert(key.clone(), value.clone(), ttl);
        Ok(value)
    }

    /// Fresh cached value for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.lookup(key)
    }

    /// Drop one entry.
    pub fn invalidate(&self, key: &CacheKey) {
        self.entries().pop(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size: self.len(),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Entries are plain data, so a guard poisoned by a panicking holder is
    /// still usable.
    fn entries(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            log::warn!("result cache lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn lookup(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries();
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.pop(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn insert(&self, key: CacheKey, value: V, ttl: Duration) {
        let mut entries = self.entries();
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
