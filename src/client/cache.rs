//! TTL response cache for market-data reads.
//!
//! Keys are derived deterministically from the endpoint and its sorted query
//! parameters, so parameter order never splits or collides entries. Freshness
//! is purely time-based: a stale entry is not evicted eagerly, it is simply
//! overwritten by the next successful fetch.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tracing::trace;

/// Build the cache key for an endpoint and its query parameters.
///
/// Parameters are sorted by name before joining, so `a=1&b=2` and `b=2&a=1`
/// produce the same key.
pub fn cache_key(endpoint: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return endpoint.to_string();
    }

    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(&b.1)));

    let mut key = String::with_capacity(endpoint.len() + params.len() * 16);
    key.push_str(endpoint);
    key.push('?');
    for (i, (name, value)) in sorted.iter().enumerate() {
        if i > 0 {
            key.push('&');
        }
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}

/// A cached response with its write time and per-entry TTL.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// Concurrent TTL cache keyed by [`cache_key`] strings.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl ResponseCache {
    /// Create a cache bounded to `max_entries` live entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    /// Fetch a fresh value. Expired entries read as misses.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh() {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Store a value with its TTL, replacing any previous entry.
    pub fn insert(&self, key: String, value: Value, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );

        if self.entries.len() > self.max_entries {
            self.trim();
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh());
        let removed = before - self.entries.len();
        if removed > 0 {
            trace!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Number of entries currently held, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict expired entries first, then oldest entries until within bounds.
    fn trim(&self) {
        self.purge_expired();

        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return;
        }

        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.stored_at))
            .collect();
        by_age.sort_by_key(|(_, stored_at)| *stored_at);

        for (key, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
    }
}
