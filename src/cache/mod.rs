//! Shared cache contract and in-memory implementation.
//!
//! The backend models the memcached get/put/delete/add contract: opaque byte
//! values, per-entry TTLs, and a store-if-absent primitive. Backend failures
//! are never propagated to recommendation callers; implementations swallow
//! them and report a miss, so a broken cache degrades to recomputation.
//!
//! Values are stored as [`CacheEntry`] snapshots carrying their generation
//! time: staleness is acceptable, absence is not.

pub mod keys;
pub mod stampede;

pub use self::stampede::StampedeGuard;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A cached value snapshot plus the time it was generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub generated_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            generated_at: Utc::now(),
        }
    }

    /// Whether this entry is older than `ttl`.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.generated_at);
        age.num_milliseconds() > ttl.as_millis() as i64
    }
}

/// Memcached-style cache backend contract.
///
/// All operations carry an implementation-level timeout; errors and timeouts
/// are swallowed and reported as misses (`get` → `None`, `add` → `false`),
/// never as request failures.
pub trait CacheBackend: Send + Sync {
    /// Fetch the raw bytes for `key`, or `None` on miss/expiry/error.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key` for `ttl`.
    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration);

    /// Remove `key`.
    fn delete(&self, key: &str);

    /// Store `value` only if `key` is currently absent. Returns whether the
    /// store happened. This is the compare-and-swap-style primitive the
    /// stampede guard uses for its cross-process in-flight marker.
    fn add(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool;
}

/// Typed helpers over the raw byte contract.
pub trait CacheBackendExt: CacheBackend {
    /// Fetch and decode a typed entry. Decode failures count as misses.
    fn get_entry<V: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<V>> {
        let bytes = self.get(key)?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Encode and store a typed entry stamped with the current time.
    fn put_entry<V: Serialize>(&self, key: &str, value: &V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            generated_at: Utc::now(),
        };
        if let Ok(bytes) = serde_json::to_vec(&entry) {
            self.put(key, bytes, ttl);
        }
    }
}

impl<T: CacheBackend + ?Sized> CacheBackendExt for T {}

/// Hit/miss counters for the in-memory backend.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

struct StoredValue {
    bytes: Vec<u8>,
    deadline: Instant,
}

/// Process-local [`CacheBackend`] used in tests and single-node deployments.
///
/// Entries expire lazily: reads past the deadline behave as misses and evict
/// the entry.
#[derive(Default)]
pub struct InMemoryCacheBackend {
    entries: DashMap<String, StoredValue>,
    stats: CacheStats,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of live (possibly expired but unevicted) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheBackend for InMemoryCacheBackend {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(stored) = self.entries.get(key) {
            if stored.deadline > Instant::now() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(stored.bytes.clone());
            }
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        // expired
        self.entries.remove(key);
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                deadline: Instant::now() + ttl,
            },
        );
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    fn add(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().deadline <= now {
                    occupied.insert(StoredValue {
                        bytes: value,
                        deadline: now + ttl,
                    });
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(StoredValue {
                    bytes: value,
                    deadline: now + ttl,
                });
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let cache = InMemoryCacheBackend::new();
        cache.put("k", b"v".to_vec(), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(b"v".to_vec()));
    }

    #[test]
    fn test_expiry_is_a_miss() {
        let cache = InMemoryCacheBackend::new();
        cache.put("k", b"v".to_vec(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_add_only_when_absent() {
        let cache = InMemoryCacheBackend::new();
        assert!(cache.add("k", b"a".to_vec(), Duration::from_secs(60)));
        assert!(!cache.add("k", b"b".to_vec(), Duration::from_secs(60)));
        assert_eq!(cache.get("k"), Some(b"a".to_vec()));
    }

    #[test]
    fn test_typed_entry_roundtrip() {
        let cache = InMemoryCacheBackend::new();
        cache.put_entry("k", &vec![1u64, 2, 3], Duration::from_secs(60));
        let entry: CacheEntry<Vec<u64>> = cache.get_entry("k").expect("entry");
        assert_eq!(entry.value, vec![1, 2, 3]);
        assert!(!entry.is_stale(Duration::from_secs(60)));
    }
}
