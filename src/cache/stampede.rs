//! Single-flight cache refresh.
//!
//! Protects the backing store from cache stampede: when a cached value is
//! stale or absent, at most one caller per key performs the recompute while
//! concurrent callers are served the old value (if any) or await the
//! in-flight result with a timeout. Single-flight is enforced per key via an
//! in-flight handle map, never a process-wide lock. Cross-process
//! convergence relies on backend TTLs; a short-lived store-if-absent marker
//! lets sibling processes skip redundant recomputes opportunistically.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::keys;
use crate::cache::{CacheBackend, CacheBackendExt, CacheEntry};
use crate::constants::INFLIGHT_MARKER_TTL_SECS;

/// Backend hard-expiry multiplier over the logical TTL. Entries outlive
/// their freshness window so stale values remain servable while a refresh
/// runs.
const STALE_RETENTION_FACTOR: u32 = 4;
use crate::errors::{EngineError, Result};
use crate::metrics::CACHE_SINGLE_FLIGHT_TOTAL;

/// Outcome of a finished recompute, shared with waiting callers.
#[derive(Clone)]
enum Completion {
    /// Serialized [`CacheEntry`] bytes of the fresh value.
    Fresh(Vec<u8>),
    /// The backing store cannot serve this query shape.
    Unsupported,
    /// The recompute failed.
    Failed(String),
}

struct InFlight {
    done: Mutex<Option<Completion>>,
    cond: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            done: Mutex::new(None),
            cond: Condvar::new(),
        }
    }
}

/// Single-flight cache-refresh guard over a shared [`CacheBackend`].
pub struct StampedeGuard {
    backend: Arc<dyn CacheBackend>,
    in_flight: DashMap<String, Arc<InFlight>>,
    op_timeout: Duration,
}

impl StampedeGuard {
    pub fn new(backend: Arc<dyn CacheBackend>, op_timeout: Duration) -> Self {
        Self {
            backend,
            in_flight: DashMap::new(),
            op_timeout,
        }
    }

    /// The underlying backend, for plain (non-guarded) get/put paths.
    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Fetch the cached value for `key`, fresh or stale, without refreshing.
    pub fn peek<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.backend.get_entry::<V>(key).map(|entry| entry.value)
    }

    /// Store a value under `key` without going through a recompute.
    pub fn store<V: Serialize>(&self, key: &str, value: &V, ttl: Duration) {
        self.backend.put_entry(key, value, ttl);
    }

    /// Drop the cached value for `key`.
    pub fn invalidate(&self, key: &str) {
        self.backend.delete(key);
    }

    /// Return the cached value for `key` if present and fresh; otherwise
    /// ensure at most one concurrent recompute per key.
    ///
    /// Concurrent callers receive the stale value immediately when one
    /// exists, or await the in-flight result up to the operation timeout. A
    /// successful recompute atomically replaces the cache entry. A failed
    /// recompute leaves the prior value in place; the failure surfaces only
    /// to callers with no cached value to fall back on.
    /// [`EngineError::UnsupportedQuery`] always propagates so callers can
    /// fall back to a broader query.
    pub fn get_or_refresh<V, F>(&self, key: &str, ttl: Duration, recompute: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<V>,
    {
        let mut stale: Option<V> = None;
        match self.backend.get_entry::<V>(key) {
            Some(entry) if !entry.is_stale(ttl) => {
                CACHE_SINGLE_FLIGHT_TOTAL.with_label_values(&["fresh"]).inc();
                return Ok(entry.value);
            }
            Some(entry) => stale = Some(entry.value),
            None => {}
        }

        let (handle, claimed) = match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => (occupied.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let handle = Arc::new(InFlight::new());
                vacant.insert(handle.clone());
                (handle, true)
            }
        };

        if claimed {
            self.refresh(key, ttl, stale, handle, recompute)
        } else if let Some(value) = stale {
            // Someone else is already recomputing; the old value is good
            // enough for this caller.
            CACHE_SINGLE_FLIGHT_TOTAL.with_label_values(&["stale"]).inc();
            Ok(value)
        } else {
            self.await_refresh(key, &handle)
        }
    }

    fn refresh<V, F>(
        &self,
        key: &str,
        ttl: Duration,
        stale: Option<V>,
        handle: Arc<InFlight>,
        recompute: F,
    ) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<V>,
    {
        let marker = keys::in_flight_marker(key);
        let marker_won = self.backend.add(
            &marker,
            vec![1],
            Duration::from_secs(INFLIGHT_MARKER_TTL_SECS),
        );
        if !marker_won {
            if let Some(value) = stale {
                // A sibling process holds the refresh; stale is acceptable.
                debug!(key, "refresh already in flight elsewhere, serving stale value");
                self.complete(
                    key,
                    &handle,
                    Completion::Failed("refresh in progress elsewhere".to_string()),
                );
                CACHE_SINGLE_FLIGHT_TOTAL.with_label_values(&["ceded"]).inc();
                return Ok(value);
            }
            // Absence is worse than duplicate work: recompute anyway.
            return self.run_recompute(key, ttl, None, handle, recompute, &marker);
        }
        self.run_recompute(key, ttl, stale, handle, recompute, &marker)
    }

    fn run_recompute<V, F>(
        &self,
        key: &str,
        ttl: Duration,
        stale: Option<V>,
        handle: Arc<InFlight>,
        recompute: F,
        marker: &str,
    ) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<V>,
    {
        match recompute() {
            Ok(value) => {
                let entry = CacheEntry::new(value);
                match serde_json::to_vec(&entry) {
                    Ok(bytes) => {
                        self.backend
                            .put(key, bytes.clone(), ttl * STALE_RETENTION_FACTOR);
                        self.backend.delete(marker);
                        self.complete(key, &handle, Completion::Fresh(bytes));
                    }
                    Err(err) => {
                        warn!(key, error = %err, "failed to encode cache entry");
                        self.backend.delete(marker);
                        self.complete(key, &handle, Completion::Failed(err.to_string()));
                    }
                }
                CACHE_SINGLE_FLIGHT_TOTAL
                    .with_label_values(&["recomputed"])
                    .inc();
                Ok(entry.value)
            }
            Err(EngineError::UnsupportedQuery) => {
                self.backend.delete(marker);
                self.complete(key, &handle, Completion::Unsupported);
                CACHE_SINGLE_FLIGHT_TOTAL
                    .with_label_values(&["unsupported"])
                    .inc();
                Err(EngineError::UnsupportedQuery)
            }
            Err(err) => {
                self.backend.delete(marker);
                self.complete(key, &handle, Completion::Failed(err.to_string()));
                CACHE_SINGLE_FLIGHT_TOTAL.with_label_values(&["failed"]).inc();
                if let Some(value) = stale {
                    warn!(key, error = %err, "recompute failed, serving stale value");
                    Ok(value)
                } else {
                    Err(EngineError::RefreshFailed {
                        key: key.to_string(),
                        reason: err.to_string(),
                    })
                }
            }
        }
    }

    fn await_refresh<V: DeserializeOwned>(&self, key: &str, handle: &Arc<InFlight>) -> Result<V> {
        let deadline = Instant::now() + self.op_timeout;
        let mut done = handle.done.lock();
        while done.is_none() {
            let now = Instant::now();
            if now >= deadline {
                CACHE_SINGLE_FLIGHT_TOTAL
                    .with_label_values(&["wait_timeout"])
                    .inc();
                return Err(EngineError::RefreshTimeout {
                    key: key.to_string(),
                });
            }
            handle.cond.wait_for(&mut done, deadline - now);
        }
        match done.clone() {
            Some(Completion::Fresh(bytes)) => {
                let entry: CacheEntry<V> = serde_json::from_slice(&bytes).map_err(|err| {
                    EngineError::RefreshFailed {
                        key: key.to_string(),
                        reason: err.to_string(),
                    }
                })?;
                CACHE_SINGLE_FLIGHT_TOTAL.with_label_values(&["waited"]).inc();
                Ok(entry.value)
            }
            Some(Completion::Unsupported) => Err(EngineError::UnsupportedQuery),
            Some(Completion::Failed(reason)) => Err(EngineError::RefreshFailed {
                key: key.to_string(),
                reason,
            }),
            None => unreachable!("loop exits only once completed"),
        }
    }

    fn complete(&self, key: &str, handle: &Arc<InFlight>, completion: Completion) {
        *handle.done.lock() = Some(completion);
        handle.cond.notify_all();
        self.in_flight.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;

    fn guard() -> StampedeGuard {
        StampedeGuard::new(
            Arc::new(InMemoryCacheBackend::new()),
            Duration::from_millis(500),
        )
    }

    #[test]
    fn test_miss_recomputes_and_caches() {
        let guard = guard();
        let v: u64 = guard
            .get_or_refresh("k", Duration::from_secs(60), || Ok(42u64))
            .expect("refresh");
        assert_eq!(v, 42);
        // second call is a fresh hit, recompute must not run
        let v: u64 = guard
            .get_or_refresh("k", Duration::from_secs(60), || {
                panic!("must not recompute")
            })
            .expect("cached");
        assert_eq!(v, 42);
    }

    #[test]
    fn test_failure_with_no_cached_value_is_typed() {
        let guard = guard();
        let res: Result<u64> = guard.get_or_refresh("k", Duration::from_secs(60), || {
            Err(EngineError::CacheBackend("boom".to_string()))
        });
        match res {
            Err(EngineError::RefreshFailed { key, .. }) => assert_eq!(key, "k"),
            other => panic!("expected RefreshFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_keeps_prior_value() {
        let guard = guard();
        // present in the backend, stale for a zero logical TTL
        guard.store("k", &7u64, Duration::from_secs(60));
        let res: Result<u64> = guard.get_or_refresh("k", Duration::from_millis(0), || {
            Err(EngineError::CacheBackend("boom".to_string()))
        });
        assert_eq!(res.expect("stale value served"), 7);
        assert_eq!(guard.peek::<u64>("k"), Some(7));
    }

    #[test]
    fn test_unsupported_propagates_even_with_stale_value() {
        let guard = guard();
        guard.store("k", &7u64, Duration::from_secs(60));
        let res: Result<u64> =
            guard.get_or_refresh("k", Duration::from_millis(0), || Err(EngineError::UnsupportedQuery));
        assert!(matches!(res, Err(EngineError::UnsupportedQuery)));
    }
}
