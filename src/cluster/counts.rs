//! Cluster/item count aggregation contract and in-memory implementation.
//!
//! A count store owns the (cluster, item) → weighted-count aggregates, with
//! time decay applied at read time. Not every store can serve every query
//! shape: narrowed queries (by dimension or tag) return
//! [`CountQueryError::Unsupported`] when the store cannot express them, and
//! the recommender falls back to the unnarrowed query plus in-process
//! filtering. That branch is expected, not exceptional.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use parking_lot::RwLock;

use crate::decay;

/// item id → aggregated score.
pub type ItemCounts = HashMap<u64, f64>;

/// Why a count query could not be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountQueryError {
    /// The store cannot serve this query shape; callers fall back to a
    /// broader query.
    Unsupported,
    /// The store's backing medium failed.
    Backend(String),
}

pub type CountResult<T> = std::result::Result<T, CountQueryError>;

/// Count aggregate contract.
///
/// `decay` parameters are a per-day rate for the store's decay curve; `0.0`
/// disables decay. The only contract on the curve is that it weights counts
/// by a monotonically non-increasing, non-negative function of elapsed time.
pub trait ClusterCountStore: Send + Sync {
    /// Set the write-time decay rate applied when folding new activity into
    /// existing counts.
    fn set_alpha(&self, alpha: f64);

    /// Accumulate `weight` for `item` in `cluster` at epoch-seconds `time`.
    /// `cluster_timestamp` is the membership snapshot time of the cluster
    /// (0 when not applicable).
    fn add(&self, cluster: i64, item: u64, weight: f64, cluster_timestamp: i64, time: i64);

    /// The decayed count of one item in one cluster.
    fn count(&self, cluster: i64, item: u64, time: i64) -> f64;

    /// Global top counts across all clusters.
    fn top_counts(&self, limit: usize, decay: f64) -> CountResult<ItemCounts>;

    /// Global top counts restricted to items in the given dimensions.
    fn top_counts_by_dimension(
        &self,
        dimensions: &HashSet<i32>,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts>;

    /// Global top counts restricted to two dimension scopes.
    fn top_counts_by_two_dimensions(
        &self,
        dimensions: &HashSet<i32>,
        dimension2: i32,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts>;

    /// Global top counts for items carrying a textual tag attribute.
    fn top_counts_by_tag(
        &self,
        tag: &str,
        tag_attr_id: i32,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts>;

    /// Tag-scoped top counts additionally restricted to dimensions (and
    /// optionally a second dimension scope).
    fn top_counts_by_tag_and_dimension(
        &self,
        tag: &str,
        tag_attr_id: i32,
        dimensions: &HashSet<i32>,
        dimension2: Option<i32>,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts>;

    /// Top counts within one cluster.
    fn top_counts_for_cluster(
        &self,
        cluster: i64,
        timestamp: i64,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts>;

    /// Top counts within one cluster restricted to dimensions.
    fn top_counts_for_cluster_by_dimension(
        &self,
        cluster: i64,
        dimensions: &HashSet<i32>,
        timestamp: i64,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts>;

    /// Top counts within one cluster scored by significance (lift over
    /// global popularity) rather than raw volume.
    fn top_significant_counts_by_dimension(
        &self,
        cluster: i64,
        dimensions: &HashSet<i32>,
        timestamp: i64,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts>;

    /// Whether reads should go through the shared external cache. A store
    /// answering from process memory opts out.
    fn needs_external_caching(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct DecayedCount {
    count: f64,
    last_time: i64,
}

/// In-memory [`ClusterCountStore`].
///
/// Counts decay exponentially: on write, the existing count is decayed from
/// its last activity to the new activity time before the new weight is added
/// (rate = alpha); on read, the stored count is decayed from its last
/// activity to the query time using the query's `decay` rate. Dimension- and
/// tag-narrowed queries are not expressible here and report `Unsupported`.
pub struct MemoryClusterCountStore {
    alpha: RwLock<f64>,
    counts: RwLock<HashMap<i64, HashMap<u64, DecayedCount>>>,
}

impl Default for MemoryClusterCountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClusterCountStore {
    pub fn new() -> Self {
        Self {
            alpha: RwLock::new(1.0),
            counts: RwLock::new(HashMap::new()),
        }
    }

    fn decayed(&self, stored: DecayedCount, now: i64, rate: f64) -> f64 {
        stored.count * decay::between(stored.last_time, now, rate)
    }

    fn top_n(mut scored: Vec<(u64, f64)>, limit: usize) -> ItemCounts {
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(limit);
        scored.into_iter().collect()
    }

    fn now_secs() -> i64 {
        Utc::now().timestamp()
    }
}

impl ClusterCountStore for MemoryClusterCountStore {
    fn set_alpha(&self, alpha: f64) {
        *self.alpha.write() = alpha.max(0.0);
    }

    fn add(&self, cluster: i64, item: u64, weight: f64, _cluster_timestamp: i64, time: i64) {
        let alpha = *self.alpha.read();
        let mut counts = self.counts.write();
        let entry = counts
            .entry(cluster)
            .or_default()
            .entry(item)
            .or_insert(DecayedCount {
                count: 0.0,
                last_time: time,
            });
        let decayed = entry.count * decay::between(entry.last_time, time, alpha);
        entry.count = decayed + weight;
        entry.last_time = entry.last_time.max(time);
    }

    fn count(&self, cluster: i64, item: u64, time: i64) -> f64 {
        let counts = self.counts.read();
        counts
            .get(&cluster)
            .and_then(|items| items.get(&item))
            .map(|stored| self.decayed(*stored, time, *self.alpha.read()))
            .unwrap_or(0.0)
    }

    fn top_counts(&self, limit: usize, decay: f64) -> CountResult<ItemCounts> {
        let now = Self::now_secs();
        let counts = self.counts.read();
        let mut totals: HashMap<u64, f64> = HashMap::new();
        for items in counts.values() {
            for (item, stored) in items {
                *totals.entry(*item).or_insert(0.0) += self.decayed(*stored, now, decay);
            }
        }
        Ok(Self::top_n(totals.into_iter().collect(), limit))
    }

    fn top_counts_by_dimension(
        &self,
        _dimensions: &HashSet<i32>,
        _limit: usize,
        _decay: f64,
    ) -> CountResult<ItemCounts> {
        Err(CountQueryError::Unsupported)
    }

    fn top_counts_by_two_dimensions(
        &self,
        _dimensions: &HashSet<i32>,
        _dimension2: i32,
        _limit: usize,
        _decay: f64,
    ) -> CountResult<ItemCounts> {
        Err(CountQueryError::Unsupported)
    }

    fn top_counts_by_tag(
        &self,
        _tag: &str,
        _tag_attr_id: i32,
        _limit: usize,
        _decay: f64,
    ) -> CountResult<ItemCounts> {
        Err(CountQueryError::Unsupported)
    }

    fn top_counts_by_tag_and_dimension(
        &self,
        _tag: &str,
        _tag_attr_id: i32,
        _dimensions: &HashSet<i32>,
        _dimension2: Option<i32>,
        _limit: usize,
        _decay: f64,
    ) -> CountResult<ItemCounts> {
        Err(CountQueryError::Unsupported)
    }

    fn top_counts_for_cluster(
        &self,
        cluster: i64,
        _timestamp: i64,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts> {
        let now = Self::now_secs();
        let counts = self.counts.read();
        let scored: Vec<(u64, f64)> = counts
            .get(&cluster)
            .map(|items| {
                items
                    .iter()
                    .map(|(item, stored)| (*item, self.decayed(*stored, now, decay)))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::top_n(scored, limit))
    }

    fn top_counts_for_cluster_by_dimension(
        &self,
        _cluster: i64,
        _dimensions: &HashSet<i32>,
        _timestamp: i64,
        _limit: usize,
        _decay: f64,
    ) -> CountResult<ItemCounts> {
        Err(CountQueryError::Unsupported)
    }

    fn top_significant_counts_by_dimension(
        &self,
        cluster: i64,
        _dimensions: &HashSet<i32>,
        _timestamp: i64,
        limit: usize,
        decay: f64,
    ) -> CountResult<ItemCounts> {
        // Significance = cluster count damped by global popularity, so items
        // that are popular everywhere do not dominate every cluster.
        let now = Self::now_secs();
        let counts = self.counts.read();
        let Some(items) = counts.get(&cluster) else {
            return Ok(ItemCounts::new());
        };
        let mut globals: HashMap<u64, f64> = HashMap::new();
        for cluster_items in counts.values() {
            for (item, stored) in cluster_items {
                *globals.entry(*item).or_insert(0.0) += self.decayed(*stored, now, decay);
            }
        }
        let scored: Vec<(u64, f64)> = items
            .iter()
            .map(|(item, stored)| {
                let local = self.decayed(*stored, now, decay);
                let global = globals.get(item).copied().unwrap_or(local);
                (*item, local / global.max(1e-9).sqrt())
            })
            .collect();
        Ok(Self::top_n(scored, limit))
    }

    fn needs_external_caching(&self) -> bool {
        false
    }
}
