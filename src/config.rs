//! Engine configuration.
//!
//! All tunable parameters in one place with environment variable overrides.
//! Sensible defaults, configurable in production.

use std::env;
use std::time::Duration;

use tracing::info;

use crate::constants::{
    DEFAULT_CACHE_OP_TIMEOUT_MS, DEFAULT_COUNTS_TTL_SECS, DEFAULT_LOADER_WORKERS,
    DEFAULT_SCOPED_COUNTS_MULTIPLIER, DEFAULT_TOP_COUNTS_MULTIPLIER,
    DEFAULT_USER_CLUSTERS_TTL_SECS,
};

/// Engine configuration loaded from environment with defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// TTL for cached cluster top-count snapshots (default: 300s)
    pub counts_ttl_secs: u64,

    /// TTL for cached per-user cluster memberships (default: 600s)
    pub user_clusters_ttl_secs: u64,

    /// Cache operation timeout in milliseconds (default: 500)
    /// Waiters on an in-flight recompute fall back to stale/absent after this.
    pub cache_op_timeout_ms: u64,

    /// Background loader worker pool size (default: 5, clamped to 1..=5)
    pub loader_workers: usize,

    /// Multiplier on the requested count when fetching per-cluster top counts
    /// (default: 5)
    pub top_counts_multiplier: usize,

    /// Multiplier for item-/tag-scoped count fetches (default: 2)
    pub scoped_counts_multiplier: usize,

    /// Whether `sort` drops unmatched (zero-scored) items so the caller can
    /// fill the remainder with most-popular content (default: true). When
    /// false, unmatched items stay in the result, appended in their original
    /// order.
    pub fill_zeros_with_most_popular: bool,

    /// Whether actions with no resolvable cluster membership accrue to the
    /// BUCKET sentinel cluster (default: true)
    pub use_bucket_cluster: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            counts_ttl_secs: DEFAULT_COUNTS_TTL_SECS,
            user_clusters_ttl_secs: DEFAULT_USER_CLUSTERS_TTL_SECS,
            cache_op_timeout_ms: DEFAULT_CACHE_OP_TIMEOUT_MS,
            loader_workers: DEFAULT_LOADER_WORKERS,
            top_counts_multiplier: DEFAULT_TOP_COUNTS_MULTIPLIER,
            scoped_counts_multiplier: DEFAULT_SCOPED_COUNTS_MULTIPLIER,
            fill_zeros_with_most_popular: true,
            use_bucket_cluster: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("RECSERVE_COUNTS_TTL") {
            if let Ok(n) = val.parse() {
                config.counts_ttl_secs = n;
            }
        }

        if let Ok(val) = env::var("RECSERVE_USER_CLUSTERS_TTL") {
            if let Ok(n) = val.parse() {
                config.user_clusters_ttl_secs = n;
            }
        }

        if let Ok(val) = env::var("RECSERVE_CACHE_OP_TIMEOUT_MS") {
            if let Ok(n) = val.parse::<u64>() {
                config.cache_op_timeout_ms = n.clamp(50, 10_000);
            }
        }

        if let Ok(val) = env::var("RECSERVE_LOADER_WORKERS") {
            if let Ok(n) = val.parse::<usize>() {
                config.loader_workers = n.clamp(1, 5);
            }
        }

        if let Ok(val) = env::var("RECSERVE_TOP_COUNTS_MULTIPLIER") {
            if let Ok(n) = val.parse::<usize>() {
                config.top_counts_multiplier = n.clamp(1, 20);
            }
        }

        if let Ok(val) = env::var("RECSERVE_SCOPED_COUNTS_MULTIPLIER") {
            if let Ok(n) = val.parse::<usize>() {
                config.scoped_counts_multiplier = n.clamp(1, 20);
            }
        }

        if let Ok(val) = env::var("RECSERVE_FILL_ZEROS_WITH_MOST_POPULAR") {
            config.fill_zeros_with_most_popular = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = env::var("RECSERVE_USE_BUCKET_CLUSTER") {
            config.use_bucket_cluster = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Cache operation timeout as a [`Duration`].
    pub fn cache_op_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_op_timeout_ms)
    }

    /// Counts TTL as a [`Duration`].
    pub fn counts_ttl(&self) -> Duration {
        Duration::from_secs(self.counts_ttl_secs)
    }

    /// User-cluster TTL as a [`Duration`].
    pub fn user_clusters_ttl(&self) -> Duration {
        Duration::from_secs(self.user_clusters_ttl_secs)
    }

    /// Log the current configuration.
    pub fn log(&self) {
        info!("Engine configuration:");
        info!("   Counts TTL: {}s", self.counts_ttl_secs);
        info!("   User clusters TTL: {}s", self.user_clusters_ttl_secs);
        info!("   Cache op timeout: {}ms", self.cache_op_timeout_ms);
        info!("   Loader workers: {}", self.loader_workers);
        info!(
            "   Top-count multipliers: {}x / {}x scoped",
            self.top_counts_multiplier, self.scoped_counts_multiplier
        );
        info!(
            "   Sort drops unmatched items: {}",
            self.fill_zeros_with_most_popular
        );
        info!("   Bucket cluster: {}", self.use_bucket_cluster);
    }
}
