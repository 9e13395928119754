//! Engine-wide constants.
//!
//! Tunable values live in [`crate::config::EngineConfig`]; the constants here
//! are part of the data model or cache contract and are not expected to vary
//! per deployment.

/// Sentinel cluster id used as the accumulation target when a user or action
/// has no resolvable cluster membership. Lets global popularity accrue even
/// for unclustered traffic.
pub const BUCKET_CLUSTER_ID: i64 = -1;

/// Dimension id meaning "no dimension restriction". A dimension set that is
/// empty or contains only this id is treated as unscoped.
pub const DEFAULT_DIMENSION: i32 = 0;

/// Default TTL for cached cluster top-count snapshots, in seconds.
pub const DEFAULT_COUNTS_TTL_SECS: u64 = 300;

/// Default TTL for cached per-user cluster memberships, in seconds.
pub const DEFAULT_USER_CLUSTERS_TTL_SECS: u64 = 600;

/// Default cache/backing-store operation timeout, in milliseconds. Waiters on
/// an in-flight recompute give up after this and fall back to stale/absent.
pub const DEFAULT_CACHE_OP_TIMEOUT_MS: u64 = 500;

/// Default number of background loader workers.
pub const DEFAULT_LOADER_WORKERS: usize = 5;

/// Multiplier applied to the requested recommendation count when fetching
/// per-cluster top counts, so that filtering and merging still leave enough
/// candidates.
pub const DEFAULT_TOP_COUNTS_MULTIPLIER: usize = 5;

/// Smaller multiplier used for item- and tag-scoped count fetches.
pub const DEFAULT_SCOPED_COUNTS_MULTIPLIER: usize = 2;

/// TTL for the cross-process in-flight refresh marker, in seconds. Short so
/// a crashed refresher cannot suppress recomputation for long.
pub const INFLIGHT_MARKER_TTL_SECS: u64 = 30;

// Config push wire keys. The config distribution service addresses entries
// by these strings.
pub const CONFIG_KEY_ALGS: &str = "algs";
pub const CONFIG_KEY_TEST_SWITCH: &str = "alg_test_switch";
pub const CONFIG_KEY_TEST: &str = "alg_test";
pub const CONFIG_KEY_RECTAG: &str = "alg_rectags";
