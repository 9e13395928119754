//! Per-client cluster and tag-affinity snapshots.
//!
//! Stores are immutable once built: the loader constructs a complete new
//! snapshot off-thread and swaps it into the client registry as a whole.
//! Readers therefore never observe a partially loaded store.

pub mod counts;
pub mod recommender;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Fractional membership of one user in one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCluster {
    pub user: u64,
    pub cluster: i64,
    /// Membership weight in [0, 1].
    pub weight: f64,
    /// Epoch seconds the membership was computed at (0 when unknown).
    pub time_stamp: i64,
    /// Membership group, used for optional group-scoped pruning.
    pub group: i32,
}

impl UserCluster {
    pub fn new(user: u64, cluster: i64, weight: f64, time_stamp: i64, group: i32) -> Self {
        Self {
            user,
            cluster,
            weight,
            time_stamp,
            group,
        }
    }
}

/// Read access to a client's long-term user→cluster memberships.
pub trait UserClusterStore: Send + Sync {
    /// All cluster memberships for a user; empty when unknown.
    fn clusters(&self, user: u64) -> Vec<UserCluster>;

    /// Number of users in the snapshot.
    fn num_users(&self) -> usize;

    /// Whether lookups should go through the shared external cache. An
    /// in-memory snapshot is already fast and opts out.
    fn needs_external_caching(&self) -> bool;
}

/// Immutable in-memory user→cluster snapshot for one client.
#[derive(Debug)]
pub struct MemoryUserClusterStore {
    client: String,
    users: HashMap<u64, Vec<UserCluster>>,
}

impl MemoryUserClusterStore {
    pub fn new(client: &str, users: HashMap<u64, Vec<UserCluster>>) -> Self {
        Self {
            client: client.to_string(),
            users,
        }
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    /// Distinct cluster ids present in the snapshot.
    pub fn cluster_ids(&self) -> HashSet<i64> {
        self.users
            .values()
            .flatten()
            .map(|c| c.cluster)
            .collect()
    }
}

impl UserClusterStore for MemoryUserClusterStore {
    fn clusters(&self, user: u64) -> Vec<UserCluster> {
        self.users.get(&user).cloned().unwrap_or_default()
    }

    fn num_users(&self) -> usize {
        self.users.len()
    }

    fn needs_external_caching(&self) -> bool {
        false
    }
}

/// Human-readable cluster names, derived from dimension metadata at load
/// time.
#[derive(Debug, Clone, Default)]
pub struct ClusterDescription {
    pub cluster_names: HashMap<i64, String>,
}

impl ClusterDescription {
    pub fn new(cluster_names: HashMap<i64, String>) -> Self {
        Self { cluster_names }
    }

    pub fn name(&self, cluster: i64) -> Option<&str> {
        self.cluster_names.get(&cluster).map(String::as_str)
    }
}

/// Immutable in-memory user→tag-affinity snapshot for one client.
#[derive(Debug, Default)]
pub struct UserTagStore {
    affinities: HashMap<u64, HashMap<String, f32>>,
}

impl UserTagStore {
    pub fn new(affinities: HashMap<u64, HashMap<String, f32>>) -> Self {
        Self { affinities }
    }

    /// Tag→affinity-weight map for a user; empty when unknown.
    pub fn tag_affinities(&self, user: u64) -> HashMap<String, f32> {
        self.affinities.get(&user).cloned().unwrap_or_default()
    }

    pub fn num_users(&self) -> usize {
        self.affinities.len()
    }
}

/// Maps an HTTP referrer to the clusters it implies.
pub trait ClusterFromReferrer: Send + Sync {
    fn clusters(&self, referrer: &str) -> Option<HashSet<i64>>;
}
