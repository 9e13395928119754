//! Background loading of per-client cluster and tag-affinity snapshots.
//!
//! On notification of a new external resource location, a rebuild is
//! scheduled on a bounded worker pool. The rebuild streams newline-delimited
//! JSON records, constructs a complete immutable store, and swaps it into
//! the client registry atomically on success. Any I/O or parse failure
//! aborts the rebuild and the previous store keeps serving. A loader
//! superseded by a newer notification is not cancelled; whichever publish
//! lands last wins, which is safe because stores are immutable and replaced
//! whole.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Cursor, Read};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::cluster::{
    ClusterDescription, MemoryUserClusterStore, UserCluster, UserClusterStore, UserTagStore,
};
use crate::errors::{EngineError, Result};
use crate::items::ItemMetadata;
use crate::metrics::LOADER_RELOADS_TOTAL;

/// Streams bulk external resources (model output files) by location.
pub trait ResourceStreamer: Send + Sync {
    fn resource_stream(&self, location: &str) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Which per-client snapshot a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    UserClusters,
    TagAffinity,
}

impl ResourceKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::UserClusters => "user_clusters",
            Self::TagAffinity => "tag_affinity",
        }
    }
}

/// One `{user, dim, weight[, group]}` cluster-membership record.
#[derive(Debug, Deserialize)]
struct UserDimWeightRecord {
    user: u64,
    dim: i32,
    weight: f64,
    #[serde(default)]
    group: i32,
}

/// One `{user, tag, weight}` tag-affinity record.
#[derive(Debug, Deserialize)]
struct UserTagRecord {
    user: u64,
    tag: String,
    weight: f32,
}

/// Rebuilds and owns the per-client cluster/tag snapshot registries.
pub struct ExternalDataLoader {
    cluster_stores: DashMap<String, Arc<MemoryUserClusterStore>>,
    tag_stores: DashMap<String, Arc<UserTagStore>>,
    descriptions: DashMap<String, Arc<ClusterDescription>>,
    streamer: Arc<dyn ResourceStreamer>,
    item_meta: Arc<dyn ItemMetadata>,
    permits: Arc<Semaphore>,
}

impl ExternalDataLoader {
    pub fn new(
        streamer: Arc<dyn ResourceStreamer>,
        item_meta: Arc<dyn ItemMetadata>,
        workers: usize,
    ) -> Self {
        Self {
            cluster_stores: DashMap::new(),
            tag_stores: DashMap::new(),
            descriptions: DashMap::new(),
            streamer,
            item_meta,
            permits: Arc::new(Semaphore::new(workers.clamp(1, 5))),
        }
    }

    /// The client's current cluster snapshot, if one has loaded.
    pub fn cluster_store(&self, client: &str) -> Option<Arc<MemoryUserClusterStore>> {
        self.cluster_stores.get(client).map(|s| s.clone())
    }

    /// The client's current tag-affinity snapshot, if one has loaded.
    pub fn tag_store(&self, client: &str) -> Option<Arc<UserTagStore>> {
        self.tag_stores.get(client).map(|s| s.clone())
    }

    /// Human-readable names for the client's clusters.
    pub fn cluster_description(&self, client: &str) -> Option<Arc<ClusterDescription>> {
        self.descriptions.get(client).map(|d| d.clone())
    }

    /// Schedule a background rebuild for `client` from `location`.
    pub fn notify_new_location(
        self: &Arc<Self>,
        client: &str,
        location: &str,
        kind: ResourceKind,
    ) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        let client = client.to_string();
        let location = location.to_string();
        tokio::spawn(async move {
            let _permit = match this.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let join = tokio::task::spawn_blocking(move || this.rebuild(&client, &location, kind));
            if let Err(err) = join.await {
                error!(error = %err, "loader worker panicked");
            }
        })
    }

    /// Drop the client's snapshot outright; subsequent lookups miss cleanly.
    pub fn notify_location_deleted(&self, client: &str, kind: ResourceKind) {
        match kind {
            ResourceKind::UserClusters => {
                self.cluster_stores.remove(client);
                self.descriptions.remove(client);
            }
            ResourceKind::TagAffinity => {
                self.tag_stores.remove(client);
            }
        }
        info!(client, kind = kind.as_str(), "removed client store");
    }

    fn rebuild(&self, client: &str, location: &str, kind: ResourceKind) {
        info!(client, location, kind = kind.as_str(), "reloading client store");
        let result = match kind {
            ResourceKind::UserClusters => self.rebuild_clusters(client, location),
            ResourceKind::TagAffinity => self.rebuild_tags(client, location),
        };
        match result {
            Ok(()) => {
                LOADER_RELOADS_TOTAL
                    .with_label_values(&[kind.as_str(), "ok"])
                    .inc();
                info!(client, kind = kind.as_str(), "finished client store reload");
            }
            Err(err) => {
                LOADER_RELOADS_TOTAL
                    .with_label_values(&[kind.as_str(), "error"])
                    .inc();
                error!(
                    client,
                    kind = kind.as_str(),
                    error = %err,
                    "reload failed, previous store unchanged"
                );
            }
        }
    }

    fn rebuild_clusters(&self, client: &str, location: &str) -> Result<()> {
        let stream = self
            .streamer
            .resource_stream(location)
            .map_err(|err| EngineError::LoaderIo(err.to_string()))?;
        let reader = BufReader::new(stream);

        // records arrive grouped by user; accumulation tolerates any order
        let mut users: HashMap<u64, Vec<UserCluster>> = HashMap::new();
        let mut dimensions: HashSet<i32> = HashSet::new();
        let mut num_records = 0usize;
        for line in reader.lines() {
            let line = line.map_err(|err| EngineError::LoaderIo(err.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: UserDimWeightRecord = serde_json::from_str(&line)
                .map_err(|err| EngineError::LoaderIo(format!("malformed record: {err}")))?;
            users.entry(record.user).or_default().push(UserCluster::new(
                record.user,
                record.dim as i64,
                record.weight,
                0,
                record.group,
            ));
            dimensions.insert(record.dim);
            num_records += 1;
        }

        let store = Arc::new(MemoryUserClusterStore::new(client, users));
        info!(
            client,
            num_users = store.num_users(),
            num_records,
            "loaded user clusters"
        );
        self.descriptions
            .insert(client.to_string(), Arc::new(self.describe(&dimensions)));
        self.cluster_stores.insert(client.to_string(), store);
        Ok(())
    }

    fn rebuild_tags(&self, client: &str, location: &str) -> Result<()> {
        let stream = self
            .streamer
            .resource_stream(location)
            .map_err(|err| EngineError::LoaderIo(err.to_string()))?;
        let reader = BufReader::new(stream);

        let mut affinities: HashMap<u64, HashMap<String, f32>> = HashMap::new();
        let mut num_tags = 0usize;
        for line in reader.lines() {
            let line = line.map_err(|err| EngineError::LoaderIo(err.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: UserTagRecord = serde_json::from_str(&line)
                .map_err(|err| EngineError::LoaderIo(format!("malformed record: {err}")))?;
            affinities
                .entry(record.user)
                .or_default()
                .insert(record.tag, record.weight);
            num_tags += 1;
        }

        let store = Arc::new(UserTagStore::new(affinities));
        info!(
            client,
            num_users = store.num_users(),
            num_tags,
            "loaded user tag affinities"
        );
        self.tag_stores.insert(client.to_string(), store);
        Ok(())
    }

    fn describe(&self, dimensions: &HashSet<i32>) -> ClusterDescription {
        let mut cluster_names = HashMap::new();
        for dim in dimensions {
            match self.item_meta.dimension_name(*dim) {
                Some((group, name)) => {
                    cluster_names.insert(*dim as i64, format!("{group}:{name}"));
                }
                None => warn!(dimension = dim, "no name found for cluster dimension"),
            }
        }
        ClusterDescription::new(cluster_names)
    }
}

/// [`ResourceStreamer`] reading locations as paths under a base directory.
pub struct FileResourceStreamer {
    base: std::path::PathBuf,
}

impl FileResourceStreamer {
    pub fn new(base: impl Into<std::path::PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl ResourceStreamer for FileResourceStreamer {
    fn resource_stream(&self, location: &str) -> std::io::Result<Box<dyn Read + Send>> {
        let file = std::fs::File::open(self.base.join(location))?;
        Ok(Box::new(file))
    }
}

/// Map-backed [`ResourceStreamer`] for tests and single-node setups.
#[derive(Default)]
pub struct InMemoryResourceStreamer {
    resources: DashMap<String, Vec<u8>>,
}

impl InMemoryResourceStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, location: &str, content: impl Into<Vec<u8>>) {
        self.resources.insert(location.to_string(), content.into());
    }
}

impl ResourceStreamer for InMemoryResourceStreamer {
    fn resource_stream(&self, location: &str) -> std::io::Result<Box<dyn Read + Send>> {
        match self.resources.get(location) {
            Some(content) => Ok(Box::new(Cursor::new(content.value().clone()))),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no resource at {location}"),
            )),
        }
    }
}
