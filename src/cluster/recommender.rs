//! Cluster-count recommendation computation.
//!
//! Aggregates decayed cluster/item counts into ranked recommendations. For
//! each cluster membership the top counts are fetched through the
//! stampede-guarded cache path, normalized so the best item in that cluster
//! scores 1.0, weighted by membership weight and term weight, and
//! accumulated per item. The final map is rescaled so the highest total
//! becomes 1.0 and truncated to the requested size.
//!
//! When the backing store cannot serve a dimension- or tag-narrowed query
//! directly, the unnarrowed query is used and dimension membership is
//! checked in-process against the item-metadata collaborator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{keys, StampedeGuard};
use crate::cluster::counts::{ClusterCountStore, CountQueryError, CountResult, ItemCounts};
use crate::cluster::{ClusterFromReferrer, UserCluster, UserClusterStore};
use crate::config::EngineConfig;
use crate::constants::{BUCKET_CLUSTER_ID, DEFAULT_DIMENSION};
use crate::errors::{EngineError, Result};
use crate::items::ItemMetadata;
use crate::metrics::RECOMMEND_RESULTS;

/// Where an item-scoped recommendation derives its clusters from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClusterSource {
    /// Use the item's dimensions as cluster ids.
    Dimensions,
    /// Use the cluster the item itself was assigned to.
    ItemCluster,
}

/// Inputs to [`CountRecommender::recommend`].
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    /// Requesting user; `None` for anonymous traffic.
    pub user: Option<u64>,
    /// Restrict memberships to this group when set.
    pub group: Option<i32>,
    /// Requested dimension scope. Empty, or just the default dimension,
    /// means unscoped.
    pub dimensions: HashSet<i32>,
    pub dimension2: Option<i32>,
    pub num_recommendations: usize,
    pub exclusions: HashSet<u64>,
    /// Also read session (short-term) memberships from the short-TTL cache.
    pub include_short_term: bool,
    pub long_term_weight: f64,
    pub short_term_weight: f64,
    /// Per-day decay rate handed to the count store; 0.0 is neutral.
    pub decay: f64,
    /// Below `min(min_num_items, num_recommendations)` distinct items the
    /// result is empty rather than a too-small pool.
    pub min_num_items: usize,
    pub referrer: Option<String>,
    /// Score clusters by significance (lift) instead of raw counts.
    pub significant: bool,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            user: None,
            group: None,
            dimensions: HashSet::new(),
            dimension2: None,
            num_recommendations: 10,
            exclusions: HashSet::new(),
            include_short_term: false,
            long_term_weight: 1.0,
            short_term_weight: 1.0,
            decay: 0.0,
            min_num_items: 1,
            referrer: None,
            significant: false,
        }
    }
}

/// Rescale so the maximum score becomes 1.0, keeping the top `limit` items.
/// Ties break by item id for determinism.
pub fn rescale_scores_to_one(counts: ItemCounts, limit: usize) -> ItemCounts {
    let max = counts.values().cloned().fold(0.0, f64::max);
    if max <= 0.0 {
        return ItemCounts::new();
    }
    let mut scored: Vec<(u64, f64)> = counts.into_iter().collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(limit);
    scored.into_iter().map(|(item, c)| (item, c / max)).collect()
}

fn dimension_scoped(dimensions: &HashSet<i32>) -> bool {
    !(dimensions.is_empty()
        || (dimensions.len() == 1 && dimensions.contains(&DEFAULT_DIMENSION)))
}

/// Per-client cluster-count recommender.
///
/// Cheap to construct per request: every field is a shared handle.
pub struct CountRecommender {
    client: String,
    user_clusters: Arc<dyn UserClusterStore>,
    counts: Arc<dyn ClusterCountStore>,
    item_meta: Arc<dyn ItemMetadata>,
    referrer_mapper: Option<Arc<dyn ClusterFromReferrer>>,
    cache: Arc<StampedeGuard>,
    config: EngineConfig,
}

impl CountRecommender {
    pub fn new(
        client: &str,
        user_clusters: Arc<dyn UserClusterStore>,
        counts: Arc<dyn ClusterCountStore>,
        item_meta: Arc<dyn ItemMetadata>,
        cache: Arc<StampedeGuard>,
        config: EngineConfig,
    ) -> Self {
        Self {
            client: client.to_string(),
            user_clusters,
            counts,
            item_meta,
            referrer_mapper: None,
            cache,
            config,
        }
    }

    pub fn with_referrer_mapper(mut self, mapper: Arc<dyn ClusterFromReferrer>) -> Self {
        self.referrer_mapper = Some(mapper);
        self
    }

    /// Recommendations for a user from the counts of their clusters.
    pub fn recommend(&self, opts: &RecommendOptions) -> ItemCounts {
        let check_dimension = dimension_scoped(&opts.dimensions);
        let min_allowed = opts.min_num_items.min(opts.num_recommendations);

        let (clusters, short_term) = match opts.user {
            None => (Vec::new(), Vec::new()),
            Some(user) => {
                let clusters = self.long_term_clusters(user, opts.group);
                let short_term = if opts.include_short_term {
                    self.short_term_clusters(user, opts.group)
                } else {
                    Vec::new()
                };
                (clusters, short_term)
            }
        };

        let referrer_clusters = self.referrer_clusters(opts.referrer.as_deref());

        // fail early when no membership of any kind can contribute
        if referrer_clusters.as_ref().map_or(true, HashSet::is_empty)
            && clusters.is_empty()
            && (!opts.include_short_term || short_term.is_empty())
        {
            debug!(
                client = %self.client,
                user = ?opts.user,
                "no cluster memberships, returning empty recommendations"
            );
            return ItemCounts::new();
        }

        let num_top = opts.num_recommendations * self.config.top_counts_multiplier;
        let mut counts = ItemCounts::new();
        for cluster in &clusters {
            self.update_counts(cluster, opts, check_dimension, num_top, opts.long_term_weight, &mut counts);
        }
        for cluster in &short_term {
            self.update_counts(cluster, opts, check_dimension, num_top, opts.short_term_weight, &mut counts);
        }
        if let Some(referrer_clusters) = referrer_clusters {
            debug!(
                client = %self.client,
                count = referrer_clusters.len(),
                "adding referrer clusters"
            );
            for cluster_id in referrer_clusters {
                let membership =
                    UserCluster::new(opts.user.unwrap_or_default(), cluster_id, 1.0, 0, 0);
                self.update_counts(&membership, opts, check_dimension, num_top, opts.long_term_weight, &mut counts);
            }
        }

        if counts.len() < min_allowed {
            debug!(
                client = %self.client,
                found = counts.len(),
                min_allowed,
                "candidate pool too small, returning empty recommendations"
            );
            return ItemCounts::new();
        }

        let result = rescale_scores_to_one(counts, opts.num_recommendations);
        RECOMMEND_RESULTS.observe(result.len() as f64);
        result
    }

    /// Recommendations from global aggregates, including BUCKET accruals.
    pub fn recommend_global(
        &self,
        dimensions: &HashSet<i32>,
        num_recommendations: usize,
        exclusions: &HashSet<u64>,
        decay: f64,
        dimension2: Option<i32>,
    ) -> ItemCounts {
        let check_dimension = dimension_scoped(dimensions);
        let num_top = num_recommendations * self.config.top_counts_multiplier;

        let mut item_counts: Option<ItemCounts> = None;
        let mut local_dimension_check = false;
        if check_dimension {
            match self.global_top_counts_by_dimension(dimensions, dimension2, num_top, decay) {
                Ok(counts) => item_counts = Some(counts),
                Err(EngineError::UnsupportedQuery) => local_dimension_check = true,
                Err(err) => {
                    warn!(client = %self.client, error = %err, "global dimension counts failed");
                    item_counts = Some(ItemCounts::new());
                }
            }
        }
        let mut item_counts = match item_counts {
            Some(counts) => counts,
            None => match self.global_top_counts(num_top, decay) {
                Ok(counts) => counts,
                Err(err) => {
                    warn!(client = %self.client, error = %err, "global counts unavailable");
                    ItemCounts::new()
                }
            },
        };

        item_counts.retain(|item, _| {
            if check_dimension && local_dimension_check {
                let dims = self.item_meta.item_dimensions(*item);
                if dims.is_disjoint(dimensions) {
                    return false;
                }
            }
            !exclusions.contains(item)
        });

        rescale_scores_to_one(item_counts, num_recommendations)
    }

    /// Recommendations scoped to an item: derive clusters from the item and
    /// aggregate their counts.
    #[allow(clippy::too_many_arguments)]
    pub fn recommend_by_item(
        &self,
        item: u64,
        source: ItemClusterSource,
        dimensions: &HashSet<i32>,
        num_recommendations: usize,
        exclusions: &HashSet<u64>,
        decay: f64,
        min_num_items: usize,
        significant: bool,
    ) -> ItemCounts {
        let check_dimension = dimension_scoped(dimensions);
        let min_allowed = min_num_items.min(num_recommendations);

        let clusters: Vec<UserCluster> = match source {
            ItemClusterSource::Dimensions => self
                .item_meta
                .item_dimensions(item)
                .into_iter()
                .map(|dim| UserCluster::new(0, dim as i64, 1.0, 0, 0))
                .collect(),
            ItemClusterSource::ItemCluster => self
                .item_meta
                .item_cluster(item)
                .map(|cluster| vec![UserCluster::new(0, cluster, 1.0, 0, 0)])
                .unwrap_or_default(),
        };
        if clusters.is_empty() {
            debug!(client = %self.client, item, "no clusters for item, returning empty results");
            return ItemCounts::new();
        }

        let opts = RecommendOptions {
            dimensions: dimensions.clone(),
            num_recommendations,
            exclusions: exclusions.clone(),
            decay,
            min_num_items,
            significant,
            ..Default::default()
        };
        let num_top = num_recommendations * self.config.scoped_counts_multiplier;
        let mut counts = ItemCounts::new();
        for cluster in &clusters {
            self.update_counts(cluster, &opts, check_dimension, num_top, 1.0, &mut counts);
        }

        if counts.len() < min_allowed {
            debug!(
                client = %self.client,
                item,
                found = counts.len(),
                min_allowed,
                "candidate pool too small for item recommendation"
            );
            return ItemCounts::new();
        }
        rescale_scores_to_one(counts, num_recommendations)
    }

    /// Recommendations from tag-affinity weights.
    #[allow(clippy::too_many_arguments)]
    pub fn recommend_by_tag(
        &self,
        tag_weights: &HashMap<String, f32>,
        tag_attr_id: i32,
        dimensions: &HashSet<i32>,
        dimension2: Option<i32>,
        num_recommendations: usize,
        exclusions: &HashSet<u64>,
        decay: f64,
        min_num_items: usize,
    ) -> ItemCounts {
        let check_dimension = dimension_scoped(dimensions);
        let min_allowed = min_num_items.min(num_recommendations);
        let num_top = num_recommendations * self.config.scoped_counts_multiplier;

        let mut counts = ItemCounts::new();
        for (tag, tag_weight) in tag_weights {
            self.update_tag_counts(
                tag,
                *tag_weight,
                tag_attr_id,
                dimensions,
                dimension2,
                check_dimension,
                num_top,
                exclusions,
                decay,
                &mut counts,
            );
        }

        if counts.len() < min_allowed {
            debug!(
                client = %self.client,
                found = counts.len(),
                min_allowed,
                "candidate pool too small for tag recommendation"
            );
            return ItemCounts::new();
        }
        rescale_scores_to_one(counts, num_recommendations)
    }

    /// Reorder an externally supplied candidate list by the weighted
    /// cluster-count signal. Unmatched items keep zero score; depending on
    /// configuration they are dropped (so the caller can fill with most
    /// popular content) or appended in their original order.
    pub fn sort(
        &self,
        user: u64,
        items: &[u64],
        group: Option<i32>,
        include_short_term: bool,
        long_term_weight: f64,
        short_term_weight: f64,
    ) -> Vec<u64> {
        let clusters = self.long_term_clusters(user, group);
        let short_term = if include_short_term {
            self.short_term_clusters(user, group)
        } else {
            Vec::new()
        };
        if clusters.is_empty() && (!include_short_term || short_term.is_empty()) {
            debug!(client = %self.client, user, "no clusters for user, returning empty sort");
            return Vec::new();
        }

        let mut counts: HashMap<u64, f64> = items.iter().map(|item| (*item, 0.0)).collect();
        for (memberships, term_weight) in
            [(&clusters, long_term_weight), (&short_term, short_term_weight)]
        {
            for cluster in memberships.iter() {
                let item_counts =
                    self.cluster_counts_for_items(cluster.cluster, cluster.time_stamp, items);
                let max = item_counts.values().cloned().fold(0.0, f64::max);
                if max <= 0.0 {
                    continue;
                }
                for (item, count) in item_counts {
                    if let Some(total) = counts.get_mut(&item) {
                        *total += (count / max) * cluster.weight * term_weight;
                    }
                }
            }
        }

        // stable sort keeps the original order for equal (e.g. zero) scores
        let mut scored: Vec<(u64, f64)> = items.iter().map(|item| (*item, counts[item])).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        if self.config.fill_zeros_with_most_popular {
            scored.retain(|(_, score)| *score > 0.0);
        }
        scored.into_iter().map(|(item, _)| item).collect()
    }

    /// Write path: accumulate a weighted action into every cluster the user
    /// belongs to, the BUCKET sentinel when no membership resolves, and
    /// every referrer-derived cluster.
    pub fn add_count(
        &self,
        user: Option<u64>,
        item: u64,
        time: i64,
        action_weight: Option<f64>,
        referrer: Option<&str>,
    ) {
        let weight = action_weight.unwrap_or(1.0);
        let clusters = user
            .map(|u| self.long_term_clusters(u, None))
            .unwrap_or_default();
        if !clusters.is_empty() {
            for cluster in &clusters {
                self.counts.add(
                    cluster.cluster,
                    item,
                    cluster.weight * weight,
                    cluster.time_stamp,
                    time,
                );
            }
        } else if self.config.use_bucket_cluster {
            self.counts.add(BUCKET_CLUSTER_ID, item, weight, 0, time);
        }

        if let Some(referrer_clusters) = self.referrer_clusters(referrer) {
            for cluster in referrer_clusters {
                self.counts.add(cluster, item, weight, 0, time);
            }
        }
    }

    // ------------------------------------------------------------------
    // membership resolution
    // ------------------------------------------------------------------

    fn long_term_clusters(&self, user: u64, group: Option<i32>) -> Vec<UserCluster> {
        let mut clusters = if self.user_clusters.needs_external_caching() {
            let key = keys::clusters_for_user(&self.client, user);
            match self.cache.peek::<Vec<UserCluster>>(&key) {
                Some(cached) => cached,
                None => {
                    let fresh = self.user_clusters.clusters(user);
                    self.cache
                        .store(&key, &fresh, self.config.user_clusters_ttl());
                    fresh
                }
            }
        } else {
            self.user_clusters.clusters(user)
        };
        if let Some(group) = group {
            clusters.retain(|c| c.group == group);
        }
        clusters
    }

    /// Session memberships live only in the short-TTL cache; a miss means
    /// none, never a slow-path lookup.
    fn short_term_clusters(&self, user: u64, group: Option<i32>) -> Vec<UserCluster> {
        let key = keys::short_term_clusters_for_user(&self.client, user);
        let mut clusters = self
            .cache
            .peek::<Vec<UserCluster>>(&key)
            .unwrap_or_default();
        if let Some(group) = group {
            clusters.retain(|c| c.group == group);
        }
        clusters
    }

    fn referrer_clusters(&self, referrer: Option<&str>) -> Option<HashSet<i64>> {
        match (referrer, &self.referrer_mapper) {
            (Some(referrer), Some(mapper)) => mapper.clusters(referrer),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // count accumulation
    // ------------------------------------------------------------------

    /// Fetch one membership's top counts, normalize by that set's maximum,
    /// weight by membership weight × term weight, and accumulate.
    fn update_counts(
        &self,
        membership: &UserCluster,
        opts: &RecommendOptions,
        check_dimension: bool,
        num_top: usize,
        term_weight: f64,
        counts: &mut ItemCounts,
    ) {
        let mut item_counts: Option<ItemCounts> = None;
        let mut local_dimension_check = false;
        if check_dimension {
            match self.cluster_top_counts_by_dimension(
                membership.cluster,
                &opts.dimensions,
                membership.time_stamp,
                num_top,
                opts.decay,
                opts.significant,
            ) {
                Ok(fetched) => item_counts = Some(fetched),
                Err(EngineError::UnsupportedQuery) => local_dimension_check = true,
                Err(err) => {
                    warn!(client = %self.client, error = %err, "dimension-narrowed counts failed");
                    item_counts = Some(ItemCounts::new());
                }
            }
        }
        let item_counts = match item_counts {
            Some(fetched) => fetched,
            None => match self.cluster_top_counts(
                membership.cluster,
                membership.time_stamp,
                num_top,
                opts.decay,
            ) {
                Ok(fetched) => fetched,
                Err(err) => {
                    warn!(client = %self.client, error = %err, "cluster counts unavailable");
                    ItemCounts::new()
                }
            },
        };

        let max = item_counts.values().cloned().fold(0.0, f64::max);
        if max <= 0.0 {
            return;
        }
        for (item, count) in item_counts {
            if check_dimension && local_dimension_check {
                let dims = self.item_meta.item_dimensions(item);
                if dims.is_disjoint(&opts.dimensions) {
                    continue;
                }
            }
            if opts.exclusions.contains(&item) {
                continue;
            }
            let scaled = (count / max) * membership.weight * term_weight;
            *counts.entry(item).or_insert(0.0) += scaled;
        }
    }

    /// Tag variant of [`Self::update_counts`].
    #[allow(clippy::too_many_arguments)]
    fn update_tag_counts(
        &self,
        tag: &str,
        tag_weight: f32,
        tag_attr_id: i32,
        dimensions: &HashSet<i32>,
        dimension2: Option<i32>,
        check_dimension: bool,
        num_top: usize,
        exclusions: &HashSet<u64>,
        decay: f64,
        counts: &mut ItemCounts,
    ) {
        let mut item_counts: Option<ItemCounts> = None;
        let mut local_dimension_check = false;
        if check_dimension {
            match self.tag_top_counts_with_dimensions(
                tag,
                tag_attr_id,
                dimensions,
                dimension2,
                num_top,
                decay,
            ) {
                Ok(fetched) => item_counts = Some(fetched),
                Err(EngineError::UnsupportedQuery) => local_dimension_check = true,
                Err(err) => {
                    warn!(client = %self.client, error = %err, "tag+dimension counts failed");
                    item_counts = Some(ItemCounts::new());
                }
            }
        }
        let item_counts = match item_counts {
            Some(fetched) => fetched,
            None => match self.tag_top_counts(tag, tag_attr_id, num_top, decay) {
                Ok(fetched) => fetched,
                Err(err) => {
                    warn!(client = %self.client, error = %err, "tag counts unavailable");
                    ItemCounts::new()
                }
            },
        };

        let max = item_counts.values().cloned().fold(0.0, f64::max);
        if max <= 0.0 {
            return;
        }
        for (item, count) in item_counts {
            if check_dimension && local_dimension_check {
                let dims = self.item_meta.item_dimensions(item);
                if dims.is_disjoint(dimensions) {
                    continue;
                }
            }
            if exclusions.contains(&item) {
                continue;
            }
            let scaled = (count / max) * tag_weight as f64;
            *counts.entry(item).or_insert(0.0) += scaled;
        }
    }

    // ------------------------------------------------------------------
    // guarded count fetches
    // ------------------------------------------------------------------

    fn guarded_counts<F>(&self, key: String, fetch: F) -> Result<ItemCounts>
    where
        F: FnOnce() -> CountResult<ItemCounts>,
    {
        let run = move || {
            fetch().map_err(|err| match err {
                CountQueryError::Unsupported => EngineError::UnsupportedQuery,
                CountQueryError::Backend(msg) => EngineError::Internal(anyhow::anyhow!(msg)),
            })
        };
        if self.counts.needs_external_caching() {
            self.cache
                .get_or_refresh(&key, self.config.counts_ttl(), run)
        } else {
            run()
        }
    }

    fn cluster_top_counts(
        &self,
        cluster: i64,
        timestamp: i64,
        limit: usize,
        decay: f64,
    ) -> Result<ItemCounts> {
        let key = keys::top_counts_for_cluster(&self.client, cluster, limit);
        let counts = self.counts.clone();
        self.guarded_counts(key, move || {
            counts.top_counts_for_cluster(cluster, timestamp, limit, decay)
        })
    }

    fn cluster_top_counts_by_dimension(
        &self,
        cluster: i64,
        dimensions: &HashSet<i32>,
        timestamp: i64,
        limit: usize,
        decay: f64,
        significant: bool,
    ) -> Result<ItemCounts> {
        let recommender = if significant { "significant" } else { "counts" };
        let key = keys::top_counts_for_cluster_by_dimension(
            &self.client,
            recommender,
            cluster,
            dimensions,
            limit,
        );
        let counts = self.counts.clone();
        let dims = dimensions.clone();
        self.guarded_counts(key, move || {
            if significant {
                counts.top_significant_counts_by_dimension(cluster, &dims, timestamp, limit, decay)
            } else {
                counts.top_counts_for_cluster_by_dimension(cluster, &dims, timestamp, limit, decay)
            }
        })
    }

    fn global_top_counts(&self, limit: usize, decay: f64) -> Result<ItemCounts> {
        let key = keys::top_counts(&self.client, limit);
        let counts = self.counts.clone();
        self.guarded_counts(key, move || counts.top_counts(limit, decay))
    }

    fn global_top_counts_by_dimension(
        &self,
        dimensions: &HashSet<i32>,
        dimension2: Option<i32>,
        limit: usize,
        decay: f64,
    ) -> Result<ItemCounts> {
        let counts = self.counts.clone();
        let dims = dimensions.clone();
        match dimension2 {
            Some(dimension2) => {
                let key =
                    keys::top_counts_by_two_dimensions(&self.client, dimensions, dimension2, limit);
                self.guarded_counts(key, move || {
                    counts.top_counts_by_two_dimensions(&dims, dimension2, limit, decay)
                })
            }
            None => {
                let key = keys::top_counts_by_dimension(&self.client, dimensions, limit);
                self.guarded_counts(key, move || counts.top_counts_by_dimension(&dims, limit, decay))
            }
        }
    }

    fn tag_top_counts(
        &self,
        tag: &str,
        tag_attr_id: i32,
        limit: usize,
        decay: f64,
    ) -> Result<ItemCounts> {
        let key = keys::top_counts_by_tag(&self.client, tag, tag_attr_id, limit);
        let counts = self.counts.clone();
        let tag = tag.to_string();
        self.guarded_counts(key, move || {
            counts.top_counts_by_tag(&tag, tag_attr_id, limit, decay)
        })
    }

    fn tag_top_counts_with_dimensions(
        &self,
        tag: &str,
        tag_attr_id: i32,
        dimensions: &HashSet<i32>,
        dimension2: Option<i32>,
        limit: usize,
        decay: f64,
    ) -> Result<ItemCounts> {
        let key =
            keys::top_counts_by_tag_and_dimension(&self.client, tag, tag_attr_id, dimensions, limit);
        let counts = self.counts.clone();
        let tag = tag.to_string();
        let dims = dimensions.clone();
        self.guarded_counts(key, move || {
            counts.top_counts_by_tag_and_dimension(&tag, tag_attr_id, &dims, dimension2, limit, decay)
        })
    }

    /// Decayed counts for an explicit item list within one cluster. Always
    /// answerable, so never `Unsupported`.
    fn cluster_counts_for_items(&self, cluster: i64, timestamp: i64, items: &[u64]) -> ItemCounts {
        let key = keys::cluster_counts_for_items(&self.client, cluster, items, timestamp);
        let counts = self.counts.clone();
        let items_owned: Vec<u64> = items.to_vec();
        let fetched = self.guarded_counts(key, move || {
            Ok(items_owned
                .iter()
                .map(|item| (*item, counts.count(cluster, *item, timestamp)))
                .collect())
        });
        match fetched {
            Ok(counts) => counts,
            Err(err) => {
                warn!(client = %self.client, error = %err, "cluster item counts unavailable");
                ItemCounts::new()
            }
        }
    }
}
