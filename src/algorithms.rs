//! Cluster-count algorithm adapters.
//!
//! These wrap [`CountRecommender`] operations behind the
//! [`RecommendationAlgorithm`] trait so strategies can name them. Each
//! adapter resolves the per-client stores at request time; a client with no
//! loaded store is an unavailable dependency, which drops only that
//! algorithm's contribution from the pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::StampedeGuard;
use crate::cluster::counts::{ClusterCountStore, ItemCounts};
use crate::cluster::recommender::{CountRecommender, ItemClusterSource, RecommendOptions};
use crate::cluster::ClusterFromReferrer;
use crate::config::EngineConfig;
use crate::errors::{EngineError, Result};
use crate::items::ItemMetadata;
use crate::loader::ExternalDataLoader;
use crate::metrics::{Timer, RECOMMEND_DURATION};
use crate::pipeline::{RecommendationAlgorithm, RecommendationContext};

/// Shared handles every cluster-count adapter needs.
#[derive(Clone)]
pub struct ClusterCountDeps {
    pub loader: Arc<ExternalDataLoader>,
    pub counts: Arc<dyn ClusterCountStore>,
    pub item_meta: Arc<dyn ItemMetadata>,
    pub cache: Arc<StampedeGuard>,
    pub referrer_mapper: Option<Arc<dyn ClusterFromReferrer>>,
    pub config: EngineConfig,
}

impl ClusterCountDeps {
    fn recommender(&self, ctx: &RecommendationContext) -> Result<CountRecommender> {
        let store = self.loader.cluster_store(&ctx.client).ok_or_else(|| {
            EngineError::AlgorithmFailed {
                name: "clusterCounts".to_string(),
                reason: format!("no cluster store loaded for client '{}'", ctx.client),
            }
        })?;
        let mut recommender = CountRecommender::new(
            &ctx.client,
            store,
            self.counts.clone(),
            self.item_meta.clone(),
            self.cache.clone(),
            self.config.clone(),
        );
        if let Some(mapper) = &self.referrer_mapper {
            recommender = recommender.with_referrer_mapper(mapper.clone());
        }
        Ok(recommender)
    }
}

fn param_f64(params: &HashMap<String, String>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn param_usize(params: &HashMap<String, String>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn param_bool(params: &HashMap<String, String>, key: &str, default: bool) -> bool {
    params
        .get(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

fn param_i32(params: &HashMap<String, String>, key: &str) -> Option<i32> {
    params.get(key).and_then(|v| v.parse().ok())
}

/// Per-user cluster-count recommendations (`clusterCounts`).
///
/// Config params: `longTermWeight`, `shortTermWeight`, `includeShortTerm`,
/// `decay`, `minNumItems`, `group`, `significant`.
pub struct ClusterCountsAlgorithm {
    deps: ClusterCountDeps,
}

impl ClusterCountsAlgorithm {
    pub fn new(deps: ClusterCountDeps) -> Self {
        Self { deps }
    }
}

impl RecommendationAlgorithm for ClusterCountsAlgorithm {
    fn name(&self) -> &'static str {
        "clusterCounts"
    }

    fn recommend(
        &self,
        ctx: &RecommendationContext,
        params: &HashMap<String, String>,
        limit: usize,
    ) -> Result<ItemCounts> {
        let _timer = Timer::new(RECOMMEND_DURATION.with_label_values(&[self.name()]));
        let recommender = self.deps.recommender(ctx)?;
        let opts = RecommendOptions {
            user: ctx.user,
            group: param_i32(params, "group"),
            dimensions: ctx.dimensions.clone(),
            num_recommendations: limit,
            include_short_term: param_bool(params, "includeShortTerm", false),
            long_term_weight: param_f64(params, "longTermWeight", 1.0),
            short_term_weight: param_f64(params, "shortTermWeight", 1.0),
            decay: param_f64(params, "decay", 0.0),
            min_num_items: param_usize(params, "minNumItems", 1),
            referrer: ctx.referrer.clone(),
            significant: param_bool(params, "significant", false),
            ..Default::default()
        };
        Ok(recommender.recommend(&opts))
    }
}

/// Global popularity recommendations (`clusterCountsGlobal`), fed by the
/// BUCKET sentinel and all cluster aggregates.
///
/// Config params: `decay`, `dimension2`.
pub struct ClusterCountsGlobalAlgorithm {
    deps: ClusterCountDeps,
}

impl ClusterCountsGlobalAlgorithm {
    pub fn new(deps: ClusterCountDeps) -> Self {
        Self { deps }
    }
}

impl RecommendationAlgorithm for ClusterCountsGlobalAlgorithm {
    fn name(&self) -> &'static str {
        "clusterCountsGlobal"
    }

    fn recommend(
        &self,
        ctx: &RecommendationContext,
        params: &HashMap<String, String>,
        limit: usize,
    ) -> Result<ItemCounts> {
        let _timer = Timer::new(RECOMMEND_DURATION.with_label_values(&[self.name()]));
        let recommender = self.deps.recommender(ctx)?;
        Ok(recommender.recommend_global(
            &ctx.dimensions,
            limit,
            &HashSet::new(),
            param_f64(params, "decay", 0.0),
            param_i32(params, "dimension2"),
        ))
    }
}

/// Item-scoped cluster-count recommendations (`clusterCountsForItem`).
///
/// Config params: `clusterSource` (`dimensions` | `itemCluster`), `decay`,
/// `minNumItems`, `significant`.
pub struct ClusterCountsForItemAlgorithm {
    deps: ClusterCountDeps,
}

impl ClusterCountsForItemAlgorithm {
    pub fn new(deps: ClusterCountDeps) -> Self {
        Self { deps }
    }
}

impl RecommendationAlgorithm for ClusterCountsForItemAlgorithm {
    fn name(&self) -> &'static str {
        "clusterCountsForItem"
    }

    fn recommend(
        &self,
        ctx: &RecommendationContext,
        params: &HashMap<String, String>,
        limit: usize,
    ) -> Result<ItemCounts> {
        let _timer = Timer::new(RECOMMEND_DURATION.with_label_values(&[self.name()]));
        let item = ctx.current_item.ok_or_else(|| EngineError::AlgorithmFailed {
            name: self.name().to_string(),
            reason: "no current item in request".to_string(),
        })?;
        let source = match params.get("clusterSource").map(String::as_str) {
            Some("itemCluster") => ItemClusterSource::ItemCluster,
            _ => ItemClusterSource::Dimensions,
        };
        let recommender = self.deps.recommender(ctx)?;
        Ok(recommender.recommend_by_item(
            item,
            source,
            &ctx.dimensions,
            limit,
            &HashSet::new(),
            param_f64(params, "decay", 0.0),
            param_usize(params, "minNumItems", 1),
            param_bool(params, "significant", false),
        ))
    }
}

/// Tag-affinity cluster-count recommendations (`clusterCountsForTag`).
///
/// Config params: `tagAttrId`, `decay`, `minNumItems`, `dimension2`.
pub struct ClusterCountsForTagAlgorithm {
    deps: ClusterCountDeps,
}

impl ClusterCountsForTagAlgorithm {
    pub fn new(deps: ClusterCountDeps) -> Self {
        Self { deps }
    }
}

impl RecommendationAlgorithm for ClusterCountsForTagAlgorithm {
    fn name(&self) -> &'static str {
        "clusterCountsForTag"
    }

    fn recommend(
        &self,
        ctx: &RecommendationContext,
        params: &HashMap<String, String>,
        limit: usize,
    ) -> Result<ItemCounts> {
        let _timer = Timer::new(RECOMMEND_DURATION.with_label_values(&[self.name()]));
        let user = ctx.user.ok_or_else(|| EngineError::AlgorithmFailed {
            name: self.name().to_string(),
            reason: "tag recommendations need a known user".to_string(),
        })?;
        let tag_store = self.deps.loader.tag_store(&ctx.client).ok_or_else(|| {
            EngineError::AlgorithmFailed {
                name: self.name().to_string(),
                reason: format!("no tag-affinity store loaded for client '{}'", ctx.client),
            }
        })?;
        let tag_weights = tag_store.tag_affinities(user);
        if tag_weights.is_empty() {
            return Ok(ItemCounts::new());
        }
        let recommender = self.deps.recommender(ctx)?;
        Ok(recommender.recommend_by_tag(
            &tag_weights,
            param_i32(params, "tagAttrId").unwrap_or(0),
            &ctx.dimensions,
            param_i32(params, "dimension2"),
            limit,
            &HashSet::new(),
            param_f64(params, "decay", 0.0),
            param_usize(params, "minNumItems", 1),
        ))
    }
}
