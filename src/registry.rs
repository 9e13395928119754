//! Component registry.
//!
//! Config payloads reference algorithms, filters, includers and combiners by
//! name. Those names resolve through this registry, populated once at
//! startup; an unknown name fails the whole config update instead of being
//! discovered at request time.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::algorithms::{
    ClusterCountDeps, ClusterCountsAlgorithm, ClusterCountsForItemAlgorithm,
    ClusterCountsForTagAlgorithm, ClusterCountsGlobalAlgorithm,
};
use crate::errors::{ComponentKind, EngineError, Result};
use crate::filters::{
    CurrentItemFilter, IgnoredItemsFilter, PinnedItemsIncluder, RecentImpressionsFilter,
};
use crate::pipeline::{
    FirstSuccessfulCombiner, ItemFilter, ItemIncluder, RecommendationAlgorithm, ResultCombiner,
    WeightedBlendCombiner,
};

/// Name → instance maps for every pluggable pipeline component.
#[derive(Default)]
pub struct ComponentRegistry {
    algorithms: HashMap<String, Arc<dyn RecommendationAlgorithm>>,
    filters: HashMap<String, Arc<dyn ItemFilter>>,
    includers: HashMap<String, Arc<dyn ItemIncluder>>,
    combiners: HashMap<String, Arc<dyn ResultCombiner>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in combiners, filters and includers, plus
    /// the cluster-count algorithm family wired to the given dependencies.
    pub fn with_defaults(deps: ClusterCountDeps) -> Self {
        let mut registry = Self::new();
        registry.register_algorithm(Arc::new(ClusterCountsAlgorithm::new(deps.clone())));
        registry.register_algorithm(Arc::new(ClusterCountsGlobalAlgorithm::new(deps.clone())));
        registry.register_algorithm(Arc::new(ClusterCountsForItemAlgorithm::new(deps.clone())));
        registry.register_algorithm(Arc::new(ClusterCountsForTagAlgorithm::new(deps)));
        registry.register_filter(Arc::new(CurrentItemFilter));
        registry.register_filter(Arc::new(IgnoredItemsFilter));
        registry.register_filter(Arc::new(RecentImpressionsFilter));
        registry.register_includer(Arc::new(PinnedItemsIncluder));
        registry.register_combiner(Arc::new(FirstSuccessfulCombiner));
        registry.register_combiner(Arc::new(WeightedBlendCombiner));
        registry
    }

    pub fn register_algorithm(&mut self, algorithm: Arc<dyn RecommendationAlgorithm>) {
        self.algorithms
            .insert(algorithm.name().to_string(), algorithm);
    }

    pub fn register_filter(&mut self, filter: Arc<dyn ItemFilter>) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    pub fn register_includer(&mut self, includer: Arc<dyn ItemIncluder>) {
        self.includers.insert(includer.name().to_string(), includer);
    }

    pub fn register_combiner(&mut self, combiner: Arc<dyn ResultCombiner>) {
        self.combiners.insert(combiner.name().to_string(), combiner);
    }

    pub fn algorithm(&self, name: &str) -> Result<Arc<dyn RecommendationAlgorithm>> {
        self.algorithms
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownComponent {
                kind: ComponentKind::Algorithm,
                name: name.to_string(),
            })
    }

    pub fn filter(&self, name: &str) -> Result<Arc<dyn ItemFilter>> {
        self.filters
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownComponent {
                kind: ComponentKind::Filter,
                name: name.to_string(),
            })
    }

    pub fn includer(&self, name: &str) -> Result<Arc<dyn ItemIncluder>> {
        self.includers
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownComponent {
                kind: ComponentKind::Includer,
                name: name.to_string(),
            })
    }

    pub fn combiner(&self, name: &str) -> Result<Arc<dyn ResultCombiner>> {
        self.combiners
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownComponent {
                kind: ComponentKind::Combiner,
                name: name.to_string(),
            })
    }

    /// The always-on filter set unioned into every algorithm's filters.
    pub fn always_on_filters(&self) -> Vec<Arc<dyn ItemFilter>> {
        ["currentItemFilter", "ignoredItemsFilter", "recentImpressionsFilter"]
            .iter()
            .filter_map(|name| self.filters.get(*name).cloned())
            .collect()
    }

    /// Log what is available, once at startup.
    pub fn log_inventory(&self) {
        let mut names: Vec<&str> = self.algorithms.keys().map(String::as_str).collect();
        names.sort_unstable();
        info!("Available algorithms: {}", names.join(", "));
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        info!("Available filters: {}", names.join(", "));
        let mut names: Vec<&str> = self.includers.keys().map(String::as_str).collect();
        names.sort_unstable();
        info!("Available includers: {}", names.join(", "));
        let mut names: Vec<&str> = self.combiners.keys().map(String::as_str).collect();
        names.sort_unstable();
        info!("Available combiners: {}", names.join(", "));
    }
}
