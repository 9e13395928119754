//! Shared fixtures for strategy and pipeline tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cluster::counts::ItemCounts;
use crate::errors::{EngineError, Result};
use crate::filters::{
    CurrentItemFilter, IgnoredItemsFilter, PinnedItemsIncluder, RecentImpressionsFilter,
};
use crate::pipeline::{
    FirstSuccessfulCombiner, ItemFilter, ItemIncluder, RecommendationAlgorithm,
    RecommendationContext, ResultCombiner, WeightedBlendCombiner,
};
use crate::registry::ComponentRegistry;
use crate::strategy::{AlgorithmSpec, Strategy};

/// Algorithm returning a fixed candidate set, or a fixed failure.
pub struct StaticAlgorithm {
    name: &'static str,
    items: Vec<(u64, f64)>,
    fail: bool,
}

impl StaticAlgorithm {
    pub fn new(name: &'static str, items: Vec<(u64, f64)>) -> Self {
        Self {
            name,
            items,
            fail: false,
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            items: Vec::new(),
            fail: true,
        }
    }
}

impl RecommendationAlgorithm for StaticAlgorithm {
    fn name(&self) -> &'static str {
        self.name
    }

    fn recommend(
        &self,
        _ctx: &RecommendationContext,
        _params: &HashMap<String, String>,
        _limit: usize,
    ) -> Result<ItemCounts> {
        if self.fail {
            return Err(EngineError::AlgorithmFailed {
                name: self.name.to_string(),
                reason: "configured to fail".to_string(),
            });
        }
        Ok(self.items.iter().copied().collect())
    }
}

/// A registry with the built-in filters/includers/combiners plus the given
/// algorithms.
pub fn registry_with_static(
    algorithms: Vec<Arc<dyn RecommendationAlgorithm>>,
) -> Arc<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    for algorithm in algorithms {
        registry.register_algorithm(algorithm);
    }
    registry.register_filter(Arc::new(CurrentItemFilter));
    registry.register_filter(Arc::new(IgnoredItemsFilter));
    registry.register_filter(Arc::new(RecentImpressionsFilter));
    registry.register_includer(Arc::new(PinnedItemsIncluder));
    registry.register_combiner(Arc::new(FirstSuccessfulCombiner));
    registry.register_combiner(Arc::new(WeightedBlendCombiner));
    Arc::new(registry)
}

/// Build a strategy directly from parts, bypassing JSON config.
pub fn simple_strategy(
    algorithms: Vec<(
        Arc<dyn RecommendationAlgorithm>,
        Vec<Arc<dyn ItemIncluder>>,
        Vec<Arc<dyn ItemFilter>>,
    )>,
    combiner: Arc<dyn ResultCombiner>,
    diversity_level: f64,
) -> Strategy {
    Strategy {
        label: "-".to_string(),
        algorithms: algorithms
            .into_iter()
            .map(|(algorithm, includers, filters)| AlgorithmSpec {
                name: algorithm.name().to_string(),
                algorithm,
                includers,
                filters,
                config: HashMap::new(),
            })
            .collect(),
        combiner,
        diversity_level,
        action_weights: HashMap::new(),
    }
}
