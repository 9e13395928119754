//! Algorithm pipeline: traits, execution, and result combination.
//!
//! A resolved strategy names an ordered list of algorithms. Each algorithm
//! produces a candidate ranked list; its filter set removes items and its
//! includer set force-includes items; the strategy's combiner merges all
//! contributions into one ranking, truncated to the requested count. A
//! failing algorithm only loses its own contribution.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::cluster::counts::ItemCounts;
use crate::errors::Result;
use crate::metrics::PIPELINE_ALGORITHM_FAILURES;
use crate::strategy::Strategy;

/// One item with its blended score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item: u64,
    pub score: f64,
}

/// Ranked best-first.
pub type RankedItems = Vec<ScoredItem>;

/// Request-scoped inputs shared by every pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct RecommendationContext {
    pub client: String,
    pub user: Option<u64>,
    /// The item being viewed, when the request is item-scoped.
    pub current_item: Option<u64>,
    pub dimensions: HashSet<i32>,
    pub rec_tag: Option<String>,
    pub referrer: Option<String>,
    /// Items the user has dismissed; excluded by an always-on filter.
    pub ignored_items: HashSet<u64>,
    /// Items recently shown to the user; excluded by an always-on filter.
    pub recent_impressions: HashSet<u64>,
}

/// A recommendation algorithm instance, resolved from the registry.
pub trait RecommendationAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce up to `limit` scored candidates. Errors drop only this
    /// algorithm's contribution.
    fn recommend(
        &self,
        ctx: &RecommendationContext,
        params: &HashMap<String, String>,
        limit: usize,
    ) -> Result<ItemCounts>;
}

/// Removes items from one algorithm's candidate set.
pub trait ItemFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// The items to exclude for this request.
    fn excluded(&self, ctx: &RecommendationContext) -> HashSet<u64>;
}

/// Force-includes designated items into one algorithm's candidate set.
pub trait ItemIncluder: Send + Sync {
    fn name(&self) -> &'static str;

    /// The items to force-include for this request.
    fn included(
        &self,
        ctx: &RecommendationContext,
        params: &HashMap<String, String>,
        limit: usize,
    ) -> Vec<u64>;
}

/// One algorithm's surviving contribution.
#[derive(Debug, Clone)]
pub struct AlgorithmResult {
    pub algorithm: String,
    pub items: RankedItems,
}

/// Merges all algorithms' contributions into one final ranking.
pub trait ResultCombiner: Send + Sync {
    fn name(&self) -> &'static str;

    fn combine(&self, results: &[AlgorithmResult], strategy: &Strategy, limit: usize)
        -> RankedItems;
}

fn to_ranked(counts: ItemCounts) -> RankedItems {
    let mut ranked: Vec<ScoredItem> = counts
        .into_iter()
        .map(|(item, score)| ScoredItem { item, score })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.item.cmp(&b.item))
    });
    ranked
}

/// Run every algorithm of a strategy and combine the results.
pub fn execute(strategy: &Strategy, ctx: &RecommendationContext, limit: usize) -> RankedItems {
    let mut results: Vec<AlgorithmResult> = Vec::with_capacity(strategy.algorithms.len());
    for spec in &strategy.algorithms {
        match spec.algorithm.recommend(ctx, &spec.config, limit) {
            Ok(counts) => {
                let mut excluded: HashSet<u64> = HashSet::new();
                for filter in &spec.filters {
                    excluded.extend(filter.excluded(ctx));
                }
                let mut ranked = to_ranked(counts);
                ranked.retain(|scored| !excluded.contains(&scored.item));

                // force-included items go in at the top with a full score
                let mut present: HashSet<u64> =
                    ranked.iter().map(|scored| scored.item).collect();
                let mut forced: RankedItems = Vec::new();
                for includer in &spec.includers {
                    for item in includer.included(ctx, &spec.config, limit) {
                        if present.insert(item) {
                            forced.push(ScoredItem { item, score: 1.0 });
                        }
                    }
                }
                forced.extend(ranked);

                results.push(AlgorithmResult {
                    algorithm: spec.name.clone(),
                    items: forced,
                });
            }
            Err(err) => {
                warn!(
                    client = %ctx.client,
                    algorithm = %spec.name,
                    error = %err,
                    "algorithm failed, dropping its contribution"
                );
                PIPELINE_ALGORITHM_FAILURES
                    .with_label_values(&[spec.name.as_str()])
                    .inc();
            }
        }
    }
    strategy.combiner.combine(&results, strategy, limit)
}

/// Takes the first algorithm that produced any results and ignores the rest.
pub struct FirstSuccessfulCombiner;

impl ResultCombiner for FirstSuccessfulCombiner {
    fn name(&self) -> &'static str {
        "firstSuccessful"
    }

    fn combine(
        &self,
        results: &[AlgorithmResult],
        _strategy: &Strategy,
        limit: usize,
    ) -> RankedItems {
        for result in results {
            if !result.items.is_empty() {
                let mut items = result.items.clone();
                items.truncate(limit);
                return items;
            }
        }
        RankedItems::new()
    }
}

/// Blends all contributions. Each item's blended score per algorithm is
/// `(1 - d) * score + d * 1/rank` where `d` is the strategy's diversity
/// level: at 0 the blend is pure score order, at 1 it is a rank-based
/// interleave that spreads results across contributing algorithms.
pub struct WeightedBlendCombiner;

impl ResultCombiner for WeightedBlendCombiner {
    fn name(&self) -> &'static str {
        "weightedBlend"
    }

    fn combine(&self, results: &[AlgorithmResult], strategy: &Strategy, limit: usize) -> RankedItems {
        let diversity = strategy.diversity_level.clamp(0.0, 1.0);
        let mut totals: HashMap<u64, f64> = HashMap::new();
        for result in results {
            for (index, scored) in result.items.iter().enumerate() {
                let rank_score = 1.0 / (index as f64 + 1.0);
                let blended = (1.0 - diversity) * scored.score + diversity * rank_score;
                *totals.entry(scored.item).or_insert(0.0) += blended;
            }
        }
        let mut merged = to_ranked(totals);
        merged.truncate(limit);
        merged
    }
}
