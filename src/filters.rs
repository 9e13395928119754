//! Built-in filters and includers.
//!
//! The three always-on filters are unioned into every algorithm's filter set
//! at strategy build time, whether or not the config names them: the current
//! item, items the user has previously dismissed, and items recently shown.

use std::collections::{HashMap, HashSet};

use crate::pipeline::{ItemFilter, ItemIncluder, RecommendationContext};

/// Excludes the item currently being viewed.
pub struct CurrentItemFilter;

impl ItemFilter for CurrentItemFilter {
    fn name(&self) -> &'static str {
        "currentItemFilter"
    }

    fn excluded(&self, ctx: &RecommendationContext) -> HashSet<u64> {
        ctx.current_item.into_iter().collect()
    }
}

/// Excludes items the user has previously dismissed.
pub struct IgnoredItemsFilter;

impl ItemFilter for IgnoredItemsFilter {
    fn name(&self) -> &'static str {
        "ignoredItemsFilter"
    }

    fn excluded(&self, ctx: &RecommendationContext) -> HashSet<u64> {
        ctx.ignored_items.clone()
    }
}

/// Excludes items recently shown to the user.
pub struct RecentImpressionsFilter;

impl ItemFilter for RecentImpressionsFilter {
    fn name(&self) -> &'static str {
        "recentImpressionsFilter"
    }

    fn excluded(&self, ctx: &RecommendationContext) -> HashSet<u64> {
        ctx.recent_impressions.clone()
    }
}

/// Force-includes a fixed item list from the algorithm's config
/// (`pinnedItems`, comma-separated ids). Malformed ids are skipped.
pub struct PinnedItemsIncluder;

impl PinnedItemsIncluder {
    pub const PARAM: &'static str = "pinnedItems";
}

impl ItemIncluder for PinnedItemsIncluder {
    fn name(&self) -> &'static str {
        "pinnedItemsIncluder"
    }

    fn included(
        &self,
        _ctx: &RecommendationContext,
        params: &HashMap<String, String>,
        limit: usize,
    ) -> Vec<u64> {
        params
            .get(Self::PARAM)
            .map(|raw| {
                raw.split(',')
                    .filter_map(|part| part.trim().parse().ok())
                    .take(limit)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_item_filter() {
        let ctx = RecommendationContext {
            current_item: Some(10),
            ..Default::default()
        };
        assert!(CurrentItemFilter.excluded(&ctx).contains(&10));
        assert!(CurrentItemFilter
            .excluded(&RecommendationContext::default())
            .is_empty());
    }

    #[test]
    fn test_ignored_and_impressed_filters() {
        let ctx = RecommendationContext {
            ignored_items: [1, 2].into_iter().collect(),
            recent_impressions: [3].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(IgnoredItemsFilter.excluded(&ctx).len(), 2);
        assert!(RecentImpressionsFilter.excluded(&ctx).contains(&3));
    }

    #[test]
    fn test_pinned_includer_parses_config() {
        let params = HashMap::from([(
            PinnedItemsIncluder::PARAM.to_string(),
            "5, 7,oops,9".to_string(),
        )]);
        let included =
            PinnedItemsIncluder.included(&RecommendationContext::default(), &params, 10);
        assert_eq!(included, vec![5, 7, 9]);
    }
}
