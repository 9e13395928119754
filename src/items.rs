//! Item metadata collaborator.
//!
//! The persistence layer that knows each item's dimensions, cluster and
//! dimension names is external; the engine only needs this narrow read
//! contract for in-process filtering and for deriving clusters from items.

use std::collections::{HashMap, HashSet};

/// Read access to item attributes.
pub trait ItemMetadata: Send + Sync {
    /// The dimensions an item belongs to.
    fn item_dimensions(&self, item: u64) -> HashSet<i32>;

    /// The cluster an item was assigned to, if any.
    fn item_cluster(&self, item: u64) -> Option<i64>;

    /// The (group, name) pair for a dimension id, if known.
    fn dimension_name(&self, dimension: i32) -> Option<(String, String)>;
}

/// Simple map-backed [`ItemMetadata`], used in tests and single-node setups.
#[derive(Debug, Default)]
pub struct InMemoryItemMetadata {
    dimensions: HashMap<u64, HashSet<i32>>,
    clusters: HashMap<u64, i64>,
    dimension_names: HashMap<i32, (String, String)>,
}

impl InMemoryItemMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item_dimensions(&mut self, item: u64, dims: impl IntoIterator<Item = i32>) {
        self.dimensions.insert(item, dims.into_iter().collect());
    }

    pub fn set_item_cluster(&mut self, item: u64, cluster: i64) {
        self.clusters.insert(item, cluster);
    }

    pub fn set_dimension_name(&mut self, dimension: i32, group: &str, name: &str) {
        self.dimension_names
            .insert(dimension, (group.to_string(), name.to_string()));
    }
}

impl ItemMetadata for InMemoryItemMetadata {
    fn item_dimensions(&self, item: u64) -> HashSet<i32> {
        self.dimensions.get(&item).cloned().unwrap_or_default()
    }

    fn item_cluster(&self, item: u64) -> Option<i64> {
        self.clusters.get(&item).copied()
    }

    fn dimension_name(&self, dimension: i32) -> Option<(String, String)> {
        self.dimension_names.get(&dimension).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_item_has_no_dimensions() {
        let meta = InMemoryItemMetadata::new();
        assert!(meta.item_dimensions(99).is_empty());
        assert_eq!(meta.item_cluster(99), None);
    }

    #[test]
    fn test_dimension_names() {
        let mut meta = InMemoryItemMetadata::new();
        meta.set_dimension_name(3, "category", "sport");
        assert_eq!(
            meta.dimension_name(3),
            Some(("category".to_string(), "sport".to_string()))
        );
    }
}
