//! Cache key construction.
//!
//! Keys are namespaced per client and fully determined by the query shape so
//! that equivalent queries across server instances share entries. Dimension
//! sets are sorted before joining to keep keys deterministic.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

fn join_dimensions(dimensions: &HashSet<i32>) -> String {
    let mut dims: Vec<i32> = dimensions.iter().copied().collect();
    dims.sort_unstable();
    dims.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn clusters_for_user(client: &str, user: u64) -> String {
    format!("uc:{client}:{user}")
}

pub fn short_term_clusters_for_user(client: &str, user: u64) -> String {
    format!("ucs:{client}:{user}")
}

pub fn top_counts(client: &str, limit: usize) -> String {
    format!("tc:{client}:{limit}")
}

pub fn top_counts_for_cluster(client: &str, cluster: i64, limit: usize) -> String {
    format!("tcc:{client}:{cluster}:{limit}")
}

pub fn top_counts_for_cluster_by_dimension(
    client: &str,
    recommender: &str,
    cluster: i64,
    dimensions: &HashSet<i32>,
    limit: usize,
) -> String {
    format!(
        "tccd:{client}:{recommender}:{cluster}:{}:{limit}",
        join_dimensions(dimensions)
    )
}

pub fn top_counts_by_dimension(client: &str, dimensions: &HashSet<i32>, limit: usize) -> String {
    format!("tcd:{client}:{}:{limit}", join_dimensions(dimensions))
}

pub fn top_counts_by_two_dimensions(
    client: &str,
    dimensions: &HashSet<i32>,
    dimension2: i32,
    limit: usize,
) -> String {
    format!(
        "tcd2:{client}:{}:{dimension2}:{limit}",
        join_dimensions(dimensions)
    )
}

pub fn top_counts_by_tag(client: &str, tag: &str, tag_attr_id: i32, limit: usize) -> String {
    format!("tct:{client}:{tag}:{tag_attr_id}:{limit}")
}

pub fn top_counts_by_tag_and_dimension(
    client: &str,
    tag: &str,
    tag_attr_id: i32,
    dimensions: &HashSet<i32>,
    limit: usize,
) -> String {
    format!(
        "tctd:{client}:{tag}:{tag_attr_id}:{}:{limit}",
        join_dimensions(dimensions)
    )
}

pub fn cluster_counts_for_items(client: &str, cluster: i64, items: &[u64], timestamp: i64) -> String {
    let mut hasher = DefaultHasher::new();
    items.hash(&mut hasher);
    format!("cci:{client}:{cluster}:{:x}:{timestamp}", hasher.finish())
}

/// Marker key a refresher holds while recomputing `key`.
pub fn in_flight_marker(key: &str) -> String {
    format!("{key}:inflight")
}
