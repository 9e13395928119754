//! Cluster-count recommender behavior.
//!
//! Covers the core aggregation path: normalization and weighting per
//! membership, the minimum-item policy, rescaling, the dimension-narrowing
//! fallback with in-process filtering, global and item-scoped reads, the
//! sort operation, and the BUCKET write path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use recserve::cache::{InMemoryCacheBackend, StampedeGuard};
use recserve::chrono::Utc;
use recserve::cluster::counts::{ClusterCountStore, MemoryClusterCountStore};
use recserve::cluster::recommender::{CountRecommender, ItemClusterSource, RecommendOptions};
use recserve::cluster::{ClusterFromReferrer, MemoryUserClusterStore, UserCluster};
use recserve::config::EngineConfig;
use recserve::constants::BUCKET_CLUSTER_ID;
use recserve::items::{InMemoryItemMetadata, ItemMetadata};

struct Fixture {
    counts: Arc<MemoryClusterCountStore>,
    item_meta: InMemoryItemMetadata,
    memberships: HashMap<u64, Vec<UserCluster>>,
    config: EngineConfig,
    referrer_mapper: Option<Arc<dyn ClusterFromReferrer>>,
}

impl Fixture {
    fn new() -> Self {
        let counts = Arc::new(MemoryClusterCountStore::new());
        counts.set_alpha(0.0);
        Self {
            counts,
            item_meta: InMemoryItemMetadata::new(),
            memberships: HashMap::new(),
            config: EngineConfig::default(),
            referrer_mapper: None,
        }
    }

    fn member(mut self, user: u64, cluster: i64, weight: f64) -> Self {
        self.memberships
            .entry(user)
            .or_default()
            .push(UserCluster::new(user, cluster, weight, 0, 0));
        self
    }

    fn count(self, cluster: i64, item: u64, weight: f64) -> Self {
        self.counts.add(cluster, item, weight, 0, Utc::now().timestamp());
        self
    }

    fn recommender(self) -> CountRecommender {
        let store = Arc::new(MemoryUserClusterStore::new("acme", self.memberships));
        let cache = Arc::new(StampedeGuard::new(
            Arc::new(InMemoryCacheBackend::new()),
            Duration::from_millis(500),
        ));
        let item_meta: Arc<dyn ItemMetadata> = Arc::new(self.item_meta);
        let recommender = CountRecommender::new(
            "acme",
            store,
            self.counts,
            item_meta,
            cache,
            self.config,
        );
        match self.referrer_mapper {
            Some(mapper) => recommender.with_referrer_mapper(mapper),
            None => recommender,
        }
    }
}

#[test]
fn test_recommend_normalizes_and_rescales() {
    // user 42 in cluster 3 with weight 0.8; cluster 3 counts item10:5 item11:3
    let recommender = Fixture::new()
        .member(42, 3, 0.8)
        .count(3, 10, 5.0)
        .count(3, 11, 3.0)
        .recommender();

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42),
        num_recommendations: 2,
        min_num_items: 1,
        ..Default::default()
    });

    assert_eq!(result.len(), 2);
    assert!((result[&10] - 1.0).abs() < 1e-9);
    assert!((result[&11] - 0.6).abs() < 1e-9);
}

#[test]
fn test_recommend_empty_below_min_items() {
    let recommender = Fixture::new()
        .member(42, 3, 0.8)
        .count(3, 10, 5.0)
        .count(3, 11, 3.0)
        .recommender();

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42),
        num_recommendations: 2,
        min_num_items: 3,
        ..Default::default()
    });

    assert!(result.is_empty());
}

#[test]
fn test_min_items_capped_by_requested_count() {
    // min_num_items above the request size must not make a full result empty
    let recommender = Fixture::new()
        .member(42, 3, 0.8)
        .count(3, 10, 5.0)
        .count(3, 11, 3.0)
        .recommender();

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42),
        num_recommendations: 2,
        min_num_items: 10,
        ..Default::default()
    });

    assert!(result.is_empty());

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42),
        num_recommendations: 1,
        min_num_items: 10,
        ..Default::default()
    });
    assert_eq!(result.len(), 1);
}

#[test]
fn test_anonymous_user_gets_empty() {
    let recommender = Fixture::new().count(3, 10, 5.0).recommender();
    let result = recommender.recommend(&RecommendOptions {
        user: None,
        ..Default::default()
    });
    assert!(result.is_empty());
}

#[test]
fn test_exclusions_skipped_in_accumulation() {
    let recommender = Fixture::new()
        .member(42, 3, 0.8)
        .count(3, 10, 5.0)
        .count(3, 11, 3.0)
        .recommender();

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42),
        num_recommendations: 2,
        exclusions: [10].into_iter().collect(),
        ..Default::default()
    });

    assert!(!result.contains_key(&10));
    assert!((result[&11] - 1.0).abs() < 1e-9);
}

#[test]
fn test_dimension_narrowing_falls_back_to_local_filter() {
    // the in-memory store cannot serve dimension-narrowed queries, so the
    // recommender must fetch unnarrowed counts and filter through metadata
    let mut fixture = Fixture::new()
        .member(42, 3, 1.0)
        .count(3, 10, 5.0)
        .count(3, 11, 3.0);
    fixture.item_meta.set_item_dimensions(10, [7]);
    fixture.item_meta.set_item_dimensions(11, [8]);
    let recommender = fixture.recommender();

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42),
        dimensions: [7].into_iter().collect(),
        num_recommendations: 2,
        ..Default::default()
    });

    assert_eq!(result.len(), 1);
    assert!((result[&10] - 1.0).abs() < 1e-9);
}

#[test]
fn test_multiple_memberships_accumulate() {
    // item 12 appears in both clusters and should accumulate both shares
    let recommender = Fixture::new()
        .member(42, 3, 0.5)
        .member(42, 4, 0.5)
        .count(3, 12, 4.0)
        .count(3, 10, 8.0)
        .count(4, 12, 6.0)
        .count(4, 11, 6.0)
        .recommender();

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42),
        num_recommendations: 3,
        ..Default::default()
    });

    // 12: (4/8)*0.5 + (6/6)*0.5 = 0.75; 10: 0.5; 11: 0.5 → 12 is top
    assert!((result[&12] - 1.0).abs() < 1e-9);
    assert!(result[&10] < 1.0);
}

#[test]
fn test_group_pruning() {
    let mut fixture = Fixture::new().count(3, 10, 5.0).count(4, 11, 5.0);
    fixture
        .memberships
        .entry(42)
        .or_default()
        .push(UserCluster::new(42, 3, 1.0, 0, 1));
    fixture
        .memberships
        .entry(42)
        .or_default()
        .push(UserCluster::new(42, 4, 1.0, 0, 2));
    let recommender = fixture.recommender();

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42),
        group: Some(1),
        num_recommendations: 5,
        ..Default::default()
    });

    assert!(result.contains_key(&10));
    assert!(!result.contains_key(&11));
}

struct FixedReferrerClusters(HashSet<i64>);

impl ClusterFromReferrer for FixedReferrerClusters {
    fn clusters(&self, _referrer: &str) -> Option<HashSet<i64>> {
        Some(self.0.clone())
    }
}

#[test]
fn test_referrer_clusters_contribute_for_unclustered_user() {
    let mut fixture = Fixture::new().count(9, 20, 4.0);
    fixture.referrer_mapper = Some(Arc::new(FixedReferrerClusters(
        [9].into_iter().collect(),
    )));
    let recommender = fixture.recommender();

    let result = recommender.recommend(&RecommendOptions {
        user: Some(42), // user has no memberships
        referrer: Some("news.example.com".to_string()),
        num_recommendations: 2,
        ..Default::default()
    });

    assert!((result[&20] - 1.0).abs() < 1e-9);
}

#[test]
fn test_add_count_accrues_to_bucket_without_memberships() {
    let fixture = Fixture::new();
    let counts = fixture.counts.clone();
    let recommender = fixture.recommender();

    let now = Utc::now().timestamp();
    recommender.add_count(None, 10, now, Some(2.0), None);
    recommender.add_count(None, 11, now, None, None);

    assert!((counts.count(BUCKET_CLUSTER_ID, 10, now) - 2.0).abs() < 1e-9);
    assert!((counts.count(BUCKET_CLUSTER_ID, 11, now) - 1.0).abs() < 1e-9);
}

#[test]
fn test_add_count_weighted_by_membership() {
    let fixture = Fixture::new().member(42, 3, 0.5);
    let counts = fixture.counts.clone();
    let recommender = fixture.recommender();

    let now = Utc::now().timestamp();
    recommender.add_count(Some(42), 10, now, Some(4.0), None);

    assert!((counts.count(3, 10, now) - 2.0).abs() < 1e-9);
    assert_eq!(counts.count(BUCKET_CLUSTER_ID, 10, now), 0.0);
}

#[test]
fn test_recommend_global_reads_bucket_aggregates() {
    let recommender = Fixture::new()
        .count(BUCKET_CLUSTER_ID, 10, 5.0)
        .count(BUCKET_CLUSTER_ID, 11, 3.0)
        .recommender();

    let result = recommender.recommend_global(&HashSet::new(), 2, &HashSet::new(), 0.0, None);
    assert!((result[&10] - 1.0).abs() < 1e-9);
    assert!((result[&11] - 0.6).abs() < 1e-9);

    let excluded = recommender.recommend_global(
        &HashSet::new(),
        2,
        &[10].into_iter().collect(),
        0.0,
        None,
    );
    assert!(!excluded.contains_key(&10));
}

#[test]
fn test_recommend_by_item_uses_item_dimensions_as_clusters() {
    let mut fixture = Fixture::new().count(7, 30, 4.0).count(7, 31, 2.0);
    fixture.item_meta.set_item_dimensions(99, [7]);
    let recommender = fixture.recommender();

    let result = recommender.recommend_by_item(
        99,
        ItemClusterSource::Dimensions,
        &HashSet::new(),
        2,
        &HashSet::new(),
        0.0,
        1,
        false,
    );
    assert!((result[&30] - 1.0).abs() < 1e-9);
    assert!((result[&31] - 0.5).abs() < 1e-9);
}

#[test]
fn test_recommend_by_item_without_clusters_is_empty() {
    let recommender = Fixture::new().count(7, 30, 4.0).recommender();
    let result = recommender.recommend_by_item(
        99,
        ItemClusterSource::ItemCluster,
        &HashSet::new(),
        2,
        &HashSet::new(),
        0.0,
        1,
        false,
    );
    assert!(result.is_empty());
}

#[test]
fn test_recommend_by_tag_weights_per_tag() {
    let recommender = Fixture::new().recommender();
    // the in-memory store cannot serve tag queries at all, so the result
    // degrades to empty rather than erroring
    let tag_weights = HashMap::from([("football".to_string(), 0.9f32)]);
    let result = recommender.recommend_by_tag(
        &tag_weights,
        0,
        &HashSet::new(),
        None,
        2,
        &HashSet::new(),
        0.0,
        1,
    );
    assert!(result.is_empty());
}

#[test]
fn test_sort_orders_by_cluster_signal() {
    let recommender = Fixture::new()
        .member(42, 3, 0.8)
        .count(3, 10, 5.0)
        .count(3, 11, 3.0)
        .recommender();

    // unmatched item 99 is dropped under the default config
    let sorted = recommender.sort(42, &[11, 99, 10], None, false, 1.0, 1.0);
    assert_eq!(sorted, vec![10, 11]);
}

#[test]
fn test_sort_keeps_unmatched_in_original_order_when_configured() {
    let mut fixture = Fixture::new()
        .member(42, 3, 0.8)
        .count(3, 10, 5.0)
        .count(3, 11, 3.0);
    fixture.config.fill_zeros_with_most_popular = false;
    let recommender = fixture.recommender();

    let sorted = recommender.sort(42, &[98, 11, 99, 10], None, false, 1.0, 1.0);
    assert_eq!(sorted, vec![10, 11, 98, 99]);
}

#[test]
fn test_sort_without_clusters_is_empty() {
    let recommender = Fixture::new().count(3, 10, 5.0).recommender();
    assert!(recommender.sort(7, &[10, 11], None, false, 1.0, 1.0).is_empty());
}
