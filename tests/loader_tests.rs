//! Background loading: bounded scheduling, atomic swap, failure isolation.

use std::sync::Arc;

use recserve::cluster::UserClusterStore;
use recserve::items::{InMemoryItemMetadata, ItemMetadata};
use recserve::loader::{
    ExternalDataLoader, FileResourceStreamer, InMemoryResourceStreamer, ResourceKind,
};

fn loader(streamer: Arc<InMemoryResourceStreamer>) -> Arc<ExternalDataLoader> {
    let mut meta = InMemoryItemMetadata::new();
    meta.set_dimension_name(3, "category", "sport");
    meta.set_dimension_name(4, "category", "news");
    let item_meta: Arc<dyn ItemMetadata> = Arc::new(meta);
    Arc::new(ExternalDataLoader::new(streamer, item_meta, 2))
}

fn cluster_lines(entries: &[(u64, i32, f64)]) -> String {
    entries
        .iter()
        .map(|(user, dim, weight)| {
            format!("{{\"user\":{user},\"dim\":{dim},\"weight\":{weight}}}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_notification_loads_store_in_background() {
    let streamer = Arc::new(InMemoryResourceStreamer::new());
    streamer.put(
        "clusters/acme",
        cluster_lines(&[(42, 3, 0.8), (42, 4, 0.2), (43, 3, 1.0)]),
    );
    let loader = loader(streamer.clone());

    assert!(loader.cluster_store("acme").is_none());
    loader
        .notify_new_location("acme", "clusters/acme", ResourceKind::UserClusters)
        .await
        .expect("rebuild task");

    let store = loader.cluster_store("acme").expect("store published");
    assert_eq!(store.num_users(), 2);
    assert_eq!(store.clusters(42).len(), 2);

    let description = loader.cluster_description("acme").expect("description");
    assert_eq!(description.name(3), Some("category:sport"));
    assert_eq!(description.name(4), Some("category:news"));
}

#[tokio::test]
async fn test_reload_replaces_whole_store() {
    let streamer = Arc::new(InMemoryResourceStreamer::new());
    streamer.put("v1", cluster_lines(&[(42, 3, 0.8)]));
    streamer.put("v2", cluster_lines(&[(7, 4, 0.5)]));
    let loader = loader(streamer.clone());

    loader
        .notify_new_location("acme", "v1", ResourceKind::UserClusters)
        .await
        .expect("first rebuild");
    loader
        .notify_new_location("acme", "v2", ResourceKind::UserClusters)
        .await
        .expect("second rebuild");

    let store = loader.cluster_store("acme").expect("store");
    // the old snapshot is gone as a whole, not merged
    assert!(store.clusters(42).is_empty());
    assert_eq!(store.clusters(7).len(), 1);
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() {
    let streamer = Arc::new(InMemoryResourceStreamer::new());
    streamer.put("v1", cluster_lines(&[(42, 3, 0.8)]));
    streamer.put("v2", "{\"user\":42,\"dim\":broken\n");
    let loader = loader(streamer.clone());

    loader
        .notify_new_location("acme", "v1", ResourceKind::UserClusters)
        .await
        .expect("first rebuild");
    loader
        .notify_new_location("acme", "v2", ResourceKind::UserClusters)
        .await
        .expect("second rebuild task");

    let store = loader.cluster_store("acme").expect("previous store serving");
    assert_eq!(store.clusters(42).len(), 1);
}

#[tokio::test]
async fn test_missing_resource_keeps_store_absent() {
    let streamer = Arc::new(InMemoryResourceStreamer::new());
    let loader = loader(streamer);

    loader
        .notify_new_location("acme", "nowhere", ResourceKind::UserClusters)
        .await
        .expect("rebuild task");
    assert!(loader.cluster_store("acme").is_none());
}

#[tokio::test]
async fn test_deletion_removes_store_outright() {
    let streamer = Arc::new(InMemoryResourceStreamer::new());
    streamer.put("v1", cluster_lines(&[(42, 3, 0.8)]));
    let loader = loader(streamer);

    loader
        .notify_new_location("acme", "v1", ResourceKind::UserClusters)
        .await
        .expect("rebuild");
    loader.notify_location_deleted("acme", ResourceKind::UserClusters);

    assert!(loader.cluster_store("acme").is_none());
    assert!(loader.cluster_description("acme").is_none());
}

#[tokio::test]
async fn test_tag_affinity_store_loads_independently() {
    let streamer = Arc::new(InMemoryResourceStreamer::new());
    streamer.put(
        "tags/acme",
        "{\"user\":42,\"tag\":\"football\",\"weight\":0.9}\n\
         {\"user\":42,\"tag\":\"tennis\",\"weight\":0.4}\n",
    );
    let loader = loader(streamer);

    loader
        .notify_new_location("acme", "tags/acme", ResourceKind::TagAffinity)
        .await
        .expect("rebuild");

    let store = loader.tag_store("acme").expect("tag store");
    let affinities = store.tag_affinities(42);
    assert_eq!(affinities.len(), 2);
    assert_eq!(affinities.get("football"), Some(&0.9));
    assert!(loader.cluster_store("acme").is_none());
}

#[tokio::test]
async fn test_file_streamer_loads_from_disk() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("part-00000"),
        cluster_lines(&[(42, 3, 0.8)]),
    )
    .expect("write resource");

    let mut meta = InMemoryItemMetadata::new();
    meta.set_dimension_name(3, "category", "sport");
    let item_meta: Arc<dyn ItemMetadata> = Arc::new(meta);
    let loader = Arc::new(ExternalDataLoader::new(
        Arc::new(FileResourceStreamer::new(dir.path())),
        item_meta,
        2,
    ));

    loader
        .notify_new_location("acme", "part-00000", ResourceKind::UserClusters)
        .await
        .expect("rebuild");
    let store = loader.cluster_store("acme").expect("store loaded");
    assert_eq!(store.clusters(42).len(), 1);
}

#[tokio::test]
async fn test_concurrent_reloads_for_many_clients() {
    let streamer = Arc::new(InMemoryResourceStreamer::new());
    for i in 0..10u64 {
        streamer.put(
            &format!("clusters/client-{i}"),
            cluster_lines(&[(i, 3, 0.5)]),
        );
    }
    let loader = loader(streamer);

    let handles: Vec<_> = (0..10u64)
        .map(|i| {
            loader.notify_new_location(
                &format!("client-{i}"),
                &format!("clusters/client-{i}"),
                ResourceKind::UserClusters,
            )
        })
        .collect();
    for handle in handles {
        handle.await.expect("rebuild");
    }

    for i in 0..10u64 {
        let store = loader
            .cluster_store(&format!("client-{i}"))
            .expect("store loaded");
        assert_eq!(store.clusters(i).len(), 1);
    }
}
