use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use dog_blob::{
    no_progress, BlobAdapter, BlobConfig, BlobError, BlobId, MemoryBlobStore, ProgressFn,
    ProgressRules, StorageGateway, UploadFile, DEFAULT_CONTENT_TYPE,
};

/// Test factory functions
fn create_gateway(store: &MemoryBlobStore) -> BlobAdapter {
    BlobAdapter::new(store.clone(), BlobConfig::default())
}

fn create_file(name: &str, mime: &str) -> UploadFile {
    UploadFile::new(name, b"not really pixels".to_vec()).with_mime_type(mime)
}

fn recording_progress() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    (Arc::new(move |p| sink_seen.lock().push(p)), seen)
}

#[tokio::test(start_paused = true)]
async fn test_simulated_progress_is_monotonic_and_ends_at_100() {
    let store = MemoryBlobStore::new().with_latency(Duration::from_secs(1));
    let gateway = create_gateway(&store);
    let (sink, seen) = recording_progress();

    let item = gateway.upload(create_file("cat.png", "image/png"), sink).await.unwrap();

    let values = seen.lock().clone();
    assert!(values.len() > 2, "expected ticks, got {values:?}");
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(values.last(), Some(&100));
    assert!(values[..values.len() - 1].iter().all(|p| *p < 100));
    assert_eq!(item.name, "cat.png");
    assert_eq!(item.mime_type, "image/png");
}

#[tokio::test]
async fn test_native_progress_passes_through() {
    let store = MemoryBlobStore::new().with_native_progress();
    let gateway = create_gateway(&store);
    let (sink, seen) = recording_progress();

    gateway.upload(create_file("clip.mp4", "video/mp4"), sink).await.unwrap();

    assert_eq!(*seen.lock(), vec![25, 50, 75, 99, 100]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_upload_carries_name_and_stops_progress() {
    let store = MemoryBlobStore::new().with_latency(Duration::from_millis(500));
    store.fail_uploads_named("broken.gif");
    let gateway = create_gateway(&store);
    let (sink, seen) = recording_progress();

    let failure = gateway.upload(create_file("broken.gif", "image/gif"), sink).await.unwrap_err();
    let after_failure = seen.lock().len();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(failure.file_name, "broken.gif");
    assert!(failure.reason.is_transport());
    assert_eq!(seen.lock().len(), after_failure);
    assert!(!seen.lock().contains(&100));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_empty_file_name_is_rejected_before_storage() {
    let store = MemoryBlobStore::new();
    let gateway = create_gateway(&store);

    let failure = gateway.upload(create_file("  ", "image/png"), no_progress()).await.unwrap_err();

    assert!(matches!(failure.reason, BlobError::Invalid { .. }));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_identical_names_get_distinct_ids() {
    let store = MemoryBlobStore::new();
    let gateway = create_gateway(&store);

    let mut ids = HashSet::new();
    for _ in 0..5 {
        let item = gateway.upload(create_file("same.jpg", "image/jpeg"), no_progress()).await.unwrap();
        assert!(item.id.as_str().ends_with(".jpg"));
        ids.insert(item.id);
    }

    let listed: HashSet<BlobId> = gateway.list().await.unwrap().into_iter().map(|i| i.id).collect();
    assert_eq!(ids.len(), 5);
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_list_defaults_mime_and_sorts_newest_first() {
    let store = MemoryBlobStore::new();
    store.insert_raw("old.png", Some("old.png"), Some("image/png"), Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
    store.insert_raw("new.webm", Some("new.webm"), Some("video/webm"), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    store.insert_raw("bare", None, None, Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap());
    let gateway = create_gateway(&store);

    let items = gateway.list().await.unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["new.webm", "bare", "old.png"]);
    assert_eq!(items[1].mime_type, DEFAULT_CONTENT_TYPE);
    assert_eq!(items[1].name, "bare");
    assert!(items[0].is_video());
}

#[tokio::test]
async fn test_every_listing_signs_fresh_urls() {
    let store = MemoryBlobStore::new();
    store.insert_raw("a.png", None, Some("image/png"), Utc::now());
    let gateway = create_gateway(&store);

    let first = gateway.list().await.unwrap();
    let second = gateway.list().await.unwrap();

    assert_eq!(store.sign_calls(), 2);
    assert_ne!(first[0].url, second[0].url);
    assert_eq!(first[0].id, second[0].id);
}

#[tokio::test]
async fn test_empty_bucket_lists_nothing() {
    let gateway = create_gateway(&MemoryBlobStore::new());
    assert!(gateway.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_fails_only_on_transport() {
    let store = MemoryBlobStore::new();
    store.set_offline(true);
    let gateway = create_gateway(&store);

    assert!(gateway.list().await.unwrap_err().is_transport());
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let store = MemoryBlobStore::new();
    store.insert_raw("gone.png", None, None, Utc::now());
    store.insert_raw("kept.png", None, None, Utc::now());
    let gateway = create_gateway(&store);

    gateway.remove(&BlobId::from("gone.png")).await.unwrap();
    gateway.remove(&BlobId::from("gone.png")).await.unwrap();

    assert!(!store.contains("gone.png"));
    assert!(store.contains("kept.png"));
}

#[tokio::test(start_paused = true)]
async fn test_zero_progress_interval_still_uploads() {
    let store = MemoryBlobStore::new().with_latency(Duration::from_millis(20));
    let rules = ProgressRules {
        step: 10,
        interval: Duration::ZERO,
        ceiling: 90,
    };
    let gateway = BlobAdapter::new(store.clone(), BlobConfig::default().with_progress_rules(rules));
    let (sink, seen) = recording_progress();

    gateway.upload(create_file("fast.png", "image/png"), sink).await.unwrap();

    let values = seen.lock().clone();
    assert_eq!(values.first(), Some(&0));
    assert_eq!(values.last(), Some(&100));
    assert!(values.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_signing_failure_rolls_back_the_object() {
    let store = MemoryBlobStore::new();
    store.set_signing_broken(true);
    let gateway = create_gateway(&store);
    let (sink, seen) = recording_progress();

    let failure = gateway.upload(create_file("orphan.png", "image/png"), sink).await.unwrap_err();

    assert_eq!(failure.file_name, "orphan.png");
    assert!(failure.reason.is_transport());
    assert!(store.is_empty());
    assert!(!seen.lock().contains(&100));

    store.set_signing_broken(false);
    assert!(gateway.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_without_signed_urls_is_refused() {
    let store = MemoryBlobStore::new().without_signed_urls();
    store.insert_raw("a.png", None, Some("image/png"), Utc::now());
    let gateway = create_gateway(&store);

    let failure = gateway.upload(create_file("b.png", "image/png"), no_progress()).await.unwrap_err();
    assert!(matches!(failure.reason, BlobError::Unsupported));
    assert!(matches!(gateway.list().await.unwrap_err(), BlobError::Unsupported));
    assert_eq!(store.len(), 1);
    assert_eq!(store.list_calls(), 0);
}
