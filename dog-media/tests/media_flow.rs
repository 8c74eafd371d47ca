use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use dog_blob::{
    BlobAdapter, BlobConfig, BlobId, BlobResult, MediaItem, MemoryBlobStore, ProgressFn,
    StorageGateway, UploadFailure, UploadFile,
};
use dog_media::{
    CloseTrigger, EventBus, Gallery, MediaCollection, MediaConfig, MediaError, MediaEvent,
    Selection, SelectionController, SortOrder, UploadCoordinator, UploadOutcome, UploaderStatus,
};

/// Wraps the real gateway and records how many uploads overlap
struct CountingGateway {
    inner: BlobAdapter,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl StorageGateway for CountingGateway {
    async fn upload(&self, file: UploadFile, on_progress: ProgressFn) -> Result<MediaItem, UploadFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.upload(file, on_progress).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list(&self) -> BlobResult<Vec<MediaItem>> {
        self.inner.list().await
    }

    async fn remove(&self, id: &BlobId) -> BlobResult<()> {
        self.inner.remove(id).await
    }
}

/// Test factory functions
fn create_gateway(store: &MemoryBlobStore) -> Arc<dyn StorageGateway> {
    Arc::new(BlobAdapter::new(store.clone(), BlobConfig::default()))
}

fn create_file(name: &str) -> UploadFile {
    let mime = if name.ends_with(".mp4") { "video/mp4" } else { "image/png" };
    UploadFile::new(name, name.as_bytes().to_vec()).with_mime_type(mime)
}

fn record_events(bus: &EventBus) -> Arc<Mutex<Vec<MediaEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.on_any(move |event| sink.lock().push(event.clone()));
    seen
}

fn seed(store: &MemoryBlobStore) {
    let at = |day| Utc.with_ymd_and_hms(2024, 2, day, 8, 0, 0).unwrap();
    store.insert_raw("a.png", Some("a.png"), Some("image/png"), at(1));
    store.insert_raw("b.mp4", Some("b.mp4"), Some("video/mp4"), at(3));
    store.insert_raw("c.png", Some("c.png"), Some("image/png"), at(2));
}

#[tokio::test(start_paused = true)]
async fn test_batch_continues_past_a_failed_file() {
    let store = MemoryBlobStore::new().with_latency(Duration::from_millis(300));
    store.fail_uploads_named("two.png");
    let gateway = Arc::new(CountingGateway {
        inner: BlobAdapter::new(store.clone(), BlobConfig::default()),
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
    });
    let bus = EventBus::new();
    let events = record_events(&bus);
    let uploader = UploadCoordinator::new(gateway.clone(), bus.clone(), &MediaConfig::default());

    let report = uploader
        .upload_batch(vec![create_file("one.png"), create_file("two.png"), create_file("three.mp4")])
        .await
        .unwrap();

    assert_eq!(gateway.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(report.jobs.len(), 3);
    assert!(matches!(report.jobs[0].outcome, UploadOutcome::Succeeded(_)));
    assert!(matches!(report.jobs[1].outcome, UploadOutcome::Failed(_)));
    assert!(matches!(report.jobs[2].outcome, UploadOutcome::Succeeded(_)));
    assert_eq!(report.jobs[0].progress, 100);
    assert!(report.jobs[1].progress < 100);

    let errors = report.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], MediaError::UploadFailure { file_name, .. } if file_name == "two.png"));

    let names: Vec<String> = events
        .lock()
        .iter()
        .map(|event| match event {
            MediaEvent::Uploaded(item) => format!("ok:{}", item.name),
            MediaEvent::UploadFailed { file_name, .. } => format!("err:{}", file_name),
            other => format!("{other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["ok:one.png", "err:two.png", "ok:three.mp4"]);

    assert_eq!(store.len(), 2);
    assert_eq!(uploader.notices().current().unwrap().message, "Error uploading file: two.png");
    assert_eq!(uploader.status(), UploaderStatus::Idle);
    assert!(uploader.status().controls_enabled());
}

#[tokio::test]
async fn test_empty_selection_is_rejected_before_storage() {
    let store = MemoryBlobStore::new();
    let bus = EventBus::new();
    let events = record_events(&bus);
    let uploader = UploadCoordinator::new(create_gateway(&store), bus, &MediaConfig::default());

    let err = uploader.upload_batch(Vec::new()).await.unwrap_err();

    assert!(matches!(err, MediaError::EmptyInput));
    assert!(events.lock().is_empty());
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_uploader_status_tracks_progress_then_idles() {
    let store = MemoryBlobStore::new().with_latency(Duration::from_secs(1));
    let uploader = Arc::new(UploadCoordinator::new(create_gateway(&store), EventBus::new(), &MediaConfig::default()));
    let mut status = uploader.subscribe_status();

    let running = Arc::clone(&uploader);
    let batch = tokio::spawn(async move { running.upload_batch(vec![create_file("slow.png")]).await });

    let mut seen = Vec::new();
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().clone();
        let idle = current == UploaderStatus::Idle;
        seen.push(current);
        if idle {
            break;
        }
    }
    batch.await.unwrap().unwrap();

    assert!(seen.iter().any(|s| !s.controls_enabled()));
    let progress: Vec<u8> = seen.iter().filter_map(UploaderStatus::progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last(), Some(&UploaderStatus::Idle));
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() {
    let store = MemoryBlobStore::new();
    seed(&store);
    let collection = MediaCollection::new(create_gateway(&store), &MediaConfig::default());
    collection.reload().await.unwrap();
    let before = collection.items();

    store.set_offline(true);
    let err = collection.reload().await.unwrap_err();

    assert!(matches!(err, MediaError::Transport(_)));
    assert_eq!(collection.items(), before);
    assert_eq!(collection.generation(), 1);
    assert!(collection.notices().current().is_some());
}

#[tokio::test]
async fn test_reload_replaces_the_whole_snapshot() {
    let store = MemoryBlobStore::new();
    seed(&store);
    let collection = MediaCollection::new(create_gateway(&store), &MediaConfig::default());
    assert!(collection.is_empty());

    collection.reload().await.unwrap();
    let first_urls: HashSet<String> = collection.items().into_iter().map(|i| i.url).collect();

    store.insert_raw("d.png", None, Some("image/png"), Utc::now());
    collection.reload().await.unwrap();

    assert_eq!(collection.len(), 4);
    assert!(collection.items().iter().all(|item| !first_urls.contains(&item.url)));
    assert_eq!(collection.generation(), 2);
}

#[tokio::test]
async fn test_order_by_recency_and_shuffle_leave_cache_alone() {
    let store = MemoryBlobStore::new();
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for i in 0..12 {
        store.insert_raw(&format!("item-{i:02}.png"), None, Some("image/png"), base + chrono::Duration::hours(i));
    }
    let collection = MediaCollection::new(create_gateway(&store), &MediaConfig::default());
    collection.reload().await.unwrap();
    let cache_order = collection.items();

    let recent = collection.order(SortOrder::ByRecency);
    assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    assert_eq!(recent[0].id, BlobId::from("item-11.png"));
    assert_eq!(collection.order(SortOrder::ByRecency), recent);

    let first = collection.order(SortOrder::Shuffled);
    let second = collection.order(SortOrder::Shuffled);
    assert_ne!(first, second);
    assert_eq!(first.len(), 12);
    assert_eq!(collection.items(), cache_order);
}

#[tokio::test]
async fn test_order_by_recency_is_stable_for_ties() {
    let store = MemoryBlobStore::new();
    let same = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    store.insert_raw("x1.png", None, None, same);
    store.insert_raw("x2.png", None, None, same);
    store.insert_raw("x3.png", None, None, same);
    let collection = MediaCollection::new(create_gateway(&store), &MediaConfig::default());
    collection.reload().await.unwrap();

    let cache_ids: Vec<BlobId> = collection.items().into_iter().map(|i| i.id).collect();
    let sorted_ids: Vec<BlobId> = collection.order(SortOrder::ByRecency).into_iter().map(|i| i.id).collect();
    assert_eq!(sorted_ids, cache_ids);
}

#[tokio::test]
async fn test_find_hits_and_misses() {
    let store = MemoryBlobStore::new();
    seed(&store);
    let collection = MediaCollection::new(create_gateway(&store), &MediaConfig::default());
    collection.reload().await.unwrap();

    assert_eq!(collection.find(&BlobId::from("b.mp4")).unwrap().name, "b.mp4");
    let miss = collection.find(&BlobId::from("nope")).unwrap_err();
    assert!(miss.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_uploads_reach_the_gallery_through_the_bus() {
    let store = MemoryBlobStore::new();
    let gateway = create_gateway(&store);
    let config = MediaConfig::default();
    let bus = EventBus::new();

    let collection = Arc::new(MediaCollection::new(gateway.clone(), &config));
    let _trigger = collection.attach(&bus);
    let gallery = Gallery::new(Arc::clone(&collection), bus.clone(), &config);
    let uploader = UploadCoordinator::new(gateway, bus.clone(), &config);
    let mut changes = gallery.changes();

    let report = uploader
        .upload_batch(vec![create_file("same.png"), create_file("same.png")])
        .await
        .unwrap();
    while collection.len() < 2 {
        changes.changed().await.unwrap();
    }

    let uploaded: HashSet<BlobId> = report.uploaded().map(|item| item.id.clone()).collect();
    let shown: HashSet<BlobId> = gallery.cards().into_iter().map(|card| card.item.id).collect();
    assert_eq!(uploaded.len(), 2);
    assert_eq!(shown, uploaded);
}

#[tokio::test]
async fn test_bursts_of_uploads_coalesce_into_one_reload() {
    let store = MemoryBlobStore::new();
    seed(&store);
    let bus = EventBus::new();
    let collection = Arc::new(MediaCollection::new(create_gateway(&store), &MediaConfig::default()));
    let _trigger = collection.attach(&bus);
    let mut changes = collection.subscribe();

    let item = MediaItem::new(BlobId::from("a.png"), "memory://a.png", Utc::now());
    for _ in 0..5 {
        bus.publish(MediaEvent::Uploaded(item.clone()));
    }
    changes.changed().await.unwrap();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(store.list_calls(), 1);
    assert_eq!(collection.len(), 3);
}

#[tokio::test]
async fn test_gallery_click_opens_viewer_via_bus() {
    let store = MemoryBlobStore::new();
    seed(&store);
    let config = MediaConfig::default();
    let bus = EventBus::new();
    let collection = Arc::new(MediaCollection::new(create_gateway(&store), &config));
    collection.reload().await.unwrap();

    let gallery = Gallery::new(Arc::clone(&collection), bus.clone(), &config);
    let viewer = Arc::new(SelectionController::new(bus.clone()));
    let _binding = viewer.attach(&bus);

    gallery.click(&BlobId::from("c.png")).unwrap();
    gallery.click(&BlobId::from("b.mp4")).unwrap();
    let Selection::Open(open) = viewer.current() else {
        panic!("viewer should be open");
    };
    assert_eq!(open.id, BlobId::from("b.mp4"));
    assert!(open.is_video());

    assert!(gallery.click(&BlobId::from("missing")).unwrap_err().is_not_found());
    assert_eq!(viewer.current().item().unwrap().id, BlobId::from("b.mp4"));

    assert!(viewer.close(CloseTrigger::Backdrop));
    assert_eq!(viewer.current(), Selection::Idle);
}

#[tokio::test]
async fn test_removing_the_open_item_closes_viewer_and_reloads() {
    let store = MemoryBlobStore::new();
    seed(&store);
    let config = MediaConfig::default();
    let bus = EventBus::new();
    let collection = Arc::new(MediaCollection::new(create_gateway(&store), &config));
    collection.reload().await.unwrap();
    let _trigger = collection.attach(&bus);
    let viewer = Arc::new(SelectionController::new(bus.clone()));
    let _binding = viewer.attach(&bus);
    let mut changes = collection.subscribe();

    let target = collection.find(&BlobId::from("a.png")).unwrap();
    bus.publish(MediaEvent::Selected(target.clone()));
    collection.remove(&target.id, &bus).await.unwrap();
    changes.changed().await.unwrap();

    assert!(!viewer.is_open());
    assert_eq!(collection.len(), 2);
    assert!(collection.find(&target.id).is_err());
}

#[test]
fn test_gallery_sort_toggle() {
    let config = MediaConfig::default();
    let collection = Arc::new(MediaCollection::new(create_gateway(&MemoryBlobStore::new()), &config));
    let gallery = Gallery::new(collection, EventBus::new(), &config);

    assert_eq!(gallery.sort_order(), SortOrder::ByRecency);
    assert_eq!(gallery.sort_label(), "Sort by Random");
    assert_eq!(gallery.toggle_sort(), SortOrder::Shuffled);
    assert_eq!(gallery.sort_label(), "Sort by Date");
    assert_eq!(gallery.toggle_sort(), SortOrder::ByRecency);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_upload_failures_are_logged() {
    let store = MemoryBlobStore::new();
    store.fail_uploads_named("bad.png");
    let uploader = UploadCoordinator::new(create_gateway(&store), EventBus::new(), &MediaConfig::default());

    uploader.upload_batch(vec![create_file("bad.png")]).await.unwrap();

    assert!(logs_contain("Error uploading file bad.png"));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_batch_reenables_controls() {
    let store = MemoryBlobStore::new().with_latency(Duration::from_secs(10));
    let uploader = Arc::new(UploadCoordinator::new(create_gateway(&store), EventBus::new(), &MediaConfig::default()));
    let mut status = uploader.subscribe_status();

    let running = Arc::clone(&uploader);
    let batch = tokio::spawn(async move {
        running
            .upload_batch(vec![create_file("long.png"), create_file("longer.png")])
            .await
    });
    status.wait_for(|s| !s.controls_enabled()).await.unwrap();

    batch.abort();
    assert!(batch.await.unwrap_err().is_cancelled());

    assert_eq!(uploader.status(), UploaderStatus::Idle);
    assert!(store.is_empty());

    let report = uploader.upload_batch(vec![create_file("after.png")]).await.unwrap();
    assert!(report.all_succeeded());
}
