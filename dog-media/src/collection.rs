use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use dog_blob::{BlobId, MediaItem, StorageGateway};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::events::{EventBus, MediaEvent, MediaEventKind, Subscription};
use crate::{MediaConfig, MediaError, MediaResult, NoticeBoard};

const RELOAD_FAILED_NOTICE: &str = "Error loading media. Please try again later.";

/// Presentation orderings over a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Newest `created_at` first; ties keep snapshot order
    #[default]
    ByRecency,
    /// A fresh random permutation on every call
    Shuffled,
}

/// One immutable generation of the collection
#[derive(Debug, Default)]
pub struct Snapshot {
    items: Vec<MediaItem>,
    index: HashMap<BlobId, usize>,
    generation: u64,
}

impl Snapshot {
    /// Build a snapshot, keeping the first item for any repeated id
    fn build(listed: Vec<MediaItem>, generation: u64) -> Self {
        let mut items = Vec::with_capacity(listed.len());
        let mut index = HashMap::with_capacity(listed.len());

        for item in listed {
            if index.contains_key(&item.id) {
                warn!("dropping duplicate media id {} from listing", item.id);
                continue;
            }
            index.insert(item.id.clone(), items.len());
            items.push(item);
        }

        Self {
            items,
            index,
            generation,
        }
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, id: &BlobId) -> Option<&MediaItem> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// In-memory cache of the media the gallery renders from.
///
/// The cache is replaced wholesale on every successful [`reload`](Self::reload)
/// and never merged. A failed reload keeps the last good snapshot. Reloads
/// are serialized so only one ever writes at a time.
pub struct MediaCollection {
    gateway: Arc<dyn StorageGateway>,
    snapshot: RwLock<Arc<Snapshot>>,
    reload_gate: Mutex<()>,
    changes: watch::Sender<u64>,
    notices: NoticeBoard,
}

impl MediaCollection {
    /// Create an empty collection
    pub fn new(gateway: Arc<dyn StorageGateway>, config: &MediaConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            gateway,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            reload_gate: Mutex::new(()),
            changes,
            notices: NoticeBoard::new(config.notice_ttl),
        }
    }

    /// Fetch a fresh listing and swap it in. Returns the new item count.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> MediaResult<usize> {
        let _gate = self.reload_gate.lock().await;

        let listed = match self.gateway.list().await {
            Ok(listed) => listed,
            Err(err) => {
                warn!("Reload failed, keeping previous snapshot: {}", err);
                self.notices.post(RELOAD_FAILED_NOTICE);
                return Err(MediaError::Transport(err));
            }
        };

        let generation = self.snapshot.read().generation + 1;
        let snapshot = Arc::new(Snapshot::build(listed, generation));
        let count = snapshot.len();
        *self.snapshot.write() = snapshot;
        self.changes.send_replace(generation);

        info!("Loaded {} media items (generation {})", count, generation);
        Ok(count)
    }

    /// A derived view of the current snapshot; the cache itself is untouched
    pub fn order(&self, strategy: SortOrder) -> Vec<MediaItem> {
        let mut items = self.snapshot().items().to_vec();
        match strategy {
            SortOrder::ByRecency => items.sort_by_key(|item| Reverse(item.created_at)),
            SortOrder::Shuffled => items.shuffle(&mut rand::thread_rng()),
        }
        items
    }

    pub fn find(&self, id: &BlobId) -> MediaResult<MediaItem> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or_else(|| MediaError::not_found(id.as_str()))
    }

    /// Items in cache order
    pub fn items(&self) -> Vec<MediaItem> {
        self.snapshot().items().to_vec()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.read().generation
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }

    /// Notified with the new generation after every successful reload
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Delete an item from storage and announce it. Attached collections
    /// reload in response.
    #[instrument(skip(self, bus), fields(id = %id))]
    pub async fn remove(&self, id: &BlobId, bus: &EventBus) -> MediaResult<()> {
        self.gateway.remove(id).await?;
        bus.publish(MediaEvent::Removed(id.clone()));
        Ok(())
    }

    /// Reload whenever an upload lands or an item is removed.
    ///
    /// Signals arriving while a reload is running collapse into a single
    /// follow-up reload. Must be called from within a Tokio runtime.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> ReloadTrigger {
        let pending = Arc::new(Notify::new());

        let ids = [MediaEventKind::Uploaded, MediaEventKind::Removed]
            .into_iter()
            .map(|kind| {
                let signal = Arc::clone(&pending);
                bus.on(kind, move |_| signal.notify_one())
            })
            .collect();

        let collection = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                pending.notified().await;
                if let Err(err) = collection.reload().await {
                    debug!("event-triggered reload failed: {}", err);
                }
            }
        });

        ReloadTrigger {
            _subscription: Subscription::new(bus, ids),
            task,
        }
    }
}

/// Keeps a collection in sync with the bus; dropping it detaches
pub struct ReloadTrigger {
    _subscription: Subscription,
    task: JoinHandle<()>,
}

impl Drop for ReloadTrigger {
    fn drop(&mut self) {
        self.task.abort();
    }
}
