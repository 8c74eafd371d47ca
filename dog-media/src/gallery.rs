use std::sync::Arc;

use dog_blob::{BlobId, MediaItem, MediaKind};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::events::{EventBus, MediaEvent};
use crate::{MediaCollection, MediaConfig, MediaResult, SortOrder};

/// One tile of the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryCard {
    pub item: MediaItem,
    pub kind: MediaKind,
}

/// Headless gallery widget: renders from a [`MediaCollection`] and announces
/// clicks on the bus. It never talks to the viewer directly.
pub struct Gallery {
    collection: Arc<MediaCollection>,
    bus: EventBus,
    sort: Mutex<SortOrder>,
}

impl Gallery {
    pub fn new(collection: Arc<MediaCollection>, bus: EventBus, config: &MediaConfig) -> Self {
        Self {
            collection,
            bus,
            sort: Mutex::new(config.default_sort),
        }
    }

    pub fn sort_order(&self) -> SortOrder {
        *self.sort.lock()
    }

    /// Flip between date and random ordering; returns the new order
    pub fn toggle_sort(&self) -> SortOrder {
        let mut sort = self.sort.lock();
        *sort = match *sort {
            SortOrder::ByRecency => SortOrder::Shuffled,
            SortOrder::Shuffled => SortOrder::ByRecency,
        };
        *sort
    }

    /// Caption of the sort button: it offers the other ordering
    pub fn sort_label(&self) -> &'static str {
        match self.sort_order() {
            SortOrder::ByRecency => "Sort by Random",
            SortOrder::Shuffled => "Sort by Date",
        }
    }

    /// Cards in the current presentation order. Shuffled order is recomputed
    /// on every call.
    pub fn cards(&self) -> Vec<GalleryCard> {
        self.collection
            .order(self.sort_order())
            .into_iter()
            .map(|item| GalleryCard {
                kind: item.kind(),
                item,
            })
            .collect()
    }

    /// A tile was clicked: look it up and publish `mediaSelected`
    pub fn click(&self, id: &BlobId) -> MediaResult<()> {
        let item = self.collection.find(id)?;
        self.bus.publish(MediaEvent::Selected(item));
        Ok(())
    }

    /// Fires whenever the collection has a new snapshot to render
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.collection.subscribe()
    }
}
