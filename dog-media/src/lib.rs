//! dog-media: client-side media coordination for DogRS.
//!
//! Three independent widgets (gallery, uploader, viewer) share one
//! [`EventBus`] and nothing else:
//!
//! ```text
//! Uploader ─▶ UploadCoordinator ─▶ StorageGateway.upload
//!                   │
//!                   └─ mediaUploaded ─▶ MediaCollection.reload ─▶ Gallery re-render
//!
//! Gallery.click ─ mediaSelected ─▶ SelectionController (viewer)
//! ```
//!
//! Storage is injected as an `Arc<dyn StorageGateway>` (see `dog-blob`), so
//! tests can run the whole flow against `MemoryBlobStore` or a fake.
//!
//! ```rust
//! use std::sync::Arc;
//! use dog_blob::{BlobAdapter, BlobConfig, MemoryBlobStore, StorageGateway, UploadFile};
//! use dog_media::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> MediaResult<()> {
//! let config = MediaConfig::default();
//! let gateway: Arc<dyn StorageGateway> =
//!     Arc::new(BlobAdapter::new(MemoryBlobStore::new(), BlobConfig::default()));
//! let bus = EventBus::new();
//!
//! let collection = Arc::new(MediaCollection::new(gateway.clone(), &config));
//! let uploader = UploadCoordinator::new(gateway, bus.clone(), &config);
//!
//! let report = uploader
//!     .upload_batch(vec![UploadFile::new("cat.png", b"png".to_vec()).with_mime_type("image/png")])
//!     .await?;
//! assert!(report.all_succeeded());
//!
//! collection.reload().await?;
//! assert_eq!(collection.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod collection;
mod config;
mod error;
pub mod events;
pub mod gallery;
mod notice;
pub mod selection;
pub mod upload;

pub use collection::{MediaCollection, ReloadTrigger, Snapshot, SortOrder};
pub use config::{MediaConfig, DEFAULT_NOTICE_TTL};
pub use error::{MediaError, MediaResult};
pub use events::{
    parse_event_kind, parse_event_pattern, EventBus, EventPat, ListenerId, MediaEvent,
    MediaEventHub, MediaEventKind, Subscription,
};
pub use gallery::{Gallery, GalleryCard};
pub use notice::{Notice, NoticeBoard};
pub use selection::{CloseTrigger, Selection, SelectionController};
pub use upload::{BatchReport, UploadCoordinator, UploadJob, UploadOutcome, UploaderStatus};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CloseTrigger, EventBus, Gallery, MediaCollection, MediaConfig, MediaError, MediaEvent,
        MediaEventKind, MediaResult, Selection, SelectionController, SortOrder, UploadCoordinator,
    };
}
