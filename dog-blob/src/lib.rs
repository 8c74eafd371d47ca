//! # dog-blob: media storage gateway
//!
//! `dog-blob` is the storage edge of a DogRS media front end. It hides the
//! object store behind four primitives (list, put, delete, signed URL) and
//! turns them into [`MediaItem`] records the rest of the application can render.
//!
//! ## Key Features
//!
//! - **Storage agnostic**: any backend implementing [`BlobStore`] (S3-compatible, in-memory, custom)
//! - **Collision-free keys**: random token + timestamp + original extension, and no overwrites
//! - **Expiring URLs**: every listing issues fresh signed URLs with a configurable TTL
//! - **Progress, always**: native progress when the store has it, a synthetic ticker when it doesn't
//! - **Failures are values**: uploads return [`UploadFailure`] carrying the file name
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_blob::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let gateway = BlobAdapter::new(MemoryBlobStore::new(), BlobConfig::default());
//!
//! let file = UploadFile::new("cat.png", b"\x89PNG".to_vec()).with_mime_type("image/png");
//! let item = gateway
//!     .upload(file, Arc::new(|percent: u8| println!("{percent}%")))
//!     .await
//!     .expect("upload");
//!
//! let items = gateway.list().await.expect("list");
//! assert_eq!(items[0].id, item.id);
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   dog-media      │  ← collection, uploads, selection, events
//! ├──────────────────┤
//! │ StorageGateway   │  ← BlobAdapter: keys, URLs, progress, media items
//! ├──────────────────┤
//! │   BlobStore      │  ← storage primitives
//! └──────────────────┘
//! ```

pub mod adapter;
mod config;
mod error;
mod media;
mod memory_store;
pub mod progress;
mod s3_store;
pub mod store;
mod types;

// Re-export main types for clean API
pub use adapter::{BlobAdapter, StorageGateway};
pub use config::{
    BlobConfig, ProgressRules, DEFAULT_CONTENT_TYPE, DEFAULT_SIGNED_URL_TTL_SECS,
    MIN_PROGRESS_INTERVAL,
};
pub use error::{BlobError, BlobResult, UploadFailure};
pub use media::{MediaItem, MediaKind};
pub use memory_store::MemoryBlobStore;
pub use s3_store::{S3CompatibleStore, S3Config};
pub use store::{BlobKeyStrategy, BlobStore, DefaultKeyStrategy, PutResult, StoreCapabilities};
pub use types::{no_progress, BlobId, ObjectEntry, ProgressFn, PutObject, UploadFile};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobAdapter, BlobConfig, BlobError, BlobId, BlobResult, BlobStore, MediaItem,
        MemoryBlobStore, StorageGateway, UploadFailure, UploadFile,
    };
}
