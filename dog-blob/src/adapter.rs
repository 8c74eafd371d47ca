use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use tracing::{debug, info, instrument, warn};

use crate::progress::{with_simulated_progress, ProgressGuard};
use crate::{
    BlobConfig, BlobError, BlobId, BlobKeyStrategy, BlobResult, BlobStore, DefaultKeyStrategy,
    MediaItem, ObjectEntry, ProgressFn, PutObject, PutResult, UploadFailure, UploadFile,
};

/// What the media layer needs from storage.
///
/// Failures never escape as panics; they come back as values. Implemented by
/// [`BlobAdapter`]; tests substitute their own.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Upload one file, reporting progress into `on_progress`
    async fn upload(&self, file: UploadFile, on_progress: ProgressFn) -> Result<MediaItem, UploadFailure>;

    /// Every stored item with a freshly signed URL, newest first
    async fn list(&self) -> BlobResult<Vec<MediaItem>>;

    /// Delete an item. Removing an id that is already gone is not an error.
    async fn remove(&self, id: &BlobId) -> BlobResult<()>;
}

/// The storage gateway - turns raw object-store calls into media items
pub struct BlobAdapter {
    store: Arc<dyn BlobStore>,
    keys: Arc<dyn BlobKeyStrategy>,
    config: BlobConfig,
}

impl BlobAdapter {
    /// Create a new blob adapter
    pub fn new<S: BlobStore + 'static>(store: S, config: BlobConfig) -> Self {
        Self {
            store: Arc::new(store),
            keys: Arc::new(DefaultKeyStrategy),
            config,
        }
    }

    /// Create with custom key strategy
    pub fn with_key_strategy<S: BlobStore + 'static, K: BlobKeyStrategy + 'static>(
        store: S,
        keys: K,
        config: BlobConfig,
    ) -> Self {
        Self {
            store: Arc::new(store),
            keys: Arc::new(keys),
            config,
        }
    }

    /// Get configuration
    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    /// Check if the store reports real upload progress
    pub fn has_native_progress(&self) -> bool {
        self.store.capabilities().native_progress
    }

    /// Every item handed out needs a retrieval URL
    fn ensure_signing(&self) -> BlobResult<()> {
        if self.store.capabilities().supports_signed_urls {
            Ok(())
        } else {
            Err(BlobError::Unsupported)
        }
    }

    fn validate(&self, file: &UploadFile) -> BlobResult<()> {
        self.ensure_signing()?;
        if file.name.trim().is_empty() {
            return Err(BlobError::invalid("File name must not be empty"));
        }
        if file.size_bytes() > self.config.max_blob_bytes {
            return Err(BlobError::invalid(format!(
                "Blob size {} exceeds maximum {}",
                file.size_bytes(),
                self.config.max_blob_bytes
            )));
        }
        Ok(())
    }

    async fn put_with_progress(&self, object: PutObject, guard: &Arc<ProgressGuard>) -> BlobResult<PutResult> {
        if self.has_native_progress() {
            self.store.put(object, Some(guard.as_sink())).await
        } else {
            with_simulated_progress(&self.config.progress, guard, self.store.put(object, None)).await
        }
    }

    async fn store_file(&self, file: &UploadFile, guard: &Arc<ProgressGuard>) -> BlobResult<MediaItem> {
        self.validate(file)?;

        let key = self.keys.object_key(&file.name, file.extension(), Utc::now());
        debug!("generated object key {} for {}", key, file.name);

        let content_type = (!file.mime_type.is_empty()).then(|| file.mime_type.clone());
        let object = PutObject {
            key,
            bytes: file.bytes.clone(),
            content_type: content_type.clone(),
            filename: Some(file.name.clone()),
        };

        let result = self.put_with_progress(object, guard).await?;
        debug!("stored {} ({} bytes)", result.key, result.size_bytes);

        let url = match self.store.sign_get(&result.key, self.config.signed_url_ttl_secs).await {
            Ok(url) => url,
            Err(err) => {
                // no item without a URL; don't leave the object behind either
                if let Err(cleanup) = self.store.delete(&result.key).await {
                    warn!("could not roll back {}: {}", result.key, cleanup);
                }
                return Err(err);
            }
        };

        Ok(MediaItem::new(BlobId::from_string(result.key), url, result.created_at)
            .with_name(file.name.clone())
            .with_mime_type(content_type.unwrap_or_else(|| self.config.default_content_type.clone())))
    }

    /// `None` when the object vanished between listing and signing
    async fn resolve_entry(&self, entry: ObjectEntry) -> BlobResult<Option<MediaItem>> {
        let url = match self.store.sign_get(&entry.key, self.config.signed_url_ttl_secs).await {
            Ok(url) => url,
            Err(BlobError::NotFound { .. }) => {
                debug!("{} disappeared before it could be signed", entry.key);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let mime_type = entry
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| self.config.default_content_type.clone());

        Ok(Some(
            MediaItem::new(BlobId::from_string(entry.key), url, entry.created_at)
                .with_name(entry.name)
                .with_mime_type(mime_type),
        ))
    }
}

#[async_trait]
impl StorageGateway for BlobAdapter {
    #[instrument(skip(self, file, on_progress), fields(file = %file.name, size = file.size_bytes()))]
    async fn upload(&self, file: UploadFile, on_progress: ProgressFn) -> Result<MediaItem, UploadFailure> {
        let guard = ProgressGuard::new(on_progress);

        match self.store_file(&file, &guard).await {
            Ok(item) => {
                guard.complete();
                info!("Uploaded {} as {}", file.name, item.id);
                Ok(item)
            }
            Err(err) => {
                guard.fail();
                warn!("Upload of {} failed: {}", file.name, err);
                Err(UploadFailure::new(file.name, err))
            }
        }
    }

    #[instrument(skip(self))]
    async fn list(&self) -> BlobResult<Vec<MediaItem>> {
        self.ensure_signing()?;
        let entries = self.store.list().await?;
        debug!("store listed {} objects", entries.len());

        let resolved = try_join_all(entries.into_iter().map(|entry| self.resolve_entry(entry))).await?;
        let mut items: Vec<MediaItem> = resolved.into_iter().flatten().collect();
        // stable: equal timestamps keep the backend's order
        items.sort_by_key(|item| Reverse(item.created_at));
        Ok(items)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn remove(&self, id: &BlobId) -> BlobResult<()> {
        match self.store.delete(id.as_str()).await {
            Ok(()) => {
                info!("Removed {}", id);
                Ok(())
            }
            Err(BlobError::NotFound { .. }) => {
                debug!("{} already absent", id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
