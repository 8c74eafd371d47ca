use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{BlobResult, ObjectEntry, ProgressFn, PutObject};

/// Core object-store operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every object currently stored
    async fn list(&self) -> BlobResult<Vec<ObjectEntry>>;

    /// Create a new object. Must fail with `AlreadyExists` instead of
    /// overwriting. `progress` is only driven when the store advertises
    /// `native_progress`.
    async fn put(&self, object: PutObject, progress: Option<ProgressFn>) -> BlobResult<PutResult>;

    /// Issue a time-limited retrieval URL
    async fn sign_get(&self, key: &str, expires_in_secs: u64) -> BlobResult<String>;

    /// Delete an object
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Get store capabilities
    fn capabilities(&self) -> StoreCapabilities;
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub key: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Store capabilities
#[derive(Debug, Clone, Default)]
pub struct StoreCapabilities {
    /// The store reports real upload progress through the put sink
    pub native_progress: bool,
    pub supports_signed_urls: bool,
}

impl StoreCapabilities {
    pub fn basic() -> Self {
        Self {
            native_progress: false,
            supports_signed_urls: false,
        }
    }

    pub fn with_native_progress(mut self) -> Self {
        self.native_progress = true;
        self
    }

    pub fn with_signed_urls(mut self) -> Self {
        self.supports_signed_urls = true;
        self
    }
}

/// Strategy for generating object keys
pub trait BlobKeyStrategy: Send + Sync {
    /// Generate a key for a newly uploaded file
    fn object_key(&self, file_name: &str, extension: Option<&str>, now: DateTime<Utc>) -> String;
}

/// Default key strategy: `{random token}_{unix millis}.{original extension}`.
///
/// Two uploads of files with the same name never share a key.
#[derive(Debug, Clone)]
pub struct DefaultKeyStrategy;

impl BlobKeyStrategy for DefaultKeyStrategy {
    fn object_key(&self, _file_name: &str, extension: Option<&str>, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let millis = now.timestamp_millis();

        match extension.filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric())) {
            Some(ext) => format!("{}_{}.{}", token, millis, ext),
            None => format!("{}_{}", token, millis),
        }
    }
}
