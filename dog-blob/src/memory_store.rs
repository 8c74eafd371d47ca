use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    BlobError, BlobResult, BlobStore, ObjectEntry, ProgressFn, PutObject, PutResult,
    StoreCapabilities,
};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Bytes,
    content_type: Option<String>,
    filename: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing_names: RwLock<HashSet<String>>,
    offline: AtomicBool,
    signing_broken: AtomicBool,
    list_calls: AtomicU64,
    sign_calls: AtomicU64,
}

/// In-memory object store for development and tests.
///
/// Cloning is cheap and every clone sees the same objects, so a test can keep
/// a handle for failure injection while the gateway owns another.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Inner>,
    latency: Option<Duration>,
    native_progress: bool,
    unsigned: bool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every put by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report real progress (in quarters) from inside `put`
    pub fn with_native_progress(mut self) -> Self {
        self.native_progress = true;
        self
    }

    /// Advertise no signed-URL support
    pub fn without_signed_urls(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Make `sign_get` fail while puts and lists keep working
    pub fn set_signing_broken(&self, broken: bool) {
        self.inner.signing_broken.store(broken, Ordering::SeqCst);
    }

    /// Simulate the backend being unreachable
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Make every put of a file with this original name fail
    pub fn fail_uploads_named<S: Into<String>>(&self, name: S) {
        self.inner.failing_names.write().insert(name.into());
    }

    /// Seed an object directly, bypassing key generation
    pub fn insert_raw(
        &self,
        key: &str,
        filename: Option<&str>,
        content_type: Option<&str>,
        created_at: DateTime<Utc>,
    ) {
        self.inner.objects.write().insert(
            key.to_string(),
            StoredObject {
                bytes: Bytes::new(),
                content_type: content_type.map(str::to_string),
                filename: filename.map(str::to_string),
                created_at,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.objects.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_calls(&self) -> u64 {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> u64 {
        self.inner.sign_calls.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> BlobResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(BlobError::transport("memory store is offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self) -> BlobResult<Vec<ObjectEntry>> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        let objects = self.inner.objects.read();
        Ok(objects
            .iter()
            .map(|(key, object)| ObjectEntry {
                key: key.clone(),
                name: object.filename.clone().unwrap_or_else(|| key.clone()),
                created_at: object.created_at,
                content_type: object.content_type.clone(),
            })
            .collect())
    }

    async fn put(&self, object: PutObject, progress: Option<ProgressFn>) -> BlobResult<PutResult> {
        self.ensure_online()?;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let progress = progress.filter(|_| self.native_progress);
        if let Some(report) = &progress {
            report(25);
            report(50);
            report(75);
        }

        if let Some(name) = &object.filename {
            if self.inner.failing_names.read().contains(name) {
                return Err(BlobError::transport(format!("connection reset while sending {}", name)));
            }
        }

        let now = Utc::now();
        let size_bytes = object.bytes.len() as u64;
        {
            let mut objects = self.inner.objects.write();
            if objects.contains_key(&object.key) {
                return Err(BlobError::already_exists(object.key));
            }
            objects.insert(
                object.key.clone(),
                StoredObject {
                    bytes: object.bytes,
                    content_type: object.content_type,
                    filename: object.filename,
                    created_at: now,
                },
            );
        }

        if let Some(report) = &progress {
            report(100);
        }
        debug!("memory store accepted {} ({} bytes)", object.key, size_bytes);

        Ok(PutResult {
            key: object.key,
            size_bytes,
            created_at: now,
        })
    }

    async fn sign_get(&self, key: &str, expires_in_secs: u64) -> BlobResult<String> {
        self.inner.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        if self.inner.signing_broken.load(Ordering::SeqCst) {
            return Err(BlobError::transport(format!("signing service refused {}", key)));
        }

        if !self.contains(key) {
            return Err(BlobError::not_found(key));
        }
        let expires_at = Utc::now().timestamp() + expires_in_secs as i64;
        let nonce = self.inner.sign_calls.load(Ordering::SeqCst);
        Ok(format!("memory://{}?expires={}&sig={}", key, expires_at, nonce))
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.ensure_online()?;
        match self.inner.objects.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(BlobError::not_found(key)),
        }
    }

    fn capabilities(&self) -> StoreCapabilities {
        let mut caps = StoreCapabilities::basic();
        if !self.unsigned {
            caps = caps.with_signed_urls();
        }
        if self.native_progress {
            caps.with_native_progress()
        } else {
            caps
        }
    }
}
