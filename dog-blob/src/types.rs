use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a stored blob. Assigned by the backend at creation
/// time (it is the object key) and stable for the lifetime of the object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(pub String);

impl BlobId {
    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Progress sink. Receives whole percentages in `0..=100`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Progress sink that drops every update
pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// A file picked by the user, ready to be uploaded
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Bytes,
    pub name: String,
    pub mime_type: String,
}

impl UploadFile {
    pub fn new<N: Into<String>, B: Into<Bytes>>(name: N, bytes: B) -> Self {
        Self {
            bytes: bytes.into(),
            name: name.into(),
            mime_type: String::new(),
        }
    }

    pub fn with_mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Original extension of the file name, without the dot
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            None
        } else {
            Some(ext)
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Request handed to a [`crate::BlobStore`] to create a new object
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

/// One raw entry of a backend listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub content_type: Option<String>,
}
