use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BlobId;

/// How a media item should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Prefix-based classification. Anything that is not `video/*` renders as
    /// an image.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// A stored image or video as seen by the front end.
///
/// Items are immutable: a refreshed listing produces new items rather than
/// updating old ones. `url` is a signed URL with a bounded validity window and
/// must never be used as an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: BlobId,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub mime_type: String,
}

impl MediaItem {
    pub fn new<S: Into<String>>(id: BlobId, url: S, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            url: url.into(),
            created_at,
            name: String::new(),
            mime_type: String::new(),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    pub fn is_video(&self) -> bool {
        self.kind() == MediaKind::Video
    }
}
