use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur while talking to a storage backend
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {id}")]
    NotFound { id: String },

    #[error("Object already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Store cannot issue signed URLs")]
    Unsupported,

    #[error("Storage backend unreachable: {message}")]
    Transport { message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a key collision error
    pub fn already_exists<S: Into<String>>(key: S) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create a transport error (network/auth failure reaching the backend)
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// True for failures reaching the backend at all, as opposed to a
    /// well-formed rejection from it.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Backend { .. })
    }
}

/// A failed single-file upload. Carries the original file name so callers can
/// report which file of a batch went wrong.
#[derive(Error, Debug)]
#[error("Upload of '{file_name}' failed: {reason}")]
pub struct UploadFailure {
    pub file_name: String,
    #[source]
    pub reason: BlobError,
}

impl UploadFailure {
    pub fn new<S: Into<String>>(file_name: S, reason: BlobError) -> Self {
        Self {
            file_name: file_name.into(),
            reason,
        }
    }
}
