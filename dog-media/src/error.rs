use dog_blob::BlobError;
use thiserror::Error;

/// Result type for media coordination
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors surfaced to the presentation layer. None of them are fatal; every
/// one can be retried by the user (reload again, pick files again).
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Storage unavailable: {0}")]
    Transport(#[from] BlobError),

    #[error("Media not found: {id}")]
    NotFound { id: String },

    #[error("No files selected")]
    EmptyInput,

    #[error("Upload of '{file_name}' failed: {reason}")]
    UploadFailure { file_name: String, reason: String },

    #[error("Unknown media event '{name}'")]
    UnknownEvent { name: String },
}

impl MediaError {
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn upload_failure<N: Into<String>, R: Into<String>>(file_name: N, reason: R) -> Self {
        Self::UploadFailure {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    /// Lookup misses are an expected answer, not a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
