use std::time::Duration;

/// Default validity window of signed retrieval URLs (7 days)
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 60 * 60 * 24 * 7;

/// Content type assumed when the backend has no stored metadata
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Shortest tick the progress ticker accepts; tokio intervals cannot be zero
pub const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the storage gateway
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// TTL used for every signed URL, both on listing and after upload
    pub signed_url_ttl_secs: u64,

    /// Content type for objects stored without one
    pub default_content_type: String,

    /// Absolute max size allowed for a single upload (safety guard)
    pub max_blob_bytes: u64,

    /// How progress is synthesized for stores without native reporting
    pub progress: ProgressRules,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            max_blob_bytes: 5 * 1024 * 1024 * 1024, // 5GB
            progress: ProgressRules::default(),
        }
    }
}

/// Rules for simulated upload progress
#[derive(Debug, Clone)]
pub struct ProgressRules {
    /// Percentage added on every tick
    pub step: u8,

    /// Time between ticks
    pub interval: Duration,

    /// Highest value reported before the upload actually settles
    pub ceiling: u8,
}

impl Default for ProgressRules {
    fn default() -> Self {
        Self {
            step: 10,
            interval: Duration::from_millis(200),
            ceiling: 90,
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set signed URL lifetime
    pub fn with_signed_url_ttl(mut self, secs: u64) -> Self {
        self.signed_url_ttl_secs = secs;
        self
    }

    /// Set fallback content type
    pub fn with_default_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    /// Set max blob size
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    /// Set progress rules
    pub fn with_progress_rules(mut self, rules: ProgressRules) -> Self {
        self.progress = rules;
        self
    }
}

impl ProgressRules {
    /// Create new progress rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Set step size; zero is bumped to one so progress always advances
    pub fn with_step(mut self, step: u8) -> Self {
        self.step = step.max(1);
        self
    }

    /// Set tick interval, at least [`MIN_PROGRESS_INTERVAL`]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_PROGRESS_INTERVAL);
        self
    }

    /// Set the pre-completion ceiling (kept below 100)
    pub fn with_ceiling(mut self, ceiling: u8) -> Self {
        self.ceiling = ceiling.min(99);
        self
    }
}
