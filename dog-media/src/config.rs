use std::time::Duration;

use crate::SortOrder;

/// How long an error notice stays visible
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

/// Configuration for the media widgets
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Lifetime of auto-dismissing error notices
    pub notice_ttl: Duration,

    /// Ordering the gallery starts with
    pub default_sort: SortOrder,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            notice_ttl: DEFAULT_NOTICE_TTL,
            default_sort: SortOrder::ByRecency,
        }
    }
}

impl MediaConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set notice lifetime
    pub fn with_notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }

    /// Set the gallery's initial ordering
    pub fn with_default_sort(mut self, sort: SortOrder) -> Self {
        self.default_sort = sort;
        self
    }
}
