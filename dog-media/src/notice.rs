use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// A user-visible error message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    posted_at: Instant,
}

impl Notice {
    pub fn posted_at(&self) -> Instant {
        self.posted_at
    }
}

/// Holds the latest error notice of one widget and hides it once `ttl` has
/// passed. A new notice replaces the old one.
#[derive(Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    current: Mutex<Option<Notice>>,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            current: Mutex::new(None),
        }
    }

    pub fn post<S: Into<String>>(&self, message: S) {
        *self.current.lock() = Some(Notice {
            message: message.into(),
            posted_at: Instant::now(),
        });
    }

    /// The notice to show right now, if any
    pub fn current(&self) -> Option<Notice> {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|n| n.posted_at.elapsed() >= self.ttl) {
            *current = None;
        }
        current.clone()
    }

    pub fn dismiss(&self) {
        self.current.lock().take();
    }
}
