use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dog_blob::{BlobId, MediaItem};
use parking_lot::RwLock;
use tracing::trace;

use crate::{MediaError, MediaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
    ListenerId(LISTENER_ID.fetch_add(1, Ordering::Relaxed))
}

/// Signal names shared by the gallery, uploader and viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEventKind {
    Uploaded,
    UploadFailed,
    Selected,
    SelectionCleared,
    Removed,
}

impl MediaEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            MediaEventKind::Uploaded => "mediaUploaded",
            MediaEventKind::UploadFailed => "mediaUploadFailed",
            MediaEventKind::Selected => "mediaSelected",
            MediaEventKind::SelectionCleared => "selectionCleared",
            MediaEventKind::Removed => "mediaRemoved",
        }
    }
}

/// Data delivered to event listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// A file finished uploading
    Uploaded(MediaItem),
    /// A file of a batch could not be uploaded
    UploadFailed { file_name: String, reason: String },
    /// The user picked an item to view full-screen
    Selected(MediaItem),
    /// The viewer closed
    SelectionCleared,
    /// An item was deleted from storage
    Removed(BlobId),
}

impl MediaEvent {
    pub fn kind(&self) -> MediaEventKind {
        match self {
            MediaEvent::Uploaded(_) => MediaEventKind::Uploaded,
            MediaEvent::UploadFailed { .. } => MediaEventKind::UploadFailed,
            MediaEvent::Selected(_) => MediaEventKind::Selected,
            MediaEvent::SelectionCleared => MediaEventKind::SelectionCleared,
            MediaEvent::Removed(_) => MediaEventKind::Removed,
        }
    }
}

/// Listener signature. Listeners are synchronous; anything asynchronous they
/// need to do must be spawned or signalled, never awaited by `publish`.
pub type EventListener = Arc<dyn Fn(&MediaEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventPat {
    Any,
    Exact(MediaEventKind),
}

impl EventPat {
    pub fn matches(&self, kind: MediaEventKind) -> bool {
        match self {
            EventPat::Any => true,
            EventPat::Exact(k) => *k == kind,
        }
    }
}

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    pattern: EventPat,
    listener: EventListener,
    once: bool,
}

/// Listener registry behind [`EventBus`].
///
/// Emission takes the matching listeners out in one pass (dropping `once`
/// entries at the same time), so the caller can release its lock before any
/// listener runs. Listeners are free to publish or subscribe from inside a
/// callback.
#[derive(Default)]
pub struct MediaEventHub {
    listeners: Vec<ListenerEntry>,
}

impl MediaEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pattern(&mut self, pattern: EventPat, listener: EventListener) -> ListenerId {
        self.push(pattern, listener, false)
    }

    pub fn once_pattern(&mut self, pattern: EventPat, listener: EventListener) -> ListenerId {
        self.push(pattern, listener, true)
    }

    fn push(&mut self, pattern: EventPat, listener: EventListener, once: bool) -> ListenerId {
        let id = next_listener_id();
        self.listeners.push(ListenerEntry {
            id,
            pattern,
            listener,
            once,
        });
        id
    }

    /// removeListener/off
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|e| e.id != id);
        before != self.listeners.len()
    }

    /// removeAllListeners (optionally scoped)
    pub fn remove_all(&mut self, pattern: Option<&EventPat>) -> usize {
        let before = self.listeners.len();
        if let Some(p) = pattern {
            self.listeners.retain(|e| &e.pattern != p);
        } else {
            self.listeners.clear();
        }
        before - self.listeners.len()
    }

    /// Matching listeners in subscription order. `once` entries are removed
    /// here so a nested publish can never fire them twice.
    pub fn take_matching(&mut self, kind: MediaEventKind) -> Vec<EventListener> {
        let to_call: Vec<EventListener> = self
            .listeners
            .iter()
            .filter(|e| e.pattern.matches(kind))
            .map(|e| e.listener.clone())
            .collect();

        self.listeners.retain(|e| !(e.once && e.pattern.matches(kind)));
        to_call
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Cloneable handle to a shared [`MediaEventHub`]. This is the only thing the
/// gallery, uploader and viewer share.
#[derive(Clone, Default)]
pub struct EventBus {
    hub: Arc<RwLock<MediaEventHub>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one signal
    pub fn on<F>(&self, kind: MediaEventKind, listener: F) -> ListenerId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.hub.write().on_pattern(EventPat::Exact(kind), Arc::new(listener))
    }

    /// Subscribe to every signal
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.hub.write().on_pattern(EventPat::Any, Arc::new(listener))
    }

    /// Subscribe for the next matching signal only
    pub fn once<F>(&self, kind: MediaEventKind, listener: F) -> ListenerId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.hub.write().once_pattern(EventPat::Exact(kind), Arc::new(listener))
    }

    /// Sugar: `bus.on_str("media.uploaded", ...)`
    pub fn on_str<F>(&self, pattern: &str, listener: F) -> MediaResult<ListenerId>
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        let pattern = parse_event_pattern(pattern)?;
        Ok(self.hub.write().on_pattern(pattern, Arc::new(listener)))
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.hub.write().off(id)
    }

    pub fn remove_all(&self, pattern: Option<&EventPat>) -> usize {
        self.hub.write().remove_all(pattern)
    }

    pub fn listener_count(&self) -> usize {
        self.hub.read().len()
    }

    /// Deliver `event` to every matching listener, in subscription order, and
    /// return how many were called. No lock is held while listeners run.
    pub fn publish(&self, event: MediaEvent) -> usize {
        let kind = event.kind();
        let listeners = self.hub.write().take_matching(kind);
        trace!("publishing {} to {} listeners", kind.name(), listeners.len());

        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }
}

/// Unsubscribes its listeners when dropped
pub struct Subscription {
    bus: EventBus,
    ids: Vec<ListenerId>,
}

impl Subscription {
    pub fn new(bus: &EventBus, ids: Vec<ListenerId>) -> Self {
        Self {
            bus: bus.clone(),
            ids,
        }
    }

    pub fn ids(&self) -> &[ListenerId] {
        &self.ids
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.bus.off(id);
        }
    }
}

/// Parse "mediaUploaded", "media.uploaded", "uploaded", ... (case-insensitive)
pub fn parse_event_kind(s: &str) -> MediaResult<MediaEventKind> {
    let norm = s.trim().to_lowercase().replace(['.', '-', '_'], "");
    let norm = norm.strip_prefix("media").unwrap_or(&norm);
    match norm {
        "uploaded" => Ok(MediaEventKind::Uploaded),
        "uploadfailed" => Ok(MediaEventKind::UploadFailed),
        "selected" => Ok(MediaEventKind::Selected),
        "selectioncleared" | "cleared" => Ok(MediaEventKind::SelectionCleared),
        "removed" => Ok(MediaEventKind::Removed),
        _ => Err(MediaError::UnknownEvent { name: s.to_string() }),
    }
}

/// Like [`parse_event_kind`], plus `*` / `media.*` for every signal
pub fn parse_event_pattern(input: &str) -> MediaResult<EventPat> {
    match input.trim() {
        "*" | "media.*" => Ok(EventPat::Any),
        other => parse_event_kind(other).map(EventPat::Exact),
    }
}
