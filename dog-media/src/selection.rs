use std::sync::{Arc, Weak};

use dog_blob::MediaItem;
use parking_lot::RwLock;
use tracing::debug;

use crate::events::{EventBus, MediaEvent, MediaEventKind, Subscription};

/// Which item, if any, the viewer is showing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    Open(MediaItem),
}

impl Selection {
    pub fn item(&self) -> Option<&MediaItem> {
        match self {
            Selection::Idle => None,
            Selection::Open(item) => Some(item),
        }
    }
}

/// User actions that dismiss the viewer. All of them close it the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseTrigger {
    CloseButton,
    Backdrop,
    Escape,
}

/// Full-screen viewer state: `Idle -> Open(item) -> Idle`
pub struct SelectionController {
    state: RwLock<Selection>,
    bus: EventBus,
}

impl SelectionController {
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: RwLock::new(Selection::Idle),
            bus,
        }
    }

    /// Open `item`, replacing whatever was open
    pub fn select(&self, item: MediaItem) {
        debug!("viewer opened {}", item.id);
        *self.state.write() = Selection::Open(item);
    }

    /// Close the viewer. Returns false (and publishes nothing) when it was
    /// already idle.
    pub fn clear(&self) -> bool {
        let previous = std::mem::take(&mut *self.state.write());
        match previous {
            Selection::Idle => false,
            Selection::Open(item) => {
                debug!("viewer closed {}", item.id);
                self.bus.publish(MediaEvent::SelectionCleared);
                true
            }
        }
    }

    pub fn close(&self, trigger: CloseTrigger) -> bool {
        debug!("close requested via {:?}", trigger);
        self.clear()
    }

    /// Keyboard hook; only Escape does anything, and only while open
    pub fn handle_key(&self, key: &str) -> bool {
        key == "Escape" && self.close(CloseTrigger::Escape)
    }

    pub fn current(&self) -> Selection {
        self.state.read().clone()
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.read(), Selection::Open(_))
    }

    /// Follow `mediaSelected`, and close if the open item is removed
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Subscription {
        let weak: Weak<Self> = Arc::downgrade(self);
        let on_selected = bus.on(MediaEventKind::Selected, move |event| {
            if let (Some(controller), MediaEvent::Selected(item)) = (weak.upgrade(), event) {
                controller.select(item.clone());
            }
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_removed = bus.on(MediaEventKind::Removed, move |event| {
            if let (Some(controller), MediaEvent::Removed(id)) = (weak.upgrade(), event) {
                let showing_removed = controller.current().item().is_some_and(|item| &item.id == id);
                if showing_removed {
                    controller.clear();
                }
            }
        });

        Subscription::new(bus, vec![on_selected, on_removed])
    }
}
