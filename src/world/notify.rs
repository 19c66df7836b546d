use crate::entities::identity::CreatureId;
use crate::world::arena::ItemHandle;
use crate::world::cylinder::CylinderId;
use crate::world::position::Position;
use std::sync::{Arc, Mutex};

/// How the notified cylinder relates to the cylinder that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The cylinder that changed.
    Owner,
    /// An intermediate ancestor.
    Parent,
    /// The outermost ancestor (a tile or an inventory).
    TopParent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    ItemAdded {
        cylinder: CylinderId,
        item: ItemHandle,
        from: Option<CylinderId>,
        link: Link,
    },
    ItemRemoved {
        cylinder: CylinderId,
        item: ItemHandle,
        to: Option<CylinderId>,
        link: Link,
    },
    ItemUpdated {
        cylinder: CylinderId,
        item: ItemHandle,
    },
    /// The item left the world for good. Sent exactly once per instance.
    ItemReleased {
        item: ItemHandle,
    },
    CreatureAppeared {
        id: CreatureId,
        position: Position,
    },
    CreatureDisappeared {
        id: CreatureId,
        position: Position,
    },
    CreatureMoved {
        id: CreatureId,
        from: Position,
        to: Position,
    },
    MailDelivered {
        item: ItemHandle,
        recipient: CreatureId,
    },
}

/// Receiver of post-change notifications (script hooks, client updates).
/// Called on the dispatcher thread only, and may not fail.
pub trait NotificationSink: Send {
    fn notify(&mut self, event: &WorldEvent);
}

#[derive(Debug, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&mut self, _event: &WorldEvent) {}
}

/// Keeps every event in a shared buffer so another owner of the buffer can
/// inspect them.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<WorldEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorldEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn take(&self) -> Vec<WorldEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&mut self, event: &WorldEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
