use crate::dispatch::task::TaskId;
use crate::entities::identity::CreatureId;
use crate::world::arena::ItemHandle;
use crate::world::cylinder::CylinderId;
use crate::world::item_types::ItemType;
use std::sync::Arc;

/// Largest count a single stackable instance may hold.
pub const MAX_STACK_COUNT: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemTypeId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecayState {
    #[default]
    None,
    Pending,
    Stopped,
}

/// Per-instance state. Everything else about an item comes from its type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemAttributes {
    pub action_id: u16,
    pub unique_id: u16,
    pub text: Option<String>,
    pub owner: Option<CreatureId>,
    pub charges: u16,
    pub decay: DecayState,
    pub decay_task: Option<TaskId>,
}

impl ItemAttributes {
    /// Attributes that decide whether two stacks may merge. Decay bookkeeping
    /// is per instance and never blocks a merge.
    fn stack_key(&self) -> (u16, u16, Option<&str>, Option<CreatureId>, u16) {
        (
            self.action_id,
            self.unique_id,
            self.text.as_deref(),
            self.owner,
            self.charges,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub item_type: Arc<ItemType>,
    pub count: u16,
    pub attributes: ItemAttributes,
    /// Non-owning back-reference to the cylinder holding this item.
    pub parent: Option<CylinderId>,
    /// Children of a container, front first.
    pub contents: Vec<ItemHandle>,
}

impl Item {
    pub fn new(item_type: Arc<ItemType>, count: u16) -> Self {
        let count = if item_type.stackable {
            count.clamp(1, MAX_STACK_COUNT)
        } else {
            1
        };
        Self {
            item_type,
            count,
            attributes: ItemAttributes::default(),
            parent: None,
            contents: Vec::new(),
        }
    }

    pub fn type_id(&self) -> ItemTypeId {
        self.item_type.id
    }

    pub fn is_stackable(&self) -> bool {
        self.item_type.stackable
    }

    pub fn is_container(&self) -> bool {
        self.item_type.is_container()
    }

    pub fn is_moveable(&self) -> bool {
        self.item_type.moveable
    }

    pub fn is_pickupable(&self) -> bool {
        self.item_type.pickupable
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.item_type.container_capacity.unwrap_or(0))
    }

    /// Weight of `count` units of this item, without container contents.
    pub fn weight_for(&self, count: u16) -> u32 {
        if self.is_stackable() {
            self.item_type.weight.saturating_mul(u32::from(count.max(1)))
        } else {
            self.item_type.weight
        }
    }

    pub fn can_stack_with(&self, other: &Item) -> bool {
        self.is_stackable()
            && self.type_id() == other.type_id()
            && self.attributes.stack_key() == other.attributes.stack_key()
    }

    pub fn has_stack_room(&self) -> bool {
        self.is_stackable() && self.count < MAX_STACK_COUNT
    }

    /// Copy used for the moved part of a split stack. The unique id stays
    /// bound to the original instance.
    pub fn split_copy(&self, count: u16) -> Item {
        let mut attributes = self.attributes.clone();
        attributes.unique_id = 0;
        attributes.decay = DecayState::None;
        attributes.decay_task = None;
        let mut item = Item::new(Arc::clone(&self.item_type), count);
        item.attributes = attributes;
        item
    }

    pub fn set_text(&mut self, text: &str) {
        if text.is_empty() {
            self.attributes.text = None;
        } else {
            self.attributes.text = Some(text.to_string());
        }
    }

    pub fn text(&self) -> &str {
        self.attributes.text.as_deref().unwrap_or("")
    }
}
