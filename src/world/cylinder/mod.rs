//! The container protocol shared by everything that can hold items.
//!
//! Queries take the world by shared reference and never mutate it. The
//! mutating calls are only issued by the transaction engine after the
//! matching query succeeded, so a failure inside them is a broken invariant
//! and panics.

mod container;
mod inventory;
mod special;
mod tile;

pub use container::ContainerCylinder;
pub use inventory::InventoryCylinder;
pub use special::{MailboxCylinder, TrashCylinder};
pub use tile::TileCylinder;

use crate::entities::identity::CreatureId;
use crate::world::arena::ItemHandle;
use crate::world::item_types::ItemType;
use crate::world::notify::{Link, WorldEvent};
use crate::world::position::Position;
use crate::world::return_value::ReturnValue;
use crate::world::state::WorldState;
use std::sync::Arc;

/// Address of a cylinder. Cheap to copy; resolved against the world on use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CylinderId {
    Tile(Position),
    Container(ItemHandle),
    Inventory(CreatureId),
    Trash(ItemHandle),
    Mailbox(ItemHandle),
}

impl CylinderId {
    /// The item backing this cylinder, if it is an item.
    pub fn item_handle(self) -> Option<ItemHandle> {
        match self {
            CylinderId::Container(item) | CylinderId::Trash(item) | CylinderId::Mailbox(item) => {
                Some(item)
            }
            CylinderId::Tile(_) | CylinderId::Inventory(_) => None,
        }
    }
}

/// Anything that can be moved between cylinders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Thing {
    Item(ItemHandle),
    Creature(CreatureId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotIndex {
    /// Let the cylinder pick a place.
    Wherever,
    At(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFlags {
    pub no_limit: bool,
    pub ignore_block_item: bool,
    pub ignore_block_creature: bool,
    pub child_is_owner: bool,
    pub ignore_auto_stack: bool,
    pub ignore_not_moveable: bool,
}

impl QueryFlags {
    pub const NONE: Self = Self {
        no_limit: false,
        ignore_block_item: false,
        ignore_block_creature: false,
        child_is_owner: false,
        ignore_auto_stack: false,
        ignore_not_moveable: false,
    };

    /// Flags for placing a creature exactly where it was asked to go.
    pub const DIRECT: Self = Self {
        ignore_block_item: true,
        ..Self::NONE
    };

    pub const NO_LIMIT: Self = Self {
        no_limit: true,
        ..Self::NONE
    };

    pub fn with_child_is_owner(self) -> Self {
        Self {
            child_is_owner: true,
            ..self
        }
    }
}

/// Result of one `query_destination` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub cylinder: CylinderId,
    pub index: SlotIndex,
    /// Item already at the target index; a merge or exchange candidate.
    pub item: Option<ItemHandle>,
    pub flags: QueryFlags,
}

impl Destination {
    pub fn new(cylinder: CylinderId, index: SlotIndex, flags: QueryFlags) -> Self {
        Self {
            cylinder,
            index,
            item: None,
            flags,
        }
    }
}

pub trait Cylinder {
    fn id(&self) -> CylinderId;

    fn query_add(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue;

    /// Largest count of `item` this cylinder can take, with the code to
    /// report when that is less than `count`.
    fn query_max_count(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> (ReturnValue, u16);

    fn query_remove(
        &self,
        world: &WorldState,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue;

    fn query_destination(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        flags: QueryFlags,
    ) -> Destination;

    fn thing_index(&self, world: &WorldState, item: ItemHandle) -> Option<usize>;

    fn item_at(&self, world: &WorldState, index: usize) -> Option<ItemHandle>;

    /// Puts `item` into this cylinder's own storage.
    fn attach(&self, world: &mut WorldState, index: SlotIndex, item: ItemHandle);

    /// Takes `item` out of this cylinder's own storage.
    fn detach(&self, world: &mut WorldState, item: ItemHandle);

    /// Swaps the item at `index` for `item`, returning the old one.
    fn replace_thing(&self, world: &mut WorldState, index: usize, item: ItemHandle) -> ItemHandle;

    fn add_thing(&self, world: &mut WorldState, index: SlotIndex, item: ItemHandle) {
        self.attach(world, index, item);
        world.expect_item_mut(item).parent = Some(self.id());
    }

    /// Removes `count` units. A stackable item keeps its instance and loses
    /// count; otherwise the item is detached and left without a parent.
    fn remove_thing(&self, world: &mut WorldState, item: ItemHandle, count: u16) {
        let entry = world.expect_item_mut(item);
        if entry.is_stackable() && count < entry.count {
            entry.count -= count;
            world.notify(WorldEvent::ItemUpdated {
                cylinder: self.id(),
                item,
            });
            return;
        }
        self.detach(world, item);
        world.expect_item_mut(item).parent = None;
    }

    /// Changes kind and count in place.
    fn update_thing(
        &self,
        world: &mut WorldState,
        item: ItemHandle,
        item_type: Arc<ItemType>,
        count: u16,
    ) {
        let entry = world.expect_item_mut(item);
        entry.item_type = item_type;
        entry.count = count;
        world.notify(WorldEvent::ItemUpdated {
            cylinder: self.id(),
            item,
        });
    }

    fn post_add_notification(
        &self,
        world: &mut WorldState,
        item: ItemHandle,
        from: Option<CylinderId>,
    ) {
        let id = self.id();
        for (cylinder, link) in notification_chain(world, id) {
            world.notify(WorldEvent::ItemAdded {
                cylinder,
                item,
                from,
                link,
            });
        }
    }

    fn post_remove_notification(
        &self,
        world: &mut WorldState,
        item: ItemHandle,
        to: Option<CylinderId>,
    ) {
        let id = self.id();
        for (cylinder, link) in notification_chain(world, id) {
            world.notify(WorldEvent::ItemRemoved {
                cylinder,
                item,
                to,
                link,
            });
        }
    }
}

/// The changed cylinder followed by its ancestors, outermost last.
fn notification_chain(world: &WorldState, owner: CylinderId) -> Vec<(CylinderId, Link)> {
    let ancestors = world
        .items
        .ancestors(owner, world.limits.max_container_depth);
    let last = ancestors.len().saturating_sub(1);
    std::iter::once((owner, Link::Owner))
        .chain(ancestors.into_iter().enumerate().map(|(depth, cylinder)| {
            let link = if depth == last {
                Link::TopParent
            } else {
                Link::Parent
            };
            (cylinder, link)
        }))
        .collect()
}

macro_rules! dispatch {
    ($id:expr, $cylinder:ident => $body:expr) => {
        match $id {
            CylinderId::Tile(position) => {
                let $cylinder = TileCylinder(position);
                $body
            }
            CylinderId::Container(item) => {
                let $cylinder = ContainerCylinder(item);
                $body
            }
            CylinderId::Inventory(player) => {
                let $cylinder = InventoryCylinder(player);
                $body
            }
            CylinderId::Trash(item) => {
                let $cylinder = TrashCylinder(item);
                $body
            }
            CylinderId::Mailbox(item) => {
                let $cylinder = MailboxCylinder(item);
                $body
            }
        }
    };
}

impl Cylinder for CylinderId {
    fn id(&self) -> CylinderId {
        *self
    }

    fn query_add(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        dispatch!(*self, cylinder => cylinder.query_add(world, index, item, count, flags))
    }

    fn query_max_count(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> (ReturnValue, u16) {
        dispatch!(*self, cylinder => cylinder.query_max_count(world, index, item, count, flags))
    }

    fn query_remove(
        &self,
        world: &WorldState,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        dispatch!(*self, cylinder => cylinder.query_remove(world, item, count, flags))
    }

    fn query_destination(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        flags: QueryFlags,
    ) -> Destination {
        dispatch!(*self, cylinder => cylinder.query_destination(world, index, item, flags))
    }

    fn thing_index(&self, world: &WorldState, item: ItemHandle) -> Option<usize> {
        dispatch!(*self, cylinder => cylinder.thing_index(world, item))
    }

    fn item_at(&self, world: &WorldState, index: usize) -> Option<ItemHandle> {
        dispatch!(*self, cylinder => cylinder.item_at(world, index))
    }

    fn attach(&self, world: &mut WorldState, index: SlotIndex, item: ItemHandle) {
        dispatch!(*self, cylinder => cylinder.attach(world, index, item))
    }

    fn detach(&self, world: &mut WorldState, item: ItemHandle) {
        dispatch!(*self, cylinder => cylinder.detach(world, item))
    }

    fn replace_thing(&self, world: &mut WorldState, index: usize, item: ItemHandle) -> ItemHandle {
        dispatch!(*self, cylinder => cylinder.replace_thing(world, index, item))
    }

    fn add_thing(&self, world: &mut WorldState, index: SlotIndex, item: ItemHandle) {
        dispatch!(*self, cylinder => cylinder.add_thing(world, index, item))
    }

    fn remove_thing(&self, world: &mut WorldState, item: ItemHandle, count: u16) {
        dispatch!(*self, cylinder => cylinder.remove_thing(world, item, count))
    }

    fn update_thing(
        &self,
        world: &mut WorldState,
        item: ItemHandle,
        item_type: Arc<ItemType>,
        count: u16,
    ) {
        dispatch!(*self, cylinder => cylinder.update_thing(world, item, item_type, count))
    }

    fn post_add_notification(
        &self,
        world: &mut WorldState,
        item: ItemHandle,
        from: Option<CylinderId>,
    ) {
        dispatch!(*self, cylinder => cylinder.post_add_notification(world, item, from))
    }

    fn post_remove_notification(
        &self,
        world: &mut WorldState,
        item: ItemHandle,
        to: Option<CylinderId>,
    ) {
        dispatch!(*self, cylinder => cylinder.post_remove_notification(world, item, to))
    }
}

/// Count check shared by every `query_remove`.
pub(crate) fn check_removable(
    world: &WorldState,
    item: ItemHandle,
    count: u16,
    flags: QueryFlags,
) -> ReturnValue {
    let Some(entry) = world.items.get(item) else {
        return ReturnValue::NotPossible;
    };
    if count == 0 || (entry.is_stackable() && count > entry.count) {
        return ReturnValue::NotPossible;
    }
    if !entry.is_moveable() && !flags.ignore_not_moveable {
        return ReturnValue::NotMoveable;
    }
    ReturnValue::NoError
}

/// Units of `item` a single fresh slot can take.
pub(crate) fn units_per_slot(world: &WorldState, item: ItemHandle) -> u16 {
    match world.items.get(item) {
        Some(entry) if entry.is_stackable() => crate::entities::item::MAX_STACK_COUNT,
        _ => 1,
    }
}
