use super::{check_removable, Cylinder, CylinderId, Destination, QueryFlags, SlotIndex};
use crate::entities::item::MAX_STACK_COUNT;
use crate::world::arena::ItemHandle;
use crate::world::return_value::ReturnValue;
use crate::world::state::WorldState;

/// A container item (backpack, bag, depot locker) seen as a cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerCylinder(pub ItemHandle);

impl ContainerCylinder {
    fn contents<'w>(&self, world: &'w WorldState) -> &'w [ItemHandle] {
        world
            .items
            .get(self.0)
            .map_or(&[], |container| container.contents.as_slice())
    }

    /// Free slots. The slot `item` occupies here only counts as free when
    /// all `count` units leave it; a split keeps the original in place.
    fn free_slots(&self, world: &WorldState, item: ItemHandle, count: u16) -> usize {
        let Some(container) = world.items.get(self.0) else {
            return 0;
        };
        let vacated = self.vacates(world, item, count);
        let used = container
            .contents
            .iter()
            .filter(|entry| !vacated || **entry != item)
            .count();
        container.capacity().saturating_sub(used)
    }

    fn holds(&self, world: &WorldState, item: ItemHandle) -> bool {
        self.contents(world).contains(&item)
    }

    /// Whether moving `count` units of `item` empties the slot it holds here.
    fn vacates(&self, world: &WorldState, item: ItemHandle, count: u16) -> bool {
        self.holds(world, item)
            && world
                .items
                .get(item)
                .is_some_and(|entry| !entry.is_stackable() || count >= entry.count)
    }

    fn query_depot_limit(&self, world: &WorldState, item: ItemHandle, count: u16) -> ReturnValue {
        let Some(entry) = world.items.get(item) else {
            return ReturnValue::NotPossible;
        };
        let mut added = 0;
        if entry.is_stackable() && entry.count != count {
            added = 1;
        }
        if world.item_root(item) != Some(CylinderId::Container(self.0)) {
            added = world.items.tree_size(item);
        }
        let held = world.items.tree_size(self.0).saturating_sub(1);
        if held + added > world.limits.depot_item_limit {
            return ReturnValue::DepotIsFull;
        }
        ReturnValue::NoError
    }

    /// Room left in stacks here that `item` could merge into.
    fn stack_room(&self, world: &WorldState, item: ItemHandle, only: Option<usize>) -> u16 {
        let Some(entry) = world.items.get(item) else {
            return 0;
        };
        self.contents(world)
            .iter()
            .enumerate()
            .filter(|(index, _)| only.map_or(true, |only| only == *index))
            .filter(|(_, other)| **other != item)
            .filter_map(|(_, other)| world.items.get(*other))
            .filter(|other| other.can_stack_with(entry) && other.has_stack_room())
            .fold(0u16, |room, other| {
                room.saturating_add(MAX_STACK_COUNT - other.count)
            })
    }
}

impl Cylinder for ContainerCylinder {
    fn id(&self) -> CylinderId {
        CylinderId::Container(self.0)
    }

    fn query_add(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        let Some(container) = world.items.get(self.0) else {
            return ReturnValue::NotPossible;
        };
        let Some(entry) = world.items.get(item) else {
            return ReturnValue::NotPossible;
        };
        if container.item_type.is_depot() && !flags.no_limit {
            let ret = self.query_depot_limit(world, item, count);
            if !ret.is_ok() {
                return ret;
            }
        }
        if flags.child_is_owner {
            return ReturnValue::NoError;
        }
        if !entry.is_pickupable() {
            return ReturnValue::CannotPickup;
        }
        if item == self.0 {
            return ReturnValue::ThisIsImpossible;
        }
        let ancestors = world
            .items
            .ancestors(self.id(), world.limits.max_container_depth);
        if ancestors.contains(&CylinderId::Container(item)) {
            return ReturnValue::ThisIsImpossible;
        }
        if !flags.no_limit
            && index == SlotIndex::Wherever
            && !self.vacates(world, item, count)
            && container.contents.len() >= container.capacity()
        {
            return ReturnValue::ContainerNotEnoughRoom;
        }
        let root = world.owner_root(self.id());
        if root != self.id() {
            return root.query_add(
                world,
                SlotIndex::Wherever,
                item,
                count,
                flags.with_child_is_owner(),
            );
        }
        ReturnValue::NoError
    }

    fn query_max_count(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> (ReturnValue, u16) {
        if flags.no_limit {
            return (ReturnValue::NoError, count.max(1));
        }
        let Some(entry) = world.items.get(item) else {
            return (ReturnValue::NotPossible, 0);
        };
        let free_slots = self.free_slots(world, item, count);
        if !entry.is_stackable() {
            let max = u16::from(free_slots > 0);
            if max == 0 {
                return (ReturnValue::ContainerNotEnoughRoom, 0);
            }
            return (ReturnValue::NoError, max);
        }
        let only = match index {
            SlotIndex::Wherever => None,
            SlotIndex::At(index) => Some(index),
        };
        let slots_room = u16::try_from(free_slots)
            .unwrap_or(u16::MAX)
            .saturating_mul(MAX_STACK_COUNT);
        let max = slots_room.saturating_add(self.stack_room(world, item, only));
        if max < count {
            return (ReturnValue::ContainerNotEnoughRoom, max);
        }
        (ReturnValue::NoError, max)
    }

    fn query_remove(
        &self,
        world: &WorldState,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        if !self.holds(world, item) {
            return ReturnValue::NotPossible;
        }
        check_removable(world, item, count, flags)
    }

    fn query_destination(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        flags: QueryFlags,
    ) -> Destination {
        let capacity = world.items.get(self.0).map_or(0, |c| c.capacity());
        let mut index = match index {
            SlotIndex::At(slot) if slot >= capacity => SlotIndex::Wherever,
            other => other,
        };
        let mut target = None;
        if let SlotIndex::At(slot) = index {
            target = self.item_at(world, slot);
            if let Some(found) = target {
                if found != item && world.items.get(found).is_some_and(|e| e.is_container()) {
                    return Destination::new(CylinderId::Container(found), SlotIndex::Wherever, flags);
                }
            }
        }

        let Some(entry) = world.items.get(item) else {
            return Destination::new(self.id(), index, flags);
        };
        let auto_stack = !flags.ignore_auto_stack
            && entry.is_stackable()
            && entry.parent != Some(self.id());
        if auto_stack {
            let stacks_with = |candidate: ItemHandle| {
                candidate != item
                    && world
                        .items
                        .get(candidate)
                        .is_some_and(|other| other.can_stack_with(entry) && other.has_stack_room())
            };
            if target.is_some_and(|found| stacks_with(found)) {
                return Destination {
                    cylinder: self.id(),
                    index,
                    item: target,
                    flags,
                };
            }
            if let Some(slot) = self.contents(world).iter().position(|c| stacks_with(*c)) {
                index = SlotIndex::At(slot);
                target = self.item_at(world, slot);
            }
        }
        Destination {
            cylinder: self.id(),
            index,
            item: target,
            flags,
        }
    }

    fn thing_index(&self, world: &WorldState, item: ItemHandle) -> Option<usize> {
        self.contents(world).iter().position(|entry| *entry == item)
    }

    fn item_at(&self, world: &WorldState, index: usize) -> Option<ItemHandle> {
        self.contents(world).get(index).copied()
    }

    fn attach(&self, world: &mut WorldState, _index: SlotIndex, item: ItemHandle) {
        world.expect_item_mut(self.0).contents.insert(0, item);
    }

    fn detach(&self, world: &mut WorldState, item: ItemHandle) {
        let container = world.expect_item_mut(self.0);
        let Some(index) = container.contents.iter().position(|entry| *entry == item) else {
            panic!("item {:?} is not inside container {:?}", item, self.0);
        };
        container.contents.remove(index);
    }

    fn replace_thing(&self, world: &mut WorldState, index: usize, item: ItemHandle) -> ItemHandle {
        let container = world.expect_item_mut(self.0);
        let Some(slot) = container.contents.get_mut(index) else {
            panic!("no item at index {} in container {:?}", index, self.0);
        };
        let old = std::mem::replace(slot, item);
        world.expect_item_mut(item).parent = Some(self.id());
        world.expect_item_mut(old).parent = None;
        old
    }
}
