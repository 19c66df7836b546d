use super::{
    check_removable, units_per_slot, ContainerCylinder, Cylinder, CylinderId, Destination,
    QueryFlags, SlotIndex,
};
use crate::entities::identity::CreatureId;
use crate::entities::inventory::{InventorySlot, INVENTORY_SLOTS};
use crate::entities::item::MAX_STACK_COUNT;
use crate::entities::player::Player;
use crate::world::arena::ItemHandle;
use crate::world::return_value::ReturnValue;
use crate::world::state::WorldState;
use std::collections::VecDeque;

/// A player's equipment slots seen as a cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryCylinder(pub CreatureId);

impl InventoryCylinder {
    fn player<'w>(&self, world: &'w WorldState) -> Option<&'w Player> {
        world.registry.player(self.0)
    }

    pub fn free_capacity(&self, world: &WorldState) -> u32 {
        self.player(world).map_or(0, |player| {
            player
                .capacity
                .saturating_sub(world.carried_weight(self.0))
        })
    }

    /// Items the player already carries never count against capacity.
    /// `freed` is weight about to leave the player.
    fn has_capacity(&self, world: &WorldState, item: ItemHandle, count: u16, freed: u32) -> bool {
        if world.item_root(item) == Some(self.id()) {
            return true;
        }
        let Some(entry) = world.items.get(item) else {
            return false;
        };
        let weight = if entry.is_stackable() {
            entry.weight_for(count)
        } else {
            world.items.total_weight(item)
        };
        let capacity = self.player(world).map_or(0, |player| player.capacity);
        let carried = world.carried_weight(self.0).saturating_sub(freed);
        weight <= capacity.saturating_sub(carried)
    }

    /// `query_add` for a slot whose occupant `blocker` is about to be
    /// swapped out to wherever `item` comes from.
    pub(crate) fn query_add_replacing(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        blocker: ItemHandle,
    ) -> ReturnValue {
        let Some(entry) = world.items.get(item) else {
            return ReturnValue::NotPossible;
        };
        let SlotIndex::At(index) = index else {
            return ReturnValue::NotPossible;
        };
        let Some(slot) = InventorySlot::from_index(index) else {
            return ReturnValue::NotPossible;
        };
        if self.item_at(world, index) != Some(blocker) {
            return ReturnValue::NotPossible;
        }
        if !entry.is_pickupable() {
            return ReturnValue::CannotPickup;
        }
        if !entry.item_type.fits_slot(slot) {
            return ReturnValue::CannotBeDressed;
        }
        // A carried item keeps the blocker on the player; anything else
        // takes the blocker's weight away with it.
        let freed = world.items.total_weight(blocker);
        if !self.has_capacity(world, item, count, freed) {
            return ReturnValue::NotEnoughCapacity;
        }
        ReturnValue::NoError
    }

    /// Looks for a stack to merge into or a free spot, first in the slots and
    /// then breadth-first through carried containers.
    fn search_destination(
        &self,
        world: &WorldState,
        player: &Player,
        item: ItemHandle,
        flags: QueryFlags,
    ) -> Destination {
        let Some(entry) = world.items.get(item) else {
            return Destination::new(self.id(), SlotIndex::Wherever, flags);
        };
        let auto_stack = !flags.ignore_auto_stack && entry.is_stackable();
        let mut containers = VecDeque::new();

        for slot in INVENTORY_SLOTS {
            let index = SlotIndex::At(slot.index());
            match player.inventory.slot(slot) {
                Some(occupant) if occupant == item => {}
                Some(occupant) => {
                    let Some(other) = world.items.get(occupant) else {
                        continue;
                    };
                    if auto_stack
                        && other.can_stack_with(entry)
                        && other.has_stack_room()
                        && self
                            .query_add(world, index, item, entry.count, QueryFlags::NONE)
                            .is_ok()
                    {
                        return Destination {
                            cylinder: self.id(),
                            index,
                            item: Some(occupant),
                            flags,
                        };
                    }
                    if other.is_container() {
                        containers.push_back((occupant, 1));
                    }
                }
                None => {
                    if self.query_add(world, index, item, entry.count, flags).is_ok() {
                        return Destination::new(self.id(), index, flags);
                    }
                }
            }
        }

        while let Some((container, depth)) = containers.pop_front() {
            let Some(holder) = world.items.get(container) else {
                continue;
            };
            let cylinder = ContainerCylinder(container);
            for (position, child) in holder.contents.iter().enumerate() {
                if *child == item {
                    continue;
                }
                let Some(other) = world.items.get(*child) else {
                    continue;
                };
                if auto_stack && other.can_stack_with(entry) && other.has_stack_room() {
                    return Destination {
                        cylinder: cylinder.id(),
                        index: SlotIndex::At(position),
                        item: Some(*child),
                        flags,
                    };
                }
                if other.is_container() && depth < world.limits.max_container_depth {
                    containers.push_back((*child, depth + 1));
                }
            }
            if holder.contents.len() < holder.capacity()
                && cylinder
                    .query_add(world, SlotIndex::Wherever, item, entry.count, flags)
                    .is_ok()
            {
                return Destination::new(cylinder.id(), SlotIndex::Wherever, flags);
            }
        }
        Destination::new(self.id(), SlotIndex::Wherever, flags)
    }

    /// Units of `item` the carried containers could still take.
    fn container_room(&self, world: &WorldState, root: ItemHandle, item: ItemHandle, flags: QueryFlags) -> u32 {
        let count = world.items.count(item);
        let mut room = 0u32;
        let mut pending = VecDeque::from([(root, 1usize)]);
        while let Some((container, depth)) = pending.pop_front() {
            if container == item {
                continue;
            }
            let (_, max) = ContainerCylinder(container).query_max_count(
                world,
                SlotIndex::Wherever,
                item,
                count,
                flags,
            );
            room += u32::from(max);
            let Some(holder) = world.items.get(container) else {
                continue;
            };
            for child in &holder.contents {
                let nested = world.items.get(*child).is_some_and(|c| c.is_container());
                if nested && depth < world.limits.max_container_depth {
                    pending.push_back((*child, depth + 1));
                }
            }
        }
        room
    }
}

impl Cylinder for InventoryCylinder {
    fn id(&self) -> CylinderId {
        CylinderId::Inventory(self.0)
    }

    fn query_add(
        &self,
        world: &WorldState,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        let Some(player) = self.player(world) else {
            return ReturnValue::NotPossible;
        };
        let Some(entry) = world.items.get(item) else {
            return ReturnValue::NotPossible;
        };
        if flags.child_is_owner {
            if flags.no_limit || self.has_capacity(world, item, count, 0) {
                return ReturnValue::NoError;
            }
            return ReturnValue::NotEnoughCapacity;
        }
        if !entry.is_pickupable() {
            return ReturnValue::CannotPickup;
        }
        let slot = match index {
            SlotIndex::Wherever => {
                if !self.has_capacity(world, item, count, 0) {
                    return ReturnValue::NotEnoughCapacity;
                }
                return ReturnValue::NotEnoughRoom;
            }
            SlotIndex::At(index) => match InventorySlot::from_index(index) {
                Some(slot) => slot,
                None => return ReturnValue::NotPossible,
            },
        };
        if !entry.item_type.fits_slot(slot) {
            return ReturnValue::CannotBeDressed;
        }
        if let Some(occupant) = player.inventory.slot(slot) {
            let merges = occupant == item
                || world
                    .items
                    .get(occupant)
                    .is_some_and(|other| other.can_stack_with(entry));
            if !merges {
                return ReturnValue::NeedExchange;
            }
        }
        if !self.has_capacity(world, item, count, 0) {
            return ReturnValue::NotEnoughCapacity;
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
        let Some(player) = self.player(world) else {
            return (ReturnValue::NotPossible, 0);
        };
        let Some(entry) = world.items.get(item) else {
            return (ReturnValue::NotPossible, 0);
        };
        let max = match index {
            SlotIndex::Wherever => {
                let mut room = 0u32;
                for slot in INVENTORY_SLOTS {
                    let at = SlotIndex::At(slot.index());
                    match player.inventory.slot(slot) {
                        Some(occupant) if occupant == item => {}
                        Some(occupant) => {
                            let Some(other) = world.items.get(occupant) else {
                                continue;
                            };
                            if other.is_container() {
                                room += self.container_room(world, occupant, item, flags);
                            } else if other.can_stack_with(entry) && other.has_stack_room() {
                                let remainder = MAX_STACK_COUNT - other.count;
                                if self.query_add(world, at, item, remainder, flags).is_ok() {
                                    room += u32::from(remainder);
                                }
                            }
                        }
                        None => {
                            if self.query_add(world, at, item, entry.count, flags).is_ok() {
                                room += u32::from(units_per_slot(world, item));
                            }
                        }
                    }
                }
                room
            }
            SlotIndex::At(slot) => match self.item_at(world, slot) {
                Some(occupant) => match world.items.get(occupant) {
                    Some(other) if other.can_stack_with(entry) && other.has_stack_room() => {
                        u32::from(MAX_STACK_COUNT - other.count)
                    }
                    _ => 0,
                },
                None => {
                    if self.query_add(world, index, item, count, flags).is_ok() {
                        return (ReturnValue::NoError, units_per_slot(world, item));
                    }
                    0
                }
            },
        };
        let mut max = u16::try_from(max).unwrap_or(u16::MAX);
        if !entry.is_stackable() {
            max = max.min(1);
        }
        if max < count {
            return (ReturnValue::NotEnoughRoom, max);
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
        if self.thing_index(world, item).is_none() {
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
        let Some(player) = self.player(world) else {
            return Destination::new(self.id(), index, flags);
        };
        let SlotIndex::At(slot) = index else {
            return self.search_destination(world, player, item, flags);
        };
        let target = self.item_at(world, slot);
        if let Some(found) = target {
            let is_container = world.items.get(found).is_some_and(|e| e.is_container());
            if found != item && is_container {
                return Destination::new(CylinderId::Container(found), SlotIndex::Wherever, flags);
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
        self.player(world)?
            .inventory
            .position_of(item)
            .map(InventorySlot::index)
    }

    fn item_at(&self, world: &WorldState, index: usize) -> Option<ItemHandle> {
        self.player(world)?.inventory.at(index)
    }

    fn attach(&self, world: &mut WorldState, index: SlotIndex, item: ItemHandle) {
        let SlotIndex::At(index) = index else {
            panic!("inventory add for {:?} needs a slot", self.0);
        };
        let Some(slot) = InventorySlot::from_index(index) else {
            panic!("inventory slot {} does not exist", index);
        };
        let Some(player) = world.registry.player_mut(self.0) else {
            panic!("player {:?} is not registered", self.0);
        };
        if let Err(occupant) = player.inventory.set_slot(slot, item) {
            panic!("slot {:?} already holds {:?}", slot, occupant);
        }
    }

    fn detach(&self, world: &mut WorldState, item: ItemHandle) {
        let cleared = world.registry.player_mut(self.0).and_then(|player| {
            let slot = player.inventory.position_of(item)?;
            player.inventory.clear_slot(slot)
        });
        if cleared.is_none() {
            panic!("item {:?} is not carried by {:?}", item, self.0);
        }
    }

    fn replace_thing(&self, world: &mut WorldState, index: usize, item: ItemHandle) -> ItemHandle {
        let old = InventorySlot::from_index(index).and_then(|slot| {
            world
                .registry
                .player_mut(self.0)
                .and_then(|player| player.inventory.replace_slot(slot, item))
        });
        let Some(old) = old else {
            panic!("no item in slot {} of {:?}", index, self.0);
        };
        world.expect_item_mut(item).parent = Some(self.id());
        world.expect_item_mut(old).parent = None;
        old
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::testing::{fixture_with_player, types};

    #[test]
    fn body_slots_and_occupied_slots() {
        let (mut world, player) = fixture_with_player(1000);
        let inventory = InventoryCylinder(player);
        let helmet = world.create_item(types::HELMET, 1).expect("helmet");
        let head = SlotIndex::At(InventorySlot::Head.index());
        let feet = SlotIndex::At(InventorySlot::Feet.index());
        assert_eq!(
            inventory.query_add(&world, feet, helmet, 1, QueryFlags::NONE),
            ReturnValue::CannotBeDressed
        );
        assert!(inventory.query_add(&world, head, helmet, 1, QueryFlags::NONE).is_ok());
        assert_eq!(
            inventory.query_add(&world, SlotIndex::Wherever, helmet, 1, QueryFlags::NONE),
            ReturnValue::NotEnoughRoom
        );

        let left = SlotIndex::At(InventorySlot::LeftHand.index());
        let shield = world.create_item(types::SHIELD, 1).expect("shield");
        let sword = world.create_item(types::SWORD, 1).expect("sword");
        assert!(world.add_item(None, inventory.id(), shield, left, QueryFlags::NONE).is_ok());
        assert_eq!(
            inventory.query_add(&world, left, sword, 1, QueryFlags::NONE),
            ReturnValue::NeedExchange
        );
    }

    #[test]
    fn capacity_limits_new_items_only() {
        let (mut world, player) = fixture_with_player(250);
        let inventory = InventoryCylinder(player);
        let right = SlotIndex::At(InventorySlot::RightHand.index());
        let sword = world.create_item(types::SWORD, 1).expect("sword");
        assert!(world.add_item(None, inventory.id(), sword, right, QueryFlags::NONE).is_ok());
        assert_eq!(inventory.free_capacity(&world), 250 - 200);

        let shield = world.create_item(types::SHIELD, 1).expect("shield");
        let left = SlotIndex::At(InventorySlot::LeftHand.index());
        assert_eq!(
            inventory.query_add(&world, left, shield, 1, QueryFlags::NONE),
            ReturnValue::NotEnoughCapacity
        );
        assert!(inventory.query_add(&world, left, sword, 1, QueryFlags::NONE).is_ok());
    }

    #[test]
    fn wherever_search_prefers_stacks_then_containers() {
        let (mut world, player) = fixture_with_player(100_000);
        let inventory = InventoryCylinder(player);
        let backpack = world.create_item(types::BACKPACK, 1).expect("backpack");
        let back = SlotIndex::At(InventorySlot::Backpack.index());
        assert!(world.add_item(None, inventory.id(), backpack, back, QueryFlags::NONE).is_ok());
        for (slot, type_id) in [
            (InventorySlot::RightHand, types::SWORD),
            (InventorySlot::LeftHand, types::SHIELD),
            (InventorySlot::Ammo, types::SWORD),
        ] {
            let held = world.create_item(type_id, 1).expect("held item");
            let at = SlotIndex::At(slot.index());
            assert!(world.add_item(None, inventory.id(), held, at, QueryFlags::NONE).is_ok());
        }
        let coins = world.create_item(types::GOLD, 50).expect("coins");
        assert!(world
            .add_item(None, CylinderId::Container(backpack), coins, SlotIndex::Wherever, QueryFlags::NONE)
            .is_ok());

        let more = world.create_item(types::GOLD, 10).expect("more");
        let dest = inventory.query_destination(&world, SlotIndex::Wherever, more, QueryFlags::NONE);
        assert_eq!(dest.cylinder, CylinderId::Container(backpack));
        assert_eq!(dest.item, Some(coins));

        let helmet = world.create_item(types::HELMET, 1).expect("helmet");
        let dest = inventory.query_destination(&world, SlotIndex::Wherever, helmet, QueryFlags::NONE);
        assert_eq!(dest.cylinder, inventory.id());
        assert_eq!(dest.index, SlotIndex::At(InventorySlot::Head.index()));

        let dest = inventory.query_destination(&world, back, helmet, QueryFlags::NONE);
        assert_eq!(dest.cylinder, CylinderId::Container(backpack));
    }
}
