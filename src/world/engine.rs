//! Transactions over the cylinder graph.
//!
//! Every operation runs all of its queries before the first mutation, so a
//! rejected operation leaves the world exactly as it found it.

use crate::entities::identity::CreatureId;
use crate::entities::item::{Item, ItemTypeId, MAX_STACK_COUNT};
use crate::telemetry::logging;
use crate::world::arena::ItemHandle;
use crate::world::cylinder::{
    units_per_slot, Cylinder, CylinderId, Destination, InventoryCylinder, QueryFlags, SlotIndex,
    Thing,
};
use crate::world::return_value::ReturnValue;
use crate::world::state::WorldState;
use std::sync::Arc;

impl WorldState {
    pub fn move_thing(
        &mut self,
        actor: Option<CreatureId>,
        from: CylinderId,
        to: CylinderId,
        index: SlotIndex,
        thing: Thing,
        count: u16,
    ) -> ReturnValue {
        match thing {
            Thing::Item(item) => self.move_item(actor, from, to, index, item, count, QueryFlags::NONE),
            Thing::Creature(id) => {
                let CylinderId::Tile(destination) = to else {
                    return ReturnValue::NotPossible;
                };
                let at = self.registry.get(id).map(|entity| entity.position());
                if at.map(CylinderId::Tile) != Some(from) {
                    return ReturnValue::NotPossible;
                }
                self.move_creature(id, destination, QueryFlags::NONE).into()
            }
        }
    }

    /// Follows `query_destination` redirects until a cylinder keeps the item.
    /// `None` means the redirect chain did not settle within the depth bound.
    pub(crate) fn resolve_destination(
        &self,
        to: CylinderId,
        index: SlotIndex,
        item: ItemHandle,
        flags: QueryFlags,
    ) -> Option<Destination> {
        let mut current = Destination::new(to, index, flags);
        for _ in 0..self.limits.max_destination_depth {
            let next = current
                .cylinder
                .query_destination(self, current.index, item, current.flags);
            if next.cylinder == current.cylinder {
                return Some(next);
            }
            current = next;
        }
        logging::log_error(&format!(
            "destination for item {:?} did not settle after {} redirects starting at {:?}",
            item, self.limits.max_destination_depth, to
        ));
        None
    }

    #[allow(clippy::too_many_arguments)]
    pub fn move_item(
        &mut self,
        actor: Option<CreatureId>,
        from: CylinderId,
        to: CylinderId,
        index: SlotIndex,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        let Some(entry) = self.items.get(item) else {
            return ReturnValue::NotPossible;
        };
        let Some(parent) = entry.parent else {
            return self.add_item(actor, to, item, index, flags);
        };
        if parent != from || count == 0 {
            return ReturnValue::NotPossible;
        }
        let stackable = entry.is_stackable();
        let available = entry.count;

        let Some(destination) = self.resolve_destination(to, index, item, flags) else {
            return ReturnValue::NotPossible;
        };
        let to = destination.cylinder;
        let index = destination.index;
        let flags = destination.flags;
        let mut to_item = destination.item;

        if to == from && self.is_same_slot(from, index, item, to_item) {
            return ReturnValue::NoError;
        }

        let mut exchange = None;
        let (max_ret, max_count) = match to.query_add(self, index, item, count, flags) {
            ReturnValue::NeedExchange => {
                let Some(blocker) = to_item.or_else(|| match index {
                    SlotIndex::At(slot) => to.item_at(self, slot),
                    SlotIndex::Wherever => None,
                }) else {
                    return ReturnValue::NeedExchange;
                };
                if !self.exchange_allowed(from, to, item, count, blocker, flags) {
                    return ReturnValue::NeedExchange;
                }
                let CylinderId::Inventory(player) = to else {
                    return ReturnValue::NeedExchange;
                };
                let ret = InventoryCylinder(player).query_add_replacing(self, index, item, count, blocker);
                if !ret.is_ok() {
                    return ret;
                }
                exchange = Some(blocker);
                to_item = None;
                (ReturnValue::NoError, units_per_slot(self, item))
            }
            ret if !ret.is_ok() => return ret,
            _ => to.query_max_count(self, index, item, count, flags),
        };
        if !max_ret.is_ok() && max_count == 0 {
            return max_ret;
        }
        let moved = if stackable {
            count.min(max_count).min(available)
        } else {
            available
        };
        if moved == 0 {
            return ReturnValue::NotPossible;
        }

        let ret = from.query_remove(self, item, moved, flags);
        if !ret.is_ok() {
            return ret;
        }

        if let Some(blocker) = exchange {
            self.perform_exchange(blocker, from, to);
        }
        self.commit_move(from, to, index, item, moved, to_item);
        if let CylinderId::Mailbox(mailbox) = to {
            self.flush_mailbox(mailbox);
        }

        if stackable && max_count < count {
            return max_ret;
        }
        ReturnValue::NoError
    }

    fn is_same_slot(
        &self,
        cylinder: CylinderId,
        index: SlotIndex,
        item: ItemHandle,
        to_item: Option<ItemHandle>,
    ) -> bool {
        if to_item == Some(item) {
            return true;
        }
        match index {
            SlotIndex::At(slot) => cylinder.thing_index(self, item) == Some(slot),
            SlotIndex::Wherever => matches!(cylinder, CylinderId::Tile(_)),
        }
    }

    /// Checks, without touching anything, that the blocker can go back to
    /// the source and that the item can then leave it. Whether the item fits
    /// the freed slot is decided by the destination afterwards.
    fn exchange_allowed(
        &self,
        from: CylinderId,
        to: CylinderId,
        item: ItemHandle,
        count: u16,
        blocker: ItemHandle,
        flags: QueryFlags,
    ) -> bool {
        let blocker_count = self.items.count(blocker);
        let from_index = match from.thing_index(self, item) {
            Some(slot) => SlotIndex::At(slot),
            None => SlotIndex::Wherever,
        };
        if !from
            .query_add(self, from_index, blocker, blocker_count, QueryFlags::NONE)
            .is_ok()
        {
            return false;
        }
        let (ret, max) = from.query_max_count(
            self,
            SlotIndex::Wherever,
            blocker,
            blocker_count,
            QueryFlags::NONE,
        );
        if !ret.is_ok() && max == 0 {
            return false;
        }
        to.query_remove(self, blocker, blocker_count, flags).is_ok()
            && from.query_remove(self, item, count.min(self.items.count(item)), flags).is_ok()
    }

    fn perform_exchange(&mut self, blocker: ItemHandle, from: CylinderId, to: CylinderId) {
        let count = self.items.count(blocker);
        to.remove_thing(self, blocker, count);
        from.add_thing(self, SlotIndex::Wherever, blocker);
        to.post_remove_notification(self, blocker, Some(from));
        from.post_add_notification(self, blocker, Some(to));
    }

    /// The mutating half of a move. Every query already passed, so nothing
    /// here can fail.
    fn commit_move(
        &mut self,
        from: CylinderId,
        to: CylinderId,
        index: SlotIndex,
        item: ItemHandle,
        moved: u16,
        to_item: Option<ItemHandle>,
    ) {
        let entry = self.expect_item(item);
        let whole = !entry.is_stackable() || moved >= entry.count;
        let merge_target = to_item.filter(|target| {
            *target != item
                && self
                    .items
                    .get(*target)
                    .is_some_and(|other| other.can_stack_with(entry) && other.has_stack_room())
        });

        let mut added = None;
        let mut updated = None;
        let mut released = None;

        from.remove_thing(self, item, moved);
        match merge_target {
            None if whole => {
                to.add_thing(self, index, item);
                added = Some(item);
            }
            None => {
                let split = self.expect_item(item).split_copy(moved);
                let fresh = self.items.insert(split);
                to.add_thing(self, index, fresh);
                added = Some(fresh);
            }
            Some(target) => {
                let (item_type, current) = {
                    let other = self.expect_item(target);
                    (Arc::clone(&other.item_type), other.count)
                };
                let merged = (MAX_STACK_COUNT - current).min(moved);
                to.update_thing(self, target, item_type, current + merged);
                updated = Some(target);
                let remainder = moved - merged;
                if remainder > 0 {
                    let split = self.expect_item(item).split_copy(remainder);
                    let fresh = self.items.insert(split);
                    to.add_thing(self, SlotIndex::Wherever, fresh);
                    added = Some(fresh);
                }
                if whole {
                    released = Some(item);
                }
            }
        }

        from.post_remove_notification(self, item, Some(to));
        if let Some(fresh) = added {
            to.post_add_notification(self, fresh, Some(from));
        }
        if let Some(target) = updated {
            to.post_add_notification(self, target, Some(from));
        }
        if let Some(original) = released {
            self.release_item(original);
        }
    }

    /// Puts a free item into `to`, merging it into a matching stack when the
    /// destination offers one. A remainder that finds no room stays with the
    /// caller, reduced by what was merged, and the failure is returned.
    pub fn add_item(
        &mut self,
        actor: Option<CreatureId>,
        to: CylinderId,
        item: ItemHandle,
        index: SlotIndex,
        flags: QueryFlags,
    ) -> ReturnValue {
        let Some(entry) = self.items.get(item) else {
            return ReturnValue::NotPossible;
        };
        if entry.parent.is_some() {
            return ReturnValue::NotPossible;
        }
        let count = entry.count;
        let Some(destination) = self.resolve_destination(to, index, item, flags) else {
            return ReturnValue::NotPossible;
        };
        let target = destination.cylinder;
        let index = destination.index;
        let flags = destination.flags;

        let ret = target.query_add(self, index, item, count, flags);
        if !ret.is_ok() {
            return ret;
        }
        let (ret, max_count) = target.query_max_count(self, SlotIndex::Wherever, item, count, flags);
        if !ret.is_ok() {
            return ret;
        }

        let entry = self.expect_item(item);
        let merge_target = destination.item.filter(|other| {
            *other != item
                && self
                    .items
                    .get(*other)
                    .is_some_and(|existing| existing.can_stack_with(entry) && existing.has_stack_room())
        });
        let Some(stack) = merge_target else {
            target.add_thing(self, index, item);
            target.post_add_notification(self, item, None);
            if let CylinderId::Mailbox(mailbox) = target {
                self.flush_mailbox(mailbox);
            }
            return ReturnValue::NoError;
        };

        let (item_type, current) = {
            let existing = self.expect_item(stack);
            (Arc::clone(&existing.item_type), existing.count)
        };
        let offered = count.min(max_count);
        let merged = (MAX_STACK_COUNT - current).min(offered);
        target.update_thing(self, stack, item_type, current + merged);
        target.post_add_notification(self, stack, None);

        let remainder = count - merged;
        if remainder == 0 {
            self.release_item(item);
            return ReturnValue::NoError;
        }
        self.expect_item_mut(item).count = remainder;
        self.add_item(actor, to, item, SlotIndex::Wherever, flags)
    }

    /// Removes `count` units of a placed item from the world. Immovable
    /// items may be removed this way. The holder chain hears about partial
    /// removals too, after the stack's own update.
    pub fn remove_item(
        &mut self,
        _actor: Option<CreatureId>,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        let Some(entry) = self.items.get(item) else {
            return ReturnValue::NotPossible;
        };
        let Some(parent) = entry.parent else {
            return ReturnValue::NotPossible;
        };
        let whole = !entry.is_stackable() || count >= entry.count;
        let count = count.min(entry.count);
        let flags = QueryFlags {
            ignore_not_moveable: true,
            ..flags
        };
        let ret = parent.query_remove(self, item, count, flags);
        if !ret.is_ok() {
            return ret;
        }
        parent.remove_thing(self, item, count);
        parent.post_remove_notification(self, item, None);
        if whole {
            self.release_item(item);
        }
        ReturnValue::NoError
    }

    /// Changes an item's kind and count. Returns the handle of the resulting
    /// item, or `None` when a stackable count reached zero and the item was
    /// removed.
    pub fn transform_item(
        &mut self,
        item: ItemHandle,
        new_type: ItemTypeId,
        new_count: Option<u16>,
    ) -> Result<Option<ItemHandle>, ReturnValue> {
        let entry = self.items.get(item).ok_or(ReturnValue::NotPossible)?;
        let item_type = self
            .item_types
            .get(new_type)
            .cloned()
            .ok_or(ReturnValue::NotPossible)?;
        let count = match new_count {
            Some(count) => count,
            None if item_type.stackable && entry.is_stackable() => entry.count,
            None => 1,
        };
        let parent = entry.parent;
        let was_container = entry.is_container();

        if item_type.stackable && count == 0 {
            let current = entry.count;
            return match self.remove_item(None, item, current, QueryFlags::NONE) {
                ReturnValue::NoError => Ok(None),
                err => Err(err),
            };
        }
        let count = if item_type.stackable {
            count.min(MAX_STACK_COUNT)
        } else {
            1
        };

        let result = match parent {
            None => {
                let entry = self.expect_item_mut(item);
                entry.item_type = item_type;
                entry.count = count;
                item
            }
            Some(parent) if was_container == item_type.is_container() => {
                parent.update_thing(self, item, item_type, count);
                item
            }
            Some(parent) => {
                let Some(index) = parent.thing_index(self, item) else {
                    return Err(ReturnValue::NotPossible);
                };
                let mut fresh = Item::new(item_type, count);
                fresh.attributes = self.expect_item(item).attributes.clone();
                fresh.attributes.decay_task = None;
                fresh.attributes.decay = Default::default();
                let fresh = self.items.insert(fresh);
                let old = parent.replace_thing(self, index, fresh);
                parent.post_add_notification(self, fresh, None);
                parent.post_remove_notification(self, old, None);
                self.release_item(old);
                fresh
            }
        };

        if self.expect_item(result).item_type.can_decay() {
            self.start_decaying(result);
        }
        Ok(Some(result))
    }

    /// Gives an item to a player, searching the inventory and carried
    /// containers. With `drop_on_map` whatever does not fit lands on the
    /// player's tile.
    pub fn player_add_item(
        &mut self,
        player: CreatureId,
        item: ItemHandle,
        drop_on_map: bool,
    ) -> ReturnValue {
        let Some(position) = self.registry.player(player).map(|p| p.base.position) else {
            return ReturnValue::NotPossible;
        };
        let inventory = CylinderId::Inventory(player);
        let ret = self.add_item(Some(player), inventory, item, SlotIndex::Wherever, QueryFlags::NONE);
        if ret.is_ok() || !drop_on_map || !self.items.contains(item) {
            return ret;
        }
        self.add_item(
            Some(player),
            CylinderId::Tile(position),
            item,
            SlotIndex::Wherever,
            QueryFlags::NO_LIMIT,
        )
    }

    /// Moves a whole item into `to` without limits and without following
    /// destination redirects. Used for mail delivery.
    pub(crate) fn relocate(&mut self, item: ItemHandle, to: CylinderId) -> bool {
        let Some(from) = self.items.get(item).and_then(|entry| entry.parent) else {
            return false;
        };
        let count = self.items.count(item);
        if !to
            .query_add(self, SlotIndex::Wherever, item, count, QueryFlags::NO_LIMIT)
            .is_ok()
        {
            return false;
        }
        from.remove_thing(self, item, count);
        to.add_thing(self, SlotIndex::Wherever, item);
        from.post_remove_notification(self, item, Some(to));
        to.post_add_notification(self, item, Some(from));
        true
    }
}
