use super::{
    check_removable, notification_chain, Cylinder, CylinderId, Destination, QueryFlags, SlotIndex,
};
use crate::world::arena::ItemHandle;
use crate::world::notify::WorldEvent;
use crate::world::return_value::ReturnValue;
use crate::world::state::WorldState;

fn single_or_count(world: &WorldState, item: ItemHandle, count: u16) -> u16 {
    match world.items.get(item) {
        Some(entry) if entry.is_stackable() => count.max(1),
        _ => 1,
    }
}

/// A trash holder on a tile. Whatever goes in is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrashCylinder(pub ItemHandle);

impl Cylinder for TrashCylinder {
    fn id(&self) -> CylinderId {
        CylinderId::Trash(self.0)
    }

    fn query_add(
        &self,
        world: &WorldState,
        _index: SlotIndex,
        item: ItemHandle,
        _count: u16,
        _flags: QueryFlags,
    ) -> ReturnValue {
        if item == self.0 || !world.items.contains(item) {
            return ReturnValue::NotPossible;
        }
        ReturnValue::NoError
    }

    fn query_max_count(
        &self,
        world: &WorldState,
        _index: SlotIndex,
        item: ItemHandle,
        count: u16,
        _flags: QueryFlags,
    ) -> (ReturnValue, u16) {
        (ReturnValue::NoError, single_or_count(world, item, count))
    }

    fn query_remove(
        &self,
        _world: &WorldState,
        _item: ItemHandle,
        _count: u16,
        _flags: QueryFlags,
    ) -> ReturnValue {
        ReturnValue::NotPossible
    }

    fn query_destination(
        &self,
        _world: &WorldState,
        _index: SlotIndex,
        _item: ItemHandle,
        flags: QueryFlags,
    ) -> Destination {
        Destination::new(self.id(), SlotIndex::Wherever, flags)
    }

    fn thing_index(&self, _world: &WorldState, _item: ItemHandle) -> Option<usize> {
        None
    }

    fn item_at(&self, _world: &WorldState, _index: usize) -> Option<ItemHandle> {
        None
    }

    fn attach(&self, _world: &mut WorldState, _index: SlotIndex, _item: ItemHandle) {}

    fn detach(&self, _world: &mut WorldState, item: ItemHandle) {
        panic!("trash {:?} holds nothing to detach, got {:?}", self.0, item);
    }

    fn replace_thing(&self, _world: &mut WorldState, index: usize, _item: ItemHandle) -> ItemHandle {
        panic!("trash {:?} has no index {}", self.0, index);
    }

    /// Reports the arrival up the chain, then destroys the item.
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
        if let Some(entry) = world.items.get_mut(item) {
            entry.parent = None;
        }
        world.release_item(item);
    }
}

/// A mailbox on a tile. It accepts mail only and keeps it in an outbox until
/// the engine flushes it to the recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxCylinder(pub ItemHandle);

impl MailboxCylinder {
    pub fn outbox(&self, world: &WorldState) -> Vec<ItemHandle> {
        world
            .items
            .get(self.0)
            .map(|mailbox| mailbox.contents.clone())
            .unwrap_or_default()
    }
}

impl Cylinder for MailboxCylinder {
    fn id(&self) -> CylinderId {
        CylinderId::Mailbox(self.0)
    }

    fn query_add(
        &self,
        world: &WorldState,
        _index: SlotIndex,
        item: ItemHandle,
        _count: u16,
        _flags: QueryFlags,
    ) -> ReturnValue {
        match world.items.get(item) {
            Some(entry) if entry.item_type.is_mail() => ReturnValue::NoError,
            _ => ReturnValue::NotPossible,
        }
    }

    fn query_max_count(
        &self,
        world: &WorldState,
        _index: SlotIndex,
        item: ItemHandle,
        count: u16,
        _flags: QueryFlags,
    ) -> (ReturnValue, u16) {
        (ReturnValue::NoError, single_or_count(world, item, count))
    }

    fn query_remove(
        &self,
        world: &WorldState,
        item: ItemHandle,
        count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        if !flags.ignore_not_moveable || self.thing_index(world, item).is_none() {
            return ReturnValue::NotPossible;
        }
        check_removable(world, item, count, flags)
    }

    fn query_destination(
        &self,
        _world: &WorldState,
        _index: SlotIndex,
        _item: ItemHandle,
        flags: QueryFlags,
    ) -> Destination {
        Destination::new(self.id(), SlotIndex::Wherever, flags)
    }

    fn thing_index(&self, world: &WorldState, item: ItemHandle) -> Option<usize> {
        world
            .items
            .get(self.0)?
            .contents
            .iter()
            .position(|entry| *entry == item)
    }

    fn item_at(&self, world: &WorldState, index: usize) -> Option<ItemHandle> {
        world.items.get(self.0)?.contents.get(index).copied()
    }

    fn attach(&self, world: &mut WorldState, _index: SlotIndex, item: ItemHandle) {
        world.expect_item_mut(self.0).contents.push(item);
    }

    fn detach(&self, world: &mut WorldState, item: ItemHandle) {
        let mailbox = world.expect_item_mut(self.0);
        let Some(index) = mailbox.contents.iter().position(|entry| *entry == item) else {
            panic!("item {:?} is not in mailbox {:?}", item, self.0);
        };
        mailbox.contents.remove(index);
    }

    fn replace_thing(&self, world: &mut WorldState, index: usize, item: ItemHandle) -> ItemHandle {
        let mailbox = world.expect_item_mut(self.0);
        let Some(slot) = mailbox.contents.get_mut(index) else {
            panic!("no item at index {} in mailbox {:?}", index, self.0);
        };
        let old = std::mem::replace(slot, item);
        world.expect_item_mut(item).parent = Some(self.id());
        world.expect_item_mut(old).parent = None;
        old
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::position::Position;
    use crate::world::testing::{fixture, types};

    #[test]
    fn trash_accepts_anything_but_itself() {
        let mut world = fixture();
        let trash = world.place_item(Position::new(1, 1, 7), types::TRASH);
        let sword = world.create_item(types::SWORD, 1).expect("sword");
        let bin = TrashCylinder(trash);
        assert!(bin.query_add(&world, SlotIndex::Wherever, sword, 1, QueryFlags::NONE).is_ok());
        assert_eq!(
            bin.query_add(&world, SlotIndex::Wherever, trash, 1, QueryFlags::NONE),
            ReturnValue::NotPossible
        );
        assert_eq!(
            bin.query_remove(&world, sword, 1, QueryFlags::NONE),
            ReturnValue::NotPossible
        );
    }

    #[test]
    fn mailbox_accepts_mail_only() {
        let mut world = fixture();
        let mailbox = world.place_item(Position::new(1, 2, 7), types::MAILBOX);
        let letter = world.create_item(types::LETTER, 1).expect("letter");
        let sword = world.create_item(types::SWORD, 1).expect("sword");
        let post = MailboxCylinder(mailbox);
        assert!(post.query_add(&world, SlotIndex::Wherever, letter, 1, QueryFlags::NONE).is_ok());
        assert_eq!(
            post.query_add(&world, SlotIndex::Wherever, sword, 1, QueryFlags::NONE),
            ReturnValue::NotPossible
        );
    }
}
