use super::{check_removable, Cylinder, CylinderId, Destination, QueryFlags, SlotIndex};
use crate::entities::identity::EntityKind;
use crate::world::arena::ItemHandle;
use crate::world::item_types::ItemKind;
use crate::world::position::Position;
use crate::world::return_value::ReturnValue;
use crate::world::state::WorldState;

/// Most items a single tile may hold.
pub const MAX_TILE_ITEMS: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCylinder(pub Position);

impl TileCylinder {
    /// Whether a creature of `kind` may stand on this tile.
    pub fn query_add_creature(
        &self,
        world: &WorldState,
        kind: EntityKind,
        flags: QueryFlags,
    ) -> ReturnValue {
        let Some(tile) = world.map.tile(self.0) else {
            return ReturnValue::NotPossible;
        };
        if tile.ground.is_none() {
            return ReturnValue::NotPossible;
        }
        if tile.creature.is_some() && !flags.ignore_block_creature {
            return ReturnValue::NotPossible;
        }
        if kind == EntityKind::Monster && tile.protection_zone {
            return ReturnValue::NotPossible;
        }
        for item in &tile.items {
            let Some(entry) = world.items.get(*item) else {
                continue;
            };
            if !entry.item_type.blocking {
                continue;
            }
            if !flags.ignore_block_item || !entry.is_moveable() {
                return ReturnValue::NotPossible;
            }
        }
        ReturnValue::NoError
    }

    fn has_blocking_item(&self, world: &WorldState, except: ItemHandle) -> bool {
        world.map.tile(self.0).is_some_and(|tile| {
            tile.items.iter().any(|item| {
                *item != except
                    && world
                        .items
                        .get(*item)
                        .is_some_and(|entry| entry.item_type.blocking)
            })
        })
    }
}

impl Cylinder for TileCylinder {
    fn id(&self) -> CylinderId {
        CylinderId::Tile(self.0)
    }

    fn query_add(
        &self,
        world: &WorldState,
        _index: SlotIndex,
        item: ItemHandle,
        _count: u16,
        flags: QueryFlags,
    ) -> ReturnValue {
        let Some(tile) = world.map.tile(self.0) else {
            return ReturnValue::NotPossible;
        };
        let Some(entry) = world.items.get(item) else {
            return ReturnValue::NotPossible;
        };
        if entry.item_type.is_ground() {
            return if tile.ground.is_none() {
                ReturnValue::NoError
            } else {
                ReturnValue::NotPossible
            };
        }
        if tile.ground.is_none() {
            return ReturnValue::NotPossible;
        }
        if flags.no_limit {
            return ReturnValue::NoError;
        }
        if tile.item_count() >= MAX_TILE_ITEMS {
            return ReturnValue::NotEnoughRoom;
        }
        if entry.item_type.blocking
            && tile.creature.is_some()
            && !flags.ignore_block_creature
        {
            return ReturnValue::NotEnoughRoom;
        }
        if !flags.ignore_block_item && self.has_blocking_item(world, item) {
            return ReturnValue::NotEnoughRoom;
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
        let max = match world.items.get(item) {
            Some(entry) if entry.is_stackable() => count.max(1),
            _ => 1,
        };
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
        _index: SlotIndex,
        item: ItemHandle,
        flags: QueryFlags,
    ) -> Destination {
        let Some(tile) = world.map.tile(self.0) else {
            return Destination::new(self.id(), SlotIndex::Wherever, flags);
        };
        let is_mail = world
            .items
            .get(item)
            .is_some_and(|entry| entry.item_type.is_mail());
        for thing in tile.things() {
            if thing == item {
                continue;
            }
            let Some(entry) = world.items.get(thing) else {
                continue;
            };
            match entry.item_type.kind {
                ItemKind::TrashHolder => {
                    return Destination::new(CylinderId::Trash(thing), SlotIndex::Wherever, flags);
                }
                ItemKind::Mailbox if is_mail => {
                    return Destination::new(
                        CylinderId::Mailbox(thing),
                        SlotIndex::Wherever,
                        flags,
                    );
                }
                _ => {}
            }
        }
        Destination {
            cylinder: self.id(),
            index: SlotIndex::Wherever,
            item: tile.top_item(),
            flags,
        }
    }

    fn thing_index(&self, world: &WorldState, item: ItemHandle) -> Option<usize> {
        world.map.tile(self.0)?.index_of(item)
    }

    fn item_at(&self, world: &WorldState, index: usize) -> Option<ItemHandle> {
        world.map.tile(self.0)?.item_at(index)
    }

    fn attach(&self, world: &mut WorldState, _index: SlotIndex, item: ItemHandle) {
        let is_ground = world.expect_item(item).item_type.is_ground();
        let position = self.0;
        let Some(tile) = world.map.tile_mut(position) else {
            panic!("attach to missing tile {:?}", position);
        };
        if is_ground {
            if tile.ground.is_some() {
                panic!("tile {:?} already has ground", position);
            }
            tile.ground = Some(item);
        } else {
            tile.items.insert(0, item);
        }
    }

    fn detach(&self, world: &mut WorldState, item: ItemHandle) {
        let position = self.0;
        let detached = world
            .map
            .tile_mut(position)
            .is_some_and(|tile| tile.detach(item));
        if !detached {
            panic!("item {:?} is not on tile {:?}", item, position);
        }
    }

    fn replace_thing(&self, world: &mut WorldState, index: usize, item: ItemHandle) -> ItemHandle {
        let position = self.0;
        let Some(tile) = world.map.tile_mut(position) else {
            panic!("replace on missing tile {:?}", position);
        };
        let slot = match (tile.ground.is_some(), index) {
            (true, 0) => tile.ground.as_mut(),
            (true, index) => tile.items.get_mut(index - 1),
            (false, index) => tile.items.get_mut(index),
        };
        let Some(slot) = slot else {
            panic!("no item at index {} on tile {:?}", index, position);
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
    use crate::entities::creature::{Entity, Monster};
    use crate::world::testing::{fixture, types};

    #[test]
    fn items_need_ground_and_free_space() {
        let mut world = fixture();
        let at = Position::new(3, 3, 7);
        let sword = world.create_item(types::SWORD, 1).expect("sword");
        assert_eq!(
            TileCylinder(Position::new(90, 90, 7)).query_add(
                &world,
                SlotIndex::Wherever,
                sword,
                1,
                QueryFlags::NONE
            ),
            ReturnValue::NotPossible
        );
        assert!(TileCylinder(at)
            .query_add(&world, SlotIndex::Wherever, sword, 1, QueryFlags::NONE)
            .is_ok());

        world.place_item(at, types::WALL);
        assert_eq!(
            TileCylinder(at).query_add(&world, SlotIndex::Wherever, sword, 1, QueryFlags::NONE),
            ReturnValue::NotEnoughRoom
        );
        assert!(TileCylinder(at)
            .query_add(&world, SlotIndex::Wherever, sword, 1, QueryFlags::NO_LIMIT)
            .is_ok());
    }

    #[test]
    fn creature_placement_rules() {
        let mut world = fixture();
        let open = Position::new(4, 4, 7);
        assert!(TileCylinder(open)
            .query_add_creature(&world, EntityKind::Monster, QueryFlags::NONE)
            .is_ok());

        world.map.tile_mut(open).expect("tile").protection_zone = true;
        assert_eq!(
            TileCylinder(open).query_add_creature(&world, EntityKind::Monster, QueryFlags::NONE),
            ReturnValue::NotPossible
        );
        assert!(TileCylinder(open)
            .query_add_creature(&world, EntityKind::Player, QueryFlags::NONE)
            .is_ok());

        let walled = Position::new(5, 5, 7);
        world.place_item(walled, types::WALL);
        assert_eq!(
            TileCylinder(walled).query_add_creature(&world, EntityKind::Npc, QueryFlags::DIRECT),
            ReturnValue::NotPossible
        );

        let crate_tile = Position::new(6, 6, 7);
        world.place_item(crate_tile, types::CRATE);
        assert_eq!(
            TileCylinder(crate_tile).query_add_creature(&world, EntityKind::Npc, QueryFlags::NONE),
            ReturnValue::NotPossible
        );
        assert!(TileCylinder(crate_tile)
            .query_add_creature(&world, EntityKind::Npc, QueryFlags::DIRECT)
            .is_ok());

        let id = world
            .add_creature(Entity::Monster(Monster::new("rat", 20)), Position::new(8, 8, 7), 0)
            .expect("placed");
        assert_eq!(
            TileCylinder(Position::new(8, 8, 7)).query_add_creature(
                &world,
                EntityKind::Monster,
                QueryFlags::NONE
            ),
            ReturnValue::NotPossible
        );
        assert!(id.is_assigned());
    }

    #[test]
    fn trash_and_mailbox_redirect_destinations() {
        let mut world = fixture();
        let dump = Position::new(2, 2, 7);
        let trash = world.place_item(dump, types::TRASH);
        let post = Position::new(2, 3, 7);
        let mailbox = world.place_item(post, types::MAILBOX);
        let sword = world.create_item(types::SWORD, 1).expect("sword");
        let letter = world.create_item(types::LETTER, 1).expect("letter");

        let dest = TileCylinder(dump).query_destination(&world, SlotIndex::Wherever, sword, QueryFlags::NONE);
        assert_eq!(dest.cylinder, CylinderId::Trash(trash));

        let dest = TileCylinder(post).query_destination(&world, SlotIndex::Wherever, sword, QueryFlags::NONE);
        assert_eq!(dest.cylinder, CylinderId::Tile(post));
        let dest = TileCylinder(post).query_destination(&world, SlotIndex::Wherever, letter, QueryFlags::NONE);
        assert_eq!(dest.cylinder, CylinderId::Mailbox(mailbox));
    }
}
