use crate::entities::creature::Entity;
use crate::entities::identity::{CreatureId, EntityKind, IdRangeAllocator};
use crate::entities::item::ItemTypeId;
use crate::entities::player::Player;
use crate::telemetry::logging;
use crate::world::arena::ItemHandle;
use crate::world::cylinder::{QueryFlags, TileCylinder};
use crate::world::notify::WorldEvent;
use crate::world::position::Position;
use crate::world::return_value::ReturnValue;
use crate::world::state::WorldState;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap};

/// Every creature currently in the world, keyed by identity, plus the
/// per-kind indexes and identity allocators.
#[derive(Debug)]
pub struct EntityRegistry {
    creatures: HashMap<CreatureId, Entity>,
    players_by_name: HashMap<String, CreatureId>,
    players: BTreeSet<CreatureId>,
    monsters: BTreeSet<CreatureId>,
    npcs: BTreeSet<CreatureId>,
    allocators: [IdRangeAllocator; 3],
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            creatures: HashMap::new(),
            players_by_name: HashMap::new(),
            players: BTreeSet::new(),
            monsters: BTreeSet::new(),
            npcs: BTreeSet::new(),
            allocators: [
                IdRangeAllocator::for_kind(EntityKind::Player),
                IdRangeAllocator::for_kind(EntityKind::Monster),
                IdRangeAllocator::for_kind(EntityKind::Npc),
            ],
        }
    }

    pub fn get(&self, id: CreatureId) -> Option<&Entity> {
        self.creatures.get(&id)
    }

    pub fn get_mut(&mut self, id: CreatureId) -> Option<&mut Entity> {
        self.creatures.get_mut(&id)
    }

    pub fn player(&self, id: CreatureId) -> Option<&Player> {
        self.creatures.get(&id).and_then(Entity::as_player)
    }

    pub fn player_mut(&mut self, id: CreatureId) -> Option<&mut Player> {
        self.creatures.get_mut(&id).and_then(Entity::as_player_mut)
    }

    pub fn player_by_name(&self, name: &str) -> Option<CreatureId> {
        self.players_by_name.get(&name_key(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.creatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.index(kind).len()
    }

    pub fn ids(&self, kind: EntityKind) -> impl Iterator<Item = CreatureId> + '_ {
        self.index(kind).iter().copied()
    }

    fn index(&self, kind: EntityKind) -> &BTreeSet<CreatureId> {
        match kind {
            EntityKind::Player => &self.players,
            EntityKind::Monster => &self.monsters,
            EntityKind::Npc => &self.npcs,
        }
    }

    fn index_mut(&mut self, kind: EntityKind) -> &mut BTreeSet<CreatureId> {
        match kind {
            EntityKind::Player => &mut self.players,
            EntityKind::Monster => &mut self.monsters,
            EntityKind::Npc => &mut self.npcs,
        }
    }

    fn insert(&mut self, entity: Entity) {
        let id = entity.id();
        if let Entity::Player(player) = &entity {
            self.players_by_name.insert(name_key(&player.base.name), id);
        }
        self.index_mut(entity.kind()).insert(id);
        self.creatures.insert(id, entity);
    }

    fn remove(&mut self, id: CreatureId) -> Option<Entity> {
        let entity = self.creatures.remove(&id)?;
        self.index_mut(entity.kind()).remove(&id);
        if let Entity::Player(player) = &entity {
            self.players_by_name.remove(&name_key(&player.base.name));
        }
        Some(entity)
    }

    /// Closes every open container window showing `container`.
    pub(crate) fn forget_container(&mut self, container: ItemHandle) {
        for id in &self.players {
            if let Some(Entity::Player(player)) = self.creatures.get_mut(id) {
                player.forget_container(container);
            }
        }
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl WorldState {
    /// Places a creature at `desired`, or failing that on the nearest free
    /// tile within `radius` rings, and gives it an identity of its kind.
    pub fn add_creature(
        &mut self,
        mut entity: Entity,
        desired: Position,
        radius: u16,
    ) -> Result<CreatureId, ReturnValue> {
        if entity.id().is_assigned() {
            return Err(ReturnValue::NotPossible);
        }
        if let Entity::Player(player) = &entity {
            if self.registry.player_by_name(&player.base.name).is_some() {
                return Err(ReturnValue::NotPossible);
            }
        }
        let position = self.find_placement(entity.kind(), desired, radius)?;

        let kind = entity.kind();
        let raw = self.registry.allocators[kind.index()]
            .allocate()
            .map_err(|err| {
                logging::log_error(&format!("cannot place {}: {}", entity.name(), err));
                ReturnValue::NotPossible
            })?;
        let id = CreatureId(raw);

        entity.will_enter_world(id, position);
        let Some(tile) = self.map.tile_mut(position) else {
            panic!("placement tile {:?} disappeared", position);
        };
        tile.creature = Some(id);
        entity.did_enter_world();

        logging::log_game(&format!(
            "{} {:?} enters the world at [{},{},{}] as {:#010x}",
            entity.name(),
            kind,
            position.x,
            position.y,
            position.z,
            id.0
        ));
        self.registry.insert(entity);
        self.notify(WorldEvent::CreatureAppeared { id, position });
        Ok(id)
    }

    fn find_placement(
        &mut self,
        kind: EntityKind,
        desired: Position,
        radius: u16,
    ) -> Result<Position, ReturnValue> {
        let first_error = TileCylinder(desired).query_add_creature(self, kind, QueryFlags::DIRECT);
        if first_error.is_ok() {
            return Ok(desired);
        }
        let needs_protection = self
            .map
            .tile(desired)
            .is_some_and(|tile| tile.protection_zone);
        for ring in 1..=radius {
            let mut candidates = desired.ring(ring);
            candidates.shuffle(&mut self.rng);
            for candidate in candidates {
                if needs_protection
                    && !self
                        .map
                        .tile(candidate)
                        .is_some_and(|tile| tile.protection_zone)
                {
                    continue;
                }
                let ret = TileCylinder(candidate).query_add_creature(self, kind, QueryFlags::NONE);
                if ret.is_ok() {
                    return Ok(candidate);
                }
            }
        }
        Err(first_error)
    }

    /// Takes a creature out of the world and recycles its identity. Items a
    /// player carries leave the world with them.
    pub fn remove_creature(&mut self, id: CreatureId) -> Result<(), ReturnValue> {
        let Some(entity) = self.registry.get(id) else {
            return Err(ReturnValue::NotPossible);
        };
        let position = entity.position();
        if self.map.tile(position).and_then(|tile| tile.creature) != Some(id) {
            logging::log_error(&format!(
                "creature {:#010x} is not on its tile [{},{},{}]",
                id.0, position.x, position.y, position.z
            ));
            return Err(ReturnValue::NotPossible);
        }

        let Some(mut entity) = self.registry.remove(id) else {
            return Err(ReturnValue::NotPossible);
        };
        entity.will_exit_world();
        if let Some(tile) = self.map.tile_mut(position) {
            tile.creature = None;
        }
        if let Entity::Player(player) = &mut entity {
            let carried = player.inventory.take_all();
            let depot = player.depot.take();
            player.open_containers.clear();
            for item in carried.into_iter().chain(depot) {
                if let Some(entry) = self.items.get_mut(item) {
                    entry.parent = None;
                }
                self.release_item(item);
            }
        }
        if let Err(err) = self.registry.allocators[entity.kind().index()].release(id.0) {
            logging::log_error(&format!("identity release failed: {}", err));
        }
        logging::log_game(&format!("{} leaves the world", entity.name()));
        entity.did_exit_world();
        self.notify(WorldEvent::CreatureDisappeared { id, position });
        Ok(())
    }

    /// Moves a creature to another tile.
    pub fn move_creature(
        &mut self,
        id: CreatureId,
        destination: Position,
        flags: QueryFlags,
    ) -> Result<(), ReturnValue> {
        let Some(entity) = self.registry.get(id) else {
            return Err(ReturnValue::NotPossible);
        };
        let from = entity.position();
        if from == destination {
            return Ok(());
        }
        TileCylinder(destination)
            .query_add_creature(self, entity.kind(), flags)
            .into_result()?;
        if self.map.tile(from).and_then(|tile| tile.creature) != Some(id) {
            return Err(ReturnValue::NotPossible);
        }

        if let Some(tile) = self.map.tile_mut(from) {
            tile.creature = None;
        }
        let Some(tile) = self.map.tile_mut(destination) else {
            panic!("destination tile {:?} disappeared", destination);
        };
        tile.creature = Some(id);
        if let Some(entity) = self.registry.get_mut(id) {
            entity.base_mut().position = destination;
        }
        self.notify(WorldEvent::CreatureMoved {
            id,
            from,
            to: destination,
        });
        Ok(())
    }

    /// Gives a player their depot locker, creating it on first use.
    pub fn player_depot(
        &mut self,
        player: CreatureId,
        depot_type: ItemTypeId,
    ) -> Result<ItemHandle, ReturnValue> {
        let existing = self
            .registry
            .player(player)
            .ok_or(ReturnValue::NotPossible)?
            .depot;
        if let Some(depot) = existing.filter(|depot| self.items.contains(*depot)) {
            return Ok(depot);
        }
        let is_depot = self
            .item_types
            .get(depot_type)
            .is_some_and(|item_type| item_type.is_depot());
        if !is_depot {
            return Err(ReturnValue::NotPossible);
        }
        let depot = self.create_item(depot_type, 1)?;
        if let Some(entry) = self.registry.player_mut(player) {
            entry.depot = Some(depot);
        }
        Ok(depot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::creature::{Monster, Npc};
    use crate::entities::identity::ENTITY_KINDS;
    use crate::world::notify::RecordingSink;
    use crate::world::testing::{fixture, types};
    use std::collections::HashSet;

    #[test]
    fn blocked_spot_places_creature_on_the_only_free_ring_tile() {
        let mut world = fixture();
        let centre = Position::new(10, 10, 7);
        let free = Position::new(13, 11, 7);
        for radius in 0..=10u16 {
            for position in centre.ring(radius) {
                if position != free && world.map.has_tile(position) {
                    world.place_item(position, types::WALL);
                }
            }
        }

        let id = world
            .add_creature(Entity::Monster(Monster::new("orc", 70)), centre, 10)
            .expect("placed");
        assert_eq!(id.kind(), Some(EntityKind::Monster));
        let entity = world.get_creature_by_id(id).expect("registered");
        assert_eq!(entity.position(), free);
        assert_eq!(world.map.tile(free).and_then(|tile| tile.creature), Some(id));
    }

    #[test]
    fn total_failure_reports_the_first_error_and_changes_nothing() {
        let mut world = fixture();
        let centre = Position::new(10, 10, 7);
        for radius in 0..=2u16 {
            for position in centre.ring(radius) {
                world.place_item(position, types::WALL);
            }
        }
        let result = world.add_creature(Entity::Npc(Npc::new("Sam")), centre, 2);
        assert_eq!(result, Err(ReturnValue::NotPossible));
        assert!(world.registry.is_empty());
        assert!(world.map.tiles.values().all(|tile| tile.creature.is_none()));
    }

    #[test]
    fn identities_stay_unique_and_recycle_after_removal() {
        let mut world = fixture();
        let mut live = HashSet::new();
        for n in 0..30u16 {
            let position = Position::new(n % 20, n / 20, 7);
            let id = world
                .add_creature(Entity::Monster(Monster::new("rat", 5)), position, 0)
                .expect("placed");
            assert!(live.insert(id));
        }
        let gone = *live.iter().next().expect("one id");
        world.remove_creature(gone).expect("removed");
        live.remove(&gone);
        assert!(world.get_creature_by_id(gone).is_none());
        assert_eq!(world.remove_creature(gone), Err(ReturnValue::NotPossible));

        let again = world
            .add_creature(Entity::Monster(Monster::new("rat", 5)), Position::new(19, 19, 7), 0)
            .expect("placed again");
        assert!(live.insert(again), "live identity handed out twice");
        assert_eq!(world.registry.count(EntityKind::Monster), live.len());
        for kind in ENTITY_KINDS {
            assert!(world
                .registry
                .ids(kind)
                .all(|id| id.kind() == Some(kind)));
        }
    }

    #[test]
    fn players_are_found_by_name_and_drop_their_items_on_logout() {
        let mut world = fixture();
        let sink = RecordingSink::new();
        world.set_sink(sink.clone());
        let id = world
            .add_creature(Entity::Player(Player::new("Alice", 1000)), Position::new(2, 2, 7), 0)
            .expect("placed");
        assert_eq!(world.registry.player_by_name("alice"), Some(id));

        let sword = world.create_item(types::SWORD, 1).expect("sword");
        assert!(world.player_add_item(id, sword, false).is_ok());
        world.remove_creature(id).expect("removed");
        assert!(world.item(sword).is_none());
        assert_eq!(world.registry.player_by_name("Alice"), None);
        assert!(world.map.tile(Position::new(2, 2, 7)).expect("tile").creature.is_none());
        let events = sink.events();
        assert!(events.contains(&WorldEvent::ItemReleased { item: sword }));
        assert!(matches!(
            events.last(),
            Some(WorldEvent::CreatureDisappeared { id: gone, .. }) if *gone == id
        ));
    }

    #[test]
    fn creatures_walk_between_free_tiles() {
        let mut world = fixture();
        let id = world
            .add_creature(Entity::Npc(Npc::new("Sam")), Position::new(3, 3, 7), 0)
            .expect("placed");
        world
            .move_creature(id, Position::new(3, 4, 7), QueryFlags::NONE)
            .expect("moved");
        assert_eq!(
            world.get_creature_by_id(id).map(Entity::position),
            Some(Position::new(3, 4, 7))
        );
        assert!(world.map.tile(Position::new(3, 3, 7)).expect("tile").creature.is_none());

        world.place_item(Position::new(3, 5, 7), types::WALL);
        assert_eq!(
            world.move_creature(id, Position::new(3, 5, 7), QueryFlags::NONE),
            Err(ReturnValue::NotPossible)
        );
    }
}
