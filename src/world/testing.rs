//! Shared fixtures for the world tests: a small walkable map and a catalogue
//! of item kinds covering every cylinder behaviour.

use crate::entities::creature::Entity;
use crate::entities::identity::CreatureId;
use crate::entities::inventory::InventorySlot;
use crate::entities::item::ItemTypeId;
use crate::entities::player::Player;
use crate::world::arena::ItemHandle;
use crate::world::cylinder::{Cylinder, CylinderId, SlotIndex};
use crate::world::item_types::{ItemKind, ItemType, ItemTypeIndex};
use crate::world::position::Position;
use crate::world::state::{WorldLimits, WorldState};

pub const MAP_SIZE: u16 = 20;
pub const FLOOR: u8 = 7;
pub const SPAWN: Position = Position::new(10, 10, FLOOR);

pub mod types {
    use crate::entities::item::ItemTypeId;

    pub const GROUND: ItemTypeId = ItemTypeId(100);
    pub const BACKPACK: ItemTypeId = ItemTypeId(200);
    pub const POUCH: ItemTypeId = ItemTypeId(201);
    pub const GOLD: ItemTypeId = ItemTypeId(300);
    pub const SWORD: ItemTypeId = ItemTypeId(310);
    pub const SHIELD: ItemTypeId = ItemTypeId(311);
    pub const HELMET: ItemTypeId = ItemTypeId(312);
    pub const WALL: ItemTypeId = ItemTypeId(400);
    pub const CRATE: ItemTypeId = ItemTypeId(401);
    pub const TRASH: ItemTypeId = ItemTypeId(500);
    pub const MAILBOX: ItemTypeId = ItemTypeId(510);
    pub const LETTER: ItemTypeId = ItemTypeId(520);
    pub const STAMPED_LETTER: ItemTypeId = ItemTypeId(521);
    pub const DEPOT: ItemTypeId = ItemTypeId(600);
    pub const TORCH: ItemTypeId = ItemTypeId(700);
    pub const BURNT_TORCH: ItemTypeId = ItemTypeId(701);
    pub const EMBER: ItemTypeId = ItemTypeId(702);
}

fn kind(id: ItemTypeId, name: &str, kind: ItemKind, weight: u32) -> ItemType {
    let mut item_type = ItemType::new(id, name, kind);
    item_type.weight = weight;
    item_type
}

pub fn item_types() -> ItemTypeIndex {
    let mut index = ItemTypeIndex::default();

    let mut backpack = kind(types::BACKPACK, "backpack", ItemKind::Container, 180);
    backpack.body_slot = Some(InventorySlot::Backpack);
    let mut pouch = kind(types::POUCH, "pouch", ItemKind::Container, 50);
    pouch.container_capacity = Some(2);
    let mut gold = kind(types::GOLD, "gold coin", ItemKind::Misc, 10);
    gold.stackable = true;
    let mut helmet = kind(types::HELMET, "leather helmet", ItemKind::Misc, 150);
    helmet.body_slot = Some(InventorySlot::Head);
    let mut wall = kind(types::WALL, "stone wall", ItemKind::Misc, 0);
    wall.blocking = true;
    wall.moveable = false;
    wall.pickupable = false;
    let mut crate_box = kind(types::CRATE, "crate", ItemKind::Misc, 1000);
    crate_box.blocking = true;
    crate_box.pickupable = false;
    let mut letter = kind(types::LETTER, "letter", ItemKind::Mail, 5);
    letter.stamped = Some(types::STAMPED_LETTER);
    let mut torch = kind(types::TORCH, "lit torch", ItemKind::Misc, 50);
    torch.decay_to = Some(types::BURNT_TORCH);
    torch.decay_ms = Some(40);
    let mut ember = kind(types::EMBER, "ember", ItemKind::Misc, 1);
    ember.decay_ms = Some(20);

    for item_type in [
        kind(types::GROUND, "grass", ItemKind::Ground, 0),
        backpack,
        pouch,
        gold,
        kind(types::SWORD, "sword", ItemKind::Misc, 200),
        kind(types::SHIELD, "wooden shield", ItemKind::Misc, 100),
        helmet,
        wall,
        crate_box,
        kind(types::TRASH, "trash can", ItemKind::TrashHolder, 0),
        kind(types::MAILBOX, "mailbox", ItemKind::Mailbox, 0),
        letter,
        kind(types::STAMPED_LETTER, "stamped letter", ItemKind::Mail, 5),
        kind(types::DEPOT, "depot chest", ItemKind::Depot, 0),
        torch,
        kind(types::BURNT_TORCH, "burnt torch", ItemKind::Misc, 30),
        ember,
    ] {
        index.insert(item_type).expect("unique item type");
    }
    index
}

/// A `MAP_SIZE` square of grass on one floor, with a fixed placement seed.
pub fn fixture() -> WorldState {
    let mut world = WorldState::new(item_types(), WorldLimits::default());
    world.seed_rng(7);
    for x in 0..MAP_SIZE {
        for y in 0..MAP_SIZE {
            let position = Position::new(x, y, FLOOR);
            world.map.create_tile(position);
            world.place_item(position, types::GROUND);
        }
    }
    world
}

/// `fixture()` with a player called Alice standing on `SPAWN`.
pub fn fixture_with_player(capacity: u32) -> (WorldState, CreatureId) {
    let mut world = fixture();
    let id = world
        .add_creature(Entity::Player(Player::new("Alice", capacity)), SPAWN, 0)
        .expect("player placed");
    (world, id)
}

impl WorldState {
    /// Puts a new item on a tile without asking the tile first.
    pub fn place_item(&mut self, position: Position, type_id: ItemTypeId) -> ItemHandle {
        self.place_stack(position, type_id, 1)
    }

    pub fn place_stack(&mut self, position: Position, type_id: ItemTypeId, count: u16) -> ItemHandle {
        let item = self.create_item(type_id, count).expect("known item type");
        CylinderId::Tile(position).add_thing(self, SlotIndex::Wherever, item);
        item
    }
}
