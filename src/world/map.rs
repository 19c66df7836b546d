use crate::entities::identity::CreatureId;
use crate::world::arena::ItemHandle;
use crate::world::position::Position;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub position: Position,
    pub protection_zone: bool,
    pub no_logout: bool,
    pub ground: Option<ItemHandle>,
    /// Items lying on the ground, topmost first.
    pub items: Vec<ItemHandle>,
    pub creature: Option<CreatureId>,
}

impl Tile {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            protection_zone: false,
            no_logout: false,
            ground: None,
            items: Vec::new(),
            creature: None,
        }
    }

    /// Items in index order: the ground first, then the stack from the top.
    pub fn things(&self) -> impl Iterator<Item = ItemHandle> + '_ {
        self.ground.into_iter().chain(self.items.iter().copied())
    }

    pub fn index_of(&self, item: ItemHandle) -> Option<usize> {
        self.things().position(|thing| thing == item)
    }

    pub fn item_at(&self, index: usize) -> Option<ItemHandle> {
        self.things().nth(index)
    }

    pub fn item_count(&self) -> usize {
        self.items.len() + usize::from(self.ground.is_some())
    }

    pub fn top_item(&self) -> Option<ItemHandle> {
        self.items.first().copied()
    }

    /// Detaches `item` from the ground slot or the item stack.
    pub fn detach(&mut self, item: ItemHandle) -> bool {
        if self.ground == Some(item) {
            self.ground = None;
            return true;
        }
        match self.items.iter().position(|entry| *entry == item) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Map {
    pub tiles: HashMap<Position, Tile>,
}

impl Map {
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn has_tile(&self, position: Position) -> bool {
        self.tiles.contains_key(&position)
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.tiles.get(&position)
    }

    pub fn tile_mut(&mut self, position: Position) -> Option<&mut Tile> {
        self.tiles.get_mut(&position)
    }

    /// Returns the tile at `position`, creating an empty one if needed.
    pub fn create_tile(&mut self, position: Position) -> &mut Tile {
        self.tiles
            .entry(position)
            .or_insert_with(|| Tile::new(position))
    }
}
