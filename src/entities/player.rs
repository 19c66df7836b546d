use crate::entities::creature::CreatureBase;
use crate::entities::inventory::Inventory;
use crate::world::arena::ItemHandle;
use std::collections::BTreeMap;

pub const MAX_OPEN_CONTAINERS: u8 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub base: CreatureBase,
    pub inventory: Inventory,
    /// Carrying capacity in weight units.
    pub capacity: u32,
    /// The player's depot locker. It is not placed on the map.
    pub depot: Option<ItemHandle>,
    pub open_containers: BTreeMap<u8, ItemHandle>,
}

impl Player {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            base: CreatureBase::new(name, 150),
            inventory: Inventory::default(),
            capacity,
            depot: None,
            open_containers: BTreeMap::new(),
        }
    }

    pub fn next_container_id(&self) -> Option<u8> {
        (0..MAX_OPEN_CONTAINERS).find(|id| !self.open_containers.contains_key(id))
    }

    pub fn open_container(&mut self, container: ItemHandle) -> Result<u8, String> {
        if let Some((id, _)) = self
            .open_containers
            .iter()
            .find(|(_, open)| **open == container)
        {
            return Ok(*id);
        }
        let id = self
            .next_container_id()
            .ok_or_else(|| "too many open containers".to_string())?;
        self.open_containers.insert(id, container);
        Ok(id)
    }

    pub fn close_container(&mut self, container_id: u8) -> bool {
        self.open_containers.remove(&container_id).is_some()
    }

    /// Closes every open window showing `container`.
    pub fn forget_container(&mut self, container: ItemHandle) {
        self.open_containers.retain(|_, open| *open != container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::{Item, ItemTypeId};
    use crate::world::arena::ItemArena;
    use crate::world::item_types::{ItemKind, ItemType};
    use std::sync::Arc;

    #[test]
    fn open_containers_reuse_ids() {
        let kind = Arc::new(ItemType::new(ItemTypeId(1), "bag", ItemKind::Container));
        let mut arena = ItemArena::new();
        let bag = arena.insert(Item::new(Arc::clone(&kind), 1));
        let pouch = arena.insert(Item::new(kind, 1));

        let mut player = Player::new("Alice", 400);
        assert_eq!(player.open_container(bag), Ok(0));
        assert_eq!(player.open_container(bag), Ok(0));
        assert_eq!(player.open_container(pouch), Ok(1));
        assert!(player.close_container(0));
        assert_eq!(player.next_container_id(), Some(0));
        player.forget_container(pouch);
        assert!(player.open_containers.is_empty());
    }
}
