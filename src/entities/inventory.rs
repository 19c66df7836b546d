use crate::world::arena::ItemHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventorySlot {
    Head,
    Necklace,
    Backpack,
    Armor,
    RightHand,
    LeftHand,
    Legs,
    Feet,
    Ring,
    Ammo,
}

impl InventorySlot {
    pub const COUNT: usize = 10;

    pub fn index(self) -> usize {
        match self {
            InventorySlot::Head => 0,
            InventorySlot::Necklace => 1,
            InventorySlot::Backpack => 2,
            InventorySlot::Armor => 3,
            InventorySlot::RightHand => 4,
            InventorySlot::LeftHand => 5,
            InventorySlot::Legs => 6,
            InventorySlot::Feet => 7,
            InventorySlot::Ring => 8,
            InventorySlot::Ammo => 9,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        INVENTORY_SLOTS.get(index).copied()
    }
}

pub const INVENTORY_SLOTS: [InventorySlot; InventorySlot::COUNT] = [
    InventorySlot::Head,
    InventorySlot::Necklace,
    InventorySlot::Backpack,
    InventorySlot::Armor,
    InventorySlot::RightHand,
    InventorySlot::LeftHand,
    InventorySlot::Legs,
    InventorySlot::Feet,
    InventorySlot::Ring,
    InventorySlot::Ammo,
];

/// Equipment slots of a player. Slots hold arena handles; the items
/// themselves live in the world's item arena.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    slots: [Option<ItemHandle>; InventorySlot::COUNT],
}

impl Inventory {
    pub fn slot(&self, slot: InventorySlot) -> Option<ItemHandle> {
        self.slots[slot.index()]
    }

    pub fn at(&self, index: usize) -> Option<ItemHandle> {
        self.slots.get(index).copied().flatten()
    }

    /// Puts `item` into an empty slot. Returns the previous occupant when the
    /// slot was already taken, leaving it untouched.
    pub fn set_slot(&mut self, slot: InventorySlot, item: ItemHandle) -> Result<(), ItemHandle> {
        let entry = &mut self.slots[slot.index()];
        match entry {
            Some(existing) => Err(*existing),
            None => {
                *entry = Some(item);
                Ok(())
            }
        }
    }

    pub fn replace_slot(&mut self, slot: InventorySlot, item: ItemHandle) -> Option<ItemHandle> {
        self.slots[slot.index()].replace(item)
    }

    pub fn clear_slot(&mut self, slot: InventorySlot) -> Option<ItemHandle> {
        self.slots[slot.index()].take()
    }

    pub fn position_of(&self, item: ItemHandle) -> Option<InventorySlot> {
        self.slots
            .iter()
            .position(|entry| *entry == Some(item))
            .and_then(InventorySlot::from_index)
    }

    /// Occupied slots in slot order.
    pub fn items(&self) -> impl Iterator<Item = (InventorySlot, ItemHandle)> + '_ {
        INVENTORY_SLOTS
            .iter()
            .filter_map(|slot| self.slot(*slot).map(|item| (*slot, item)))
    }

    pub fn take_all(&mut self) -> Vec<ItemHandle> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::{Item, ItemTypeId};
    use crate::world::arena::ItemArena;
    use crate::world::item_types::{ItemKind, ItemType};
    use std::sync::Arc;

    fn handles(count: usize) -> Vec<ItemHandle> {
        let kind = Arc::new(ItemType::new(ItemTypeId(1), "stone", ItemKind::Misc));
        let mut arena = ItemArena::new();
        (0..count)
            .map(|_| arena.insert(Item::new(Arc::clone(&kind), 1)))
            .collect()
    }

    #[test]
    fn slot_indices_roundtrip() {
        for (index, slot) in INVENTORY_SLOTS.iter().enumerate() {
            assert_eq!(slot.index(), index);
            assert_eq!(InventorySlot::from_index(index), Some(*slot));
        }
        assert_eq!(InventorySlot::from_index(InventorySlot::COUNT), None);
    }

    #[test]
    fn occupied_slots_report_their_occupant() {
        let items = handles(2);
        let mut inventory = Inventory::default();
        inventory
            .set_slot(InventorySlot::LeftHand, items[0])
            .expect("empty slot");
        assert_eq!(
            inventory.set_slot(InventorySlot::LeftHand, items[1]),
            Err(items[0])
        );
        assert_eq!(inventory.position_of(items[0]), Some(InventorySlot::LeftHand));
        assert_eq!(inventory.at(InventorySlot::LeftHand.index()), Some(items[0]));
        assert_eq!(inventory.clear_slot(InventorySlot::LeftHand), Some(items[0]));
        assert!(inventory.items().next().is_none());
    }
}
