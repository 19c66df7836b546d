use crate::entities::inventory::InventorySlot;
use crate::entities::item::ItemTypeId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Ground,
    Container,
    Depot,
    Mailbox,
    TrashHolder,
    Mail,
    Misc,
}

/// Shared, immutable description of an item type. Instances hold it by
/// `Arc` and only carry their own count and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemType {
    pub id: ItemTypeId,
    pub name: String,
    pub kind: ItemKind,
    pub stackable: bool,
    pub pickupable: bool,
    pub moveable: bool,
    pub blocking: bool,
    pub container_capacity: Option<u16>,
    pub weight: u32,
    pub body_slot: Option<InventorySlot>,
    pub decay_to: Option<ItemTypeId>,
    pub decay_ms: Option<u64>,
    pub stamped: Option<ItemTypeId>,
}

impl ItemType {
    pub fn new(id: ItemTypeId, name: impl Into<String>, kind: ItemKind) -> Self {
        let container_capacity = match kind {
            ItemKind::Container => Some(20),
            ItemKind::Depot => Some(30),
            _ => None,
        };
        let fixed = matches!(
            kind,
            ItemKind::Ground | ItemKind::Mailbox | ItemKind::TrashHolder
        );
        Self {
            id,
            name: name.into(),
            kind,
            stackable: false,
            pickupable: !fixed,
            moveable: !fixed,
            blocking: false,
            container_capacity,
            weight: 0,
            body_slot: None,
            decay_to: None,
            decay_ms: None,
            stamped: None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.container_capacity.is_some()
    }

    pub fn is_ground(&self) -> bool {
        self.kind == ItemKind::Ground
    }

    pub fn is_depot(&self) -> bool {
        self.kind == ItemKind::Depot
    }

    pub fn is_mail(&self) -> bool {
        self.kind == ItemKind::Mail
    }

    pub fn can_decay(&self) -> bool {
        self.decay_ms.is_some()
    }

    /// Whether the type may be worn in `slot`. Hands and the ammo slot take
    /// anything; the remaining slots require a matching body position.
    pub fn fits_slot(&self, slot: InventorySlot) -> bool {
        match slot {
            InventorySlot::RightHand | InventorySlot::LeftHand | InventorySlot::Ammo => true,
            other => self.body_slot == Some(other),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ItemTypeIndex {
    types: HashMap<ItemTypeId, Arc<ItemType>>,
}

impl ItemTypeIndex {
    pub fn get(&self, id: ItemTypeId) -> Option<&Arc<ItemType>> {
        self.types.get(&id)
    }

    pub fn insert(&mut self, item: ItemType) -> Result<(), String> {
        if self.types.contains_key(&item.id) {
            return Err(format!("item type {:?} already exists", item.id));
        }
        self.types.insert(item.id, Arc::new(item));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_type_ids_are_rejected() {
        let mut index = ItemTypeIndex::default();
        index
            .insert(ItemType::new(ItemTypeId(1), "stone", ItemKind::Misc))
            .expect("first insert");
        let err = index
            .insert(ItemType::new(ItemTypeId(1), "pebble", ItemKind::Misc))
            .expect_err("duplicate insert");
        assert!(err.contains("already exists"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn fixed_kinds_are_not_moveable() {
        let ground = ItemType::new(ItemTypeId(2), "grass", ItemKind::Ground);
        let trash = ItemType::new(ItemTypeId(3), "dustbin", ItemKind::TrashHolder);
        let bag = ItemType::new(ItemTypeId(4), "bag", ItemKind::Container);
        assert!(!ground.moveable && !ground.pickupable);
        assert!(!trash.moveable);
        assert!(bag.moveable && bag.is_container());
    }

    #[test]
    fn body_slots_restrict_equipment() {
        let mut helmet = ItemType::new(ItemTypeId(5), "helmet", ItemKind::Misc);
        helmet.body_slot = Some(InventorySlot::Head);
        assert!(helmet.fits_slot(InventorySlot::Head));
        assert!(helmet.fits_slot(InventorySlot::LeftHand));
        assert!(!helmet.fits_slot(InventorySlot::Feet));
    }
}
