use crate::entities::item::Item;
use crate::world::cylinder::CylinderId;

/// Stable handle to an item in the arena. The generation makes handles to
/// released items fail lookups instead of aliasing a newer item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    item: Option<Item>,
}

/// Owns every live item instance. Containers refer to their children by
/// handle and children point back through `Item::parent`.
#[derive(Debug, Default)]
pub struct ItemArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl ItemArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: Item) -> ItemHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.item = Some(item);
            return ItemHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            item: Some(item),
        });
        ItemHandle {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, handle: ItemHandle) -> Option<&Item> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.item.as_ref())
    }

    pub fn get_mut(&mut self, handle: ItemHandle) -> Option<&mut Item> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.item.as_mut())
    }

    pub fn contains(&self, handle: ItemHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes a single item. Its contents are left in the arena; use
    /// [`ItemArena::remove_tree`] to drop a container with everything inside.
    pub fn remove(&mut self, handle: ItemHandle) -> Option<Item> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let item = slot.item.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(item)
    }

    /// Removes an item and all of its nested contents, returning every
    /// removed handle, the root first.
    pub fn remove_tree(&mut self, handle: ItemHandle) -> Vec<ItemHandle> {
        let mut removed = Vec::new();
        let mut pending = vec![handle];
        while let Some(next) = pending.pop() {
            if let Some(item) = self.remove(next) {
                removed.push(next);
                pending.extend(item.contents);
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn count(&self, handle: ItemHandle) -> u16 {
        self.get(handle).map_or(0, |item| item.count)
    }

    /// Weight of an item including everything nested inside it.
    pub fn total_weight(&self, handle: ItemHandle) -> u32 {
        let mut total = 0u32;
        let mut pending = vec![handle];
        while let Some(next) = pending.pop() {
            if let Some(item) = self.get(next) {
                total = total.saturating_add(item.weight_for(item.count));
                pending.extend(item.contents.iter().copied());
            }
        }
        total
    }

    /// Number of item instances in the tree rooted at `handle`.
    pub fn tree_size(&self, handle: ItemHandle) -> u32 {
        let mut total = 0u32;
        let mut pending = vec![handle];
        while let Some(next) = pending.pop() {
            if let Some(item) = self.get(next) {
                total += 1;
                pending.extend(item.contents.iter().copied());
            }
        }
        total
    }

    /// Cylinders above `start`, nearest first, following item back-references
    /// until a non-item cylinder (tile or inventory) is reached. At most
    /// `limit` steps are taken.
    pub fn ancestors(&self, start: CylinderId, limit: usize) -> Vec<CylinderId> {
        let mut chain = Vec::new();
        let mut current = start;
        for _ in 0..limit {
            let Some(handle) = current.item_handle() else {
                break;
            };
            let Some(parent) = self.get(handle).and_then(|item| item.parent) else {
                break;
            };
            chain.push(parent);
            current = parent;
        }
        chain
    }
}
