use crate::config::CoreConfig;
use crate::dispatch::scheduler::SchedulerHandle;
use crate::entities::creature::Entity;
use crate::entities::identity::CreatureId;
use crate::entities::item::{Item, ItemTypeId};
use crate::world::arena::{ItemArena, ItemHandle};
use crate::world::cylinder::CylinderId;
use crate::world::item_types::ItemTypeIndex;
use crate::world::map::Map;
use crate::world::notify::{NotificationSink, NullSink, WorldEvent};
use crate::world::registry::EntityRegistry;
use crate::world::return_value::ReturnValue;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldLimits {
    pub placement_radius: u16,
    pub max_destination_depth: usize,
    pub max_container_depth: usize,
    pub depot_item_limit: u32,
}

impl Default for WorldLimits {
    fn default() -> Self {
        Self {
            placement_radius: 10,
            max_destination_depth: 16,
            max_container_depth: 16,
            depot_item_limit: 2000,
        }
    }
}

impl From<&CoreConfig> for WorldLimits {
    fn from(config: &CoreConfig) -> Self {
        Self {
            placement_radius: config.placement_radius,
            max_destination_depth: config.max_destination_depth,
            max_container_depth: config.max_container_depth,
            depot_item_limit: config.depot_item_limit,
        }
    }
}

/// All mutable world state. It lives on the dispatcher thread and is only
/// ever touched from tasks running there.
pub struct WorldState {
    pub map: Map,
    pub items: ItemArena,
    pub item_types: ItemTypeIndex,
    pub registry: EntityRegistry,
    pub limits: WorldLimits,
    pub(crate) rng: StdRng,
    sink: Box<dyn NotificationSink>,
    scheduler: Option<SchedulerHandle<WorldState>>,
}

impl WorldState {
    pub fn new(item_types: ItemTypeIndex, limits: WorldLimits) -> Self {
        Self {
            map: Map::default(),
            items: ItemArena::new(),
            item_types,
            registry: EntityRegistry::new(),
            limits,
            rng: StdRng::from_entropy(),
            sink: Box::new(NullSink),
            scheduler: None,
        }
    }

    /// Makes placement searches reproducible.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn set_sink(&mut self, sink: impl NotificationSink + 'static) {
        self.sink = Box::new(sink);
    }

    pub(crate) fn notify(&mut self, event: WorldEvent) {
        self.sink.notify(&event);
    }

    pub fn attach_scheduler(&mut self, scheduler: SchedulerHandle<WorldState>) {
        self.scheduler = Some(scheduler);
    }

    pub fn detach_scheduler(&mut self) -> Option<SchedulerHandle<WorldState>> {
        self.scheduler.take()
    }

    pub fn scheduler(&self) -> Option<&SchedulerHandle<WorldState>> {
        self.scheduler.as_ref()
    }

    /// Creates a free item, not yet placed in any cylinder.
    pub fn create_item(&mut self, type_id: ItemTypeId, count: u16) -> Result<ItemHandle, ReturnValue> {
        let item_type = self
            .item_types
            .get(type_id)
            .ok_or(ReturnValue::NotPossible)?;
        Ok(self.items.insert(Item::new(Arc::clone(item_type), count)))
    }

    pub fn item(&self, item: ItemHandle) -> Option<&Item> {
        self.items.get(item)
    }

    pub(crate) fn expect_item(&self, item: ItemHandle) -> &Item {
        match self.items.get(item) {
            Some(entry) => entry,
            None => panic!("item {:?} vanished during a transaction", item),
        }
    }

    pub(crate) fn expect_item_mut(&mut self, item: ItemHandle) -> &mut Item {
        match self.items.get_mut(item) {
            Some(entry) => entry,
            None => panic!("item {:?} vanished during a transaction", item),
        }
    }

    /// Destroys a detached item and everything inside it. Pending decay is
    /// cancelled and every destroyed instance is reported once.
    pub fn release_item(&mut self, item: ItemHandle) {
        if let Some(scheduler) = self.scheduler.as_ref() {
            let mut pending = vec![item];
            while let Some(next) = pending.pop() {
                if let Some(entry) = self.items.get(next) {
                    if let Some(task) = entry.attributes.decay_task {
                        scheduler.cancel(task);
                    }
                    pending.extend(entry.contents.iter().copied());
                }
            }
        }
        for released in self.items.remove_tree(item) {
            self.registry.forget_container(released);
            self.notify(WorldEvent::ItemReleased { item: released });
        }
    }

    /// The outermost cylinder holding `item`: a tile, an inventory, or a
    /// container that is not placed anywhere (such as a depot).
    pub fn item_root(&self, item: ItemHandle) -> Option<CylinderId> {
        let start = CylinderId::Container(item);
        self.items
            .ancestors(start, self.limits.max_container_depth)
            .last()
            .copied()
    }

    /// The cylinder that has the final say on adds into `cylinder`: the
    /// carrying player's inventory, or the outermost container that is not
    /// lying on a tile.
    pub(crate) fn owner_root(&self, cylinder: CylinderId) -> CylinderId {
        let chain = self
            .items
            .ancestors(cylinder, self.limits.max_container_depth);
        let mut root = cylinder;
        for ancestor in chain {
            match ancestor {
                CylinderId::Tile(_) => break,
                CylinderId::Inventory(_) => return ancestor,
                other => root = other,
            }
        }
        root
    }

    /// Weight of everything a player carries.
    pub fn carried_weight(&self, player: CreatureId) -> u32 {
        self.registry.player(player).map_or(0, |player| {
            player
                .inventory
                .items()
                .map(|(_, item)| self.items.total_weight(item))
                .fold(0u32, u32::saturating_add)
        })
    }

    pub fn get_creature_by_id(&self, id: CreatureId) -> Option<&Entity> {
        self.registry.get(id)
    }
}
