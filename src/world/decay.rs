use crate::entities::item::DecayState;
use crate::telemetry::logging::log_error;
use crate::world::arena::ItemHandle;
use crate::world::cylinder::QueryFlags;
use crate::world::state::WorldState;
use std::time::Duration;

impl WorldState {
    /// Schedules the decay of `item` when its kind decays. Returns whether a
    /// decay is now pending.
    pub fn start_decaying(&mut self, item: ItemHandle) -> bool {
        let Some(entry) = self.items.get(item) else {
            return false;
        };
        if entry.attributes.decay == DecayState::Pending {
            return true;
        }
        let Some(delay) = entry.item_type.decay_ms else {
            return false;
        };
        let Some(scheduler) = self.scheduler() else {
            return false;
        };
        let scheduled = scheduler.schedule(Duration::from_millis(delay), move |world: &mut WorldState| {
            world.complete_decay(item);
        });
        let task = match scheduled {
            Ok(task) => task,
            Err(err) => {
                log_error(&format!("decay of {:?} not scheduled: {}", item, err));
                return false;
            }
        };
        let entry = self.expect_item_mut(item);
        entry.attributes.decay = DecayState::Pending;
        entry.attributes.decay_task = Some(task);
        true
    }

    /// Cancels a pending decay. The item keeps its current kind.
    pub fn stop_decaying(&mut self, item: ItemHandle) -> bool {
        let Some(entry) = self.items.get_mut(item) else {
            return false;
        };
        if entry.attributes.decay != DecayState::Pending {
            return false;
        }
        entry.attributes.decay = DecayState::Stopped;
        let task = entry.attributes.decay_task.take();
        if let (Some(task), Some(scheduler)) = (task, self.scheduler()) {
            scheduler.cancel(task);
        }
        true
    }

    /// Runs when a decay timer fires. A released or no longer pending item
    /// makes this a no-op.
    pub(crate) fn complete_decay(&mut self, item: ItemHandle) {
        let Some(entry) = self.items.get_mut(item) else {
            return;
        };
        if entry.attributes.decay != DecayState::Pending {
            return;
        }
        entry.attributes.decay = DecayState::None;
        entry.attributes.decay_task = None;
        let target = entry.item_type.decay_to;
        let placed = entry.parent.is_some();
        let count = entry.count;

        match target {
            Some(next) => {
                if let Err(err) = self.transform_item(item, next, None) {
                    log_error(&format!("decay of {:?} into {:?} failed: {}", item, next, err));
                }
            }
            None if placed => {
                let ret = self.remove_item(None, item, count, QueryFlags::NONE);
                if !ret.is_ok() {
                    log_error(&format!("decayed item {:?} not removed: {}", item, ret));
                }
            }
            None => self.release_item(item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::position::Position;
    use crate::world::return_value::ReturnValue;
    use crate::world::testing::{fixture, types};

    #[test]
    fn decay_needs_a_scheduler() {
        let mut world = fixture();
        let torch = world.place_item(Position::new(3, 3, 7), types::TORCH);
        assert!(!world.start_decaying(torch));
        assert_eq!(
            world.item(torch).map(|entry| entry.attributes.decay),
            Some(DecayState::None)
        );
    }

    #[test]
    fn completed_decay_transforms_or_removes() {
        let mut world = fixture();
        let at = Position::new(4, 3, 7);
        let torch = world.place_item(at, types::TORCH);
        let ember = world.place_item(at, types::EMBER);
        for item in [torch, ember] {
            world.expect_item_mut(item).attributes.decay = DecayState::Pending;
        }

        world.complete_decay(torch);
        assert_eq!(world.item(torch).map(|entry| entry.type_id()), Some(types::BURNT_TORCH));
        assert_eq!(
            world.item(torch).map(|entry| entry.attributes.decay),
            Some(DecayState::None)
        );

        world.complete_decay(ember);
        assert!(world.item(ember).is_none());
        assert_eq!(world.map.tile(at).expect("tile").items, vec![torch]);
    }

    #[test]
    fn stopped_or_stale_decay_does_nothing() {
        let mut world = fixture();
        let at = Position::new(5, 3, 7);
        let torch = world.place_item(at, types::TORCH);
        world.expect_item_mut(torch).attributes.decay = DecayState::Pending;
        assert!(world.stop_decaying(torch));
        world.complete_decay(torch);
        assert_eq!(world.item(torch).map(|entry| entry.type_id()), Some(types::TORCH));

        let ember = world.place_item(at, types::EMBER);
        world.expect_item_mut(ember).attributes.decay = DecayState::Pending;
        assert_eq!(world.remove_item(None, ember, 1, QueryFlags::NONE), ReturnValue::NoError);
        world.complete_decay(ember);
        assert!(world.item(ember).is_none());
    }
}
