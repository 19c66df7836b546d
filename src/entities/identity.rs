use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// Identity of a creature in the world. The high bits select the entity kind,
/// so a bare id tells whether it belongs to a player, a monster or an npc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CreatureId(pub u32);

impl CreatureId {
    /// Sentinel carried by entities that are not in the world.
    pub const NONE: Self = CreatureId(0);

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }

    pub fn kind(self) -> Option<EntityKind> {
        EntityKind::from_id(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Monster,
    Npc,
}

pub const ENTITY_KINDS: [EntityKind; 3] = [EntityKind::Player, EntityKind::Monster, EntityKind::Npc];

impl EntityKind {
    pub const fn range_start(self) -> u32 {
        match self {
            EntityKind::Player => 0x1000_0000,
            EntityKind::Monster => 0x4000_0000,
            EntityKind::Npc => 0x8000_0000,
        }
    }

    /// Exclusive upper bound of the kind's id range.
    pub const fn range_end(self) -> u32 {
        match self {
            EntityKind::Player => 0x4000_0000,
            EntityKind::Monster => 0x8000_0000,
            EntityKind::Npc => 0xC000_0000,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        ENTITY_KINDS
            .into_iter()
            .find(|kind| id >= kind.range_start() && id < kind.range_end())
    }

    pub fn index(self) -> usize {
        match self {
            EntityKind::Player => 0,
            EntityKind::Monster => 1,
            EntityKind::Npc => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity range {start:#010x}..{end:#010x} exhausted")]
    Exhausted { start: u32, end: u32 },
    #[error("identity {0:#010x} is outside the allocator range")]
    OutOfRange(u32),
    #[error("identity {0:#010x} is not allocated")]
    NotAllocated(u32),
}

/// Hands out identities from a fixed sub-range. Fresh ids are used first;
/// released ids are only handed out again once the fresh part of the range
/// is used up, oldest release first.
#[derive(Debug, Clone)]
pub struct IdRangeAllocator {
    start: u32,
    end: u32,
    next: u32,
    released: VecDeque<u32>,
    live: HashSet<u32>,
}

impl IdRangeAllocator {
    pub fn for_kind(kind: EntityKind) -> Self {
        Self::with_range(kind.range_start(), kind.range_end())
    }

    pub fn with_range(start: u32, end: u32) -> Self {
        let start = start.max(1);
        Self {
            start,
            end: end.max(start),
            next: start,
            released: VecDeque::new(),
            live: HashSet::new(),
        }
    }

    pub fn allocate(&mut self) -> Result<u32, IdentityError> {
        let id = if self.next < self.end {
            let id = self.next;
            self.next += 1;
            id
        } else if let Some(id) = self.released.pop_front() {
            id
        } else {
            return Err(IdentityError::Exhausted {
                start: self.start,
                end: self.end,
            });
        };
        self.live.insert(id);
        Ok(id)
    }

    pub fn release(&mut self, id: u32) -> Result<(), IdentityError> {
        if !self.contains(id) {
            return Err(IdentityError::OutOfRange(id));
        }
        if !self.is_live(id) {
            return Err(IdentityError::NotAllocated(id));
        }
        self.live.remove(&id);
        self.released.push_back(id);
        Ok(())
    }

    pub fn contains(&self, id: u32) -> bool {
        id >= self.start && id < self.end
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.live.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_reveal_their_kind() {
        let mut players = IdRangeAllocator::for_kind(EntityKind::Player);
        let mut monsters = IdRangeAllocator::for_kind(EntityKind::Monster);
        let mut npcs = IdRangeAllocator::for_kind(EntityKind::Npc);

        let player = CreatureId(players.allocate().expect("player id"));
        let monster = CreatureId(monsters.allocate().expect("monster id"));
        let npc = CreatureId(npcs.allocate().expect("npc id"));

        assert_eq!(player.kind(), Some(EntityKind::Player));
        assert_eq!(monster.kind(), Some(EntityKind::Monster));
        assert_eq!(npc.kind(), Some(EntityKind::Npc));
        assert_eq!(CreatureId::NONE.kind(), None);
        assert!(!CreatureId::NONE.is_assigned());
    }

    #[test]
    fn released_ids_come_back_after_fresh_ones_run_out() {
        let mut ids = IdRangeAllocator::with_range(10, 13);
        let a = ids.allocate().expect("a");
        let b = ids.allocate().expect("b");
        ids.release(a).expect("release a");
        let c = ids.allocate().expect("c");
        assert_eq!((a, b, c), (10, 11, 12));

        let d = ids.allocate().expect("recycled");
        assert_eq!(d, a);
        assert_eq!(
            ids.allocate(),
            Err(IdentityError::Exhausted { start: 10, end: 13 })
        );
    }

    #[test]
    fn live_ids_are_never_handed_out_twice() {
        let mut ids = IdRangeAllocator::with_range(1, 5);
        let mut live = HashSet::new();
        for round in 0..40 {
            if round % 3 == 2 {
                let victim = *live.iter().next().expect("live id");
                live.remove(&victim);
                ids.release(victim).expect("release");
            } else if let Ok(id) = ids.allocate() {
                assert!(live.insert(id), "id {} handed out twice", id);
            }
        }
        assert_eq!(ids.live_count(), live.len());
    }

    #[test]
    fn release_rejects_foreign_and_double_release() {
        let mut ids = IdRangeAllocator::for_kind(EntityKind::Monster);
        let id = ids.allocate().expect("id");
        assert_eq!(
            ids.release(EntityKind::Player.range_start()),
            Err(IdentityError::OutOfRange(EntityKind::Player.range_start()))
        );
        assert!(ids.is_live(id));
        ids.release(id).expect("first release");
        assert!(!ids.is_live(id));
        assert_eq!(ids.release(id), Err(IdentityError::NotAllocated(id)));
    }
}
