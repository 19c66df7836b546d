use crate::entities::identity::{CreatureId, EntityKind};
use crate::entities::player::Player;
use crate::world::position::Position;

/// State shared by every creature regardless of kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatureBase {
    pub id: CreatureId,
    pub name: String,
    pub position: Position,
    pub health: u32,
    pub max_health: u32,
    pub in_world: bool,
}

impl CreatureBase {
    pub fn new(name: impl Into<String>, max_health: u32) -> Self {
        Self {
            id: CreatureId::NONE,
            name: name.into(),
            position: Position::new(0, 0, 0),
            health: max_health,
            max_health,
            in_world: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monster {
    pub base: CreatureBase,
    /// Spawn point the monster returns to; `None` for summoned monsters.
    pub spawn: Option<Position>,
}

impl Monster {
    pub fn new(name: impl Into<String>, max_health: u32) -> Self {
        Self {
            base: CreatureBase::new(name, max_health),
            spawn: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Npc {
    pub base: CreatureBase,
    pub focus: Option<CreatureId>,
}

impl Npc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: CreatureBase::new(name, 100),
            focus: None,
        }
    }
}

/// Closed set of creature kinds. The registry matches on it once when a
/// creature enters and keeps kind-specific indexes from then on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Player(Player),
    Monster(Monster),
    Npc(Npc),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Player(_) => EntityKind::Player,
            Entity::Monster(_) => EntityKind::Monster,
            Entity::Npc(_) => EntityKind::Npc,
        }
    }

    pub fn base(&self) -> &CreatureBase {
        match self {
            Entity::Player(player) => &player.base,
            Entity::Monster(monster) => &monster.base,
            Entity::Npc(npc) => &npc.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut CreatureBase {
        match self {
            Entity::Player(player) => &mut player.base,
            Entity::Monster(monster) => &mut monster.base,
            Entity::Npc(npc) => &mut npc.base,
        }
    }

    pub fn id(&self) -> CreatureId {
        self.base().id
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn position(&self) -> Position {
        self.base().position
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Entity::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match self {
            Entity::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn will_enter_world(&mut self, id: CreatureId, position: Position) {
        let base = self.base_mut();
        base.id = id;
        base.position = position;
    }

    pub fn did_enter_world(&mut self) {
        if let Entity::Monster(monster) = self {
            if monster.spawn.is_none() {
                monster.spawn = Some(monster.base.position);
            }
        }
        self.base_mut().in_world = true;
    }

    pub fn will_exit_world(&mut self) {
        if let Entity::Npc(npc) = self {
            npc.focus = None;
        }
    }

    pub fn did_exit_world(&mut self) {
        let base = self.base_mut();
        base.in_world = false;
        base.id = CreatureId::NONE;
    }
}
