pub mod creature;
pub mod identity;
pub mod inventory;
pub mod item;
pub mod player;
