pub mod arena;
pub mod cylinder;
pub mod decay;
pub mod engine;
pub mod item_types;
pub mod mail;
pub mod map;
pub mod notify;
pub mod position;
pub mod registry;
pub mod return_value;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;
