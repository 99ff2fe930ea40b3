#![warn(missing_docs)]
//! Deterministic turn-based battle simulation: entities, spells, damage
//! resolution, destructible terrain world and the turn/element state machine.

pub mod damage;
pub mod entity;
mod error;
pub mod manager;
pub mod player;
pub mod spell;
pub mod world;

pub use error::SimError;
pub use manager::{Manager, TurnConfig, TurnEvent, TurnState};
pub use world::{World, WorldEvent};
