#![warn(missing_docs)]
//! Per-pixel collision masks, destructible terrain and point-mass physics.

mod body;
mod mask;
pub mod stamps;

pub use body::{BodyDef, Contact, PhysicsBody, SimpleBody, StateError, StaticBody, REST_EPSILON};
pub use mask::CollisionMask;
