//! Spawnable simulation objects.
//!
//! Entities are stored in the world keyed by id and dispatched through one
//! exhaustive enum: adding a kind is a type-checked change, not a runtime
//! registration.

pub(crate) mod character;
mod fireball;
mod item;
mod sword;

pub use character::Character;
pub use fireball::Fireball;
pub use item::{random_item, MagicScroll, Potion, PotionKind};
pub use sword::Sword;

use crate::error::SimError;
use crate::world::World;
use manastorm_collision::PhysicsBody;
use manastorm_core::{EntityKind, StateVec};

/// What became of an entity after its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// Still simulating.
    Alive,
    /// Remove from the world and replicate the removal.
    Dead,
}

/// A live simulation object.
#[derive(Debug, Clone)]
pub enum Entity {
    /// A player-controlled wizard.
    Character(Character),
    /// Explosive bouncing projectile.
    Fireball(Fireball),
    /// Giant sword falling from the sky.
    Sword(Sword),
    /// Health or mana pickup.
    Potion(Potion),
    /// Element-level pickup.
    MagicScroll(MagicScroll),
}

impl Entity {
    /// The wire tag for this entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Character(_) => EntityKind::Character,
            Entity::Fireball(_) => EntityKind::Fireball,
            Entity::Sword(_) => EntityKind::Sword,
            Entity::Potion(_) => EntityKind::Potion,
            Entity::MagicScroll(_) => EntityKind::MagicScroll,
        }
    }

    /// Reconstruct an entity from a `Spawn` message payload.
    pub fn from_spawn(kind: EntityKind, data: &[f64]) -> Result<Entity, SimError> {
        let mut entity = match kind {
            EntityKind::Character => Entity::Character(Character::blank()),
            EntityKind::Fireball => Entity::Fireball(Fireball::new(0.0, 0.0)),
            EntityKind::Sword => Entity::Sword(Sword::new(0.0, 0.0, 1.0, 1.0)),
            EntityKind::Potion => Entity::Potion(Potion::new(0.0, 0.0, PotionKind::Health)),
            EntityKind::MagicScroll => {
                Entity::MagicScroll(MagicScroll::new(0.0, 0.0, manastorm_core::Element::Arcane))
            }
        };
        entity.deserialize(data)?;
        Ok(entity)
    }

    /// Advance one fixed step. The entity is temporarily removed from the
    /// world's map while it runs, so it may freely mutate terrain, queue
    /// damage and query other entities.
    pub fn tick(&mut self, world: &mut World, dt: f64) -> Fate {
        match self {
            Entity::Character(c) => c.tick(world, dt),
            Entity::Fireball(f) => f.tick(world, dt),
            Entity::Sword(s) => s.tick(world, dt),
            Entity::Potion(p) => p.tick(world, dt),
            Entity::MagicScroll(m) => m.tick(world, dt),
        }
    }

    /// Simulation-relevant state as a compact value array.
    pub fn serialize(&self) -> StateVec {
        match self {
            Entity::Character(c) => c.serialize(),
            Entity::Fireball(f) => f.serialize(),
            Entity::Sword(s) => s.serialize(),
            Entity::Potion(p) => p.serialize(),
            Entity::MagicScroll(m) => m.serialize(),
        }
    }

    /// Restore state produced by [`serialize`](Self::serialize).
    pub fn deserialize(&mut self, data: &[f64]) -> Result<(), SimError> {
        match self {
            Entity::Character(c) => c.deserialize(data),
            Entity::Fireball(f) => f.deserialize(data),
            Entity::Sword(s) => s.deserialize(data),
            Entity::Potion(p) => p.deserialize(data),
            Entity::MagicScroll(m) => m.deserialize(data),
        }
    }

    /// The entity's physics body, if it has one.
    pub fn body(&self) -> Option<&dyn PhysicsBody> {
        match self {
            Entity::Character(c) => Some(c.body()),
            Entity::Fireball(f) => Some(f.body()),
            Entity::Sword(s) => Some(s.body()),
            Entity::Potion(p) => Some(p.body()),
            Entity::MagicScroll(m) => Some(m.body()),
        }
    }

    /// Mutable access to the physics body.
    pub fn body_mut(&mut self) -> Option<&mut dyn PhysicsBody> {
        match self {
            Entity::Character(c) => Some(c.body_mut()),
            Entity::Fireball(f) => Some(f.body_mut()),
            Entity::Sword(s) => Some(s.body_mut()),
            Entity::Potion(p) => Some(p.body_mut()),
            Entity::MagicScroll(m) => Some(m.body_mut()),
        }
    }

    /// Remaining hit points, for entities damage can affect.
    pub fn hp(&self) -> Option<f64> {
        match self {
            Entity::Character(c) => Some(c.hp),
            Entity::Potion(_) | Entity::MagicScroll(_) => Some(1.0),
            Entity::Fireball(_) | Entity::Sword(_) => None,
        }
    }

    /// Apply damage. Returns true if the entity was affected at all.
    pub fn apply_damage(&mut self, amount: f64) -> bool {
        match self {
            Entity::Character(c) => {
                c.hp -= amount;
                true
            }
            // Items are swept away by any damage.
            Entity::Potion(p) => {
                p.destroyed = true;
                true
            }
            Entity::MagicScroll(m) => {
                m.destroyed = true;
                true
            }
            Entity::Fireball(_) | Entity::Sword(_) => false,
        }
    }

    /// Whether this entity is a spell projectile still in flight. The turn
    /// state machine holds `Attacked` until no projectiles remain.
    pub fn is_projectile(&self) -> bool {
        matches!(self, Entity::Fireball(_) | Entity::Sword(_))
    }

    /// Whether the entity sits on a static, never-moving body.
    pub fn is_anchored(&self) -> bool {
        matches!(self, Entity::Potion(_) | Entity::MagicScroll(_))
    }
}
