//! The generic fireball: bounces, carves craters, explodes.

use crate::damage::DamageSource;
use crate::entity::Fate;
use crate::error::SimError;
use crate::world::{World, WorldEvent};
use manastorm_collision::{stamps, BodyDef, PhysicsBody, SimpleBody};
use manastorm_core::StateVec;
use tracing::debug;

/// Bounces before the fireball detonates on its own.
const BOUNCE_BUDGET: f64 = 5.0;

/// Crater half-extent on detonation.
const EXPLOSION_RADIUS: i32 = 16;

/// Damage dealt inside the explosion radius.
const EXPLOSION_DAMAGE: f64 = 50.0;

/// Crater half-extent left by a non-final bounce.
const BOUNCE_CRATER_RADIUS: i32 = 4;

/// Explosive projectile. Negative bounciness keeps it digging into the
/// terrain it lands on, so the bounce budget drains fast on contact.
#[derive(Debug, Clone)]
pub struct Fireball {
    bounces: f64,
    body: SimpleBody,
}

impl Fireball {
    /// Create a fireball at a position; aim it with the body's
    /// `add_angular_velocity`.
    pub fn new(x: f64, y: f64) -> Self {
        let mut body = SimpleBody::new(
            stamps::circle_3(),
            BodyDef {
                bounciness: -0.9,
                friction: 0.96,
                gravity: 0.25,
            },
        );
        body.move_to(x, y);
        Self {
            bounces: BOUNCE_BUDGET,
            body,
        }
    }

    /// The fireball's physics body.
    pub fn body(&self) -> &SimpleBody {
        &self.body
    }

    /// Mutable access to the physics body.
    pub fn body_mut(&mut self) -> &mut SimpleBody {
        &mut self.body
    }

    fn explode(&self, world: &mut World, x: i32, y: i32) {
        debug!(x, y, "fireball detonates");
        world
            .terrain_mut()
            .subtract(x, y, EXPLOSION_RADIUS, stamps::circle_32());
        world.queue_damage(DamageSource::Explosion {
            x: f64::from(x),
            y: f64::from(y),
            radius: f64::from(EXPLOSION_RADIUS),
            damage: EXPLOSION_DAMAGE,
        });
    }

    /// Advance one fixed step.
    pub fn tick(&mut self, world: &mut World, dt: f64) -> Fate {
        let contact = self.body.tick(world.terrain(), dt);
        let (x, y) = self.body.position();

        if world.below_kill_plane(y) {
            world.push_event(WorldEvent::EndTurn);
            return Fate::Dead;
        }

        // Direct hit on a character detonates regardless of bounce budget.
        if let Some(struck) = world.character_overlapping(self.body.mask(), x, y) {
            debug!(target = struck, "fireball direct hit");
            self.explode(world, x, y);
            return Fate::Dead;
        }

        if let Some(contact) = contact {
            self.bounces -= 1.0;
            if self.bounces <= 0.0 {
                self.explode(world, contact.x, contact.y);
                return Fate::Dead;
            }
            world
                .terrain_mut()
                .subtract(contact.x, contact.y, BOUNCE_CRATER_RADIUS, stamps::circle_9());
        }

        Fate::Alive
    }

    /// bounces, then body state.
    pub fn serialize(&self) -> StateVec {
        let mut data = vec![self.bounces];
        data.extend(self.body.serialize());
        data
    }

    /// Restore state produced by [`serialize`](Self::serialize).
    pub fn deserialize(&mut self, data: &[f64]) -> Result<(), SimError> {
        if data.is_empty() {
            return Err(manastorm_collision::StateError::TooShort {
                expected: 1,
                got: 0,
            }
            .into());
        }
        self.bounces = data[0];
        self.body.deserialize(&data[1..])?;
        Ok(())
    }
}
