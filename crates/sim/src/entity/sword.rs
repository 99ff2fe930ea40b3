//! Arthur's sword: a giant blade dropped from the sky.

use crate::damage::DamageSource;
use crate::entity::Fate;
use crate::error::SimError;
use crate::world::{World, WorldEvent};
use manastorm_collision::{stamps, BodyDef, PhysicsBody, SimpleBody};
use manastorm_core::StateVec;

/// Bounce budget per point of Physical element level.
const BOUNCES_PER_LEVEL: f64 = 40.0;

/// Base damage per strike, scaled by the Arcane element level at cast time.
const STRIKE_DAMAGE: f64 = 7.0;

/// Ticks before the sword dissolves on its own.
const LIFETIME: f64 = 150.0;

/// Nudge applied when the blade lands on an anchored set-piece, so it slides
/// off instead of hammering the same spot.
const DEFLECT_X: f64 = 1.0;
const DEFLECT_Y: f64 = -3.0;

/// A falling blade that strikes everything under its tip, repeatedly, until
/// its bounce budget or lifetime runs out. Its death concludes the turn.
#[derive(Debug, Clone)]
pub struct Sword {
    bounces: f64,
    lifetime: f64,
    /// Height of the previous strike; re-strikes within one cell are ignored
    /// so a resting blade does not multi-hit.
    last_y: f64,
    damage_scale: f64,
    body: SimpleBody,
}

impl Sword {
    /// Create a sword at a position. `physical` and `arcane` are the element
    /// levels at cast time; they size the bounce budget and strike damage.
    pub fn new(x: f64, y: f64, physical: f64, arcane: f64) -> Self {
        let mut body = SimpleBody::new(
            stamps::sword_tip(),
            BodyDef {
                bounciness: 0.7,
                friction: 0.95,
                gravity: 0.25,
            },
        );
        body.move_to(x.round(), y);
        Self {
            bounces: BOUNCES_PER_LEVEL * physical,
            lifetime: LIFETIME,
            last_y: f64::INFINITY,
            damage_scale: arcane,
            body,
        }
    }

    /// The sword's physics body.
    pub fn body(&self) -> &SimpleBody {
        &self.body
    }

    /// Mutable access to the physics body.
    pub fn body_mut(&mut self) -> &mut SimpleBody {
        &mut self.body
    }

    fn die(&self, world: &mut World) -> Fate {
        world.push_event(WorldEvent::EndTurn);
        Fate::Dead
    }

    /// Advance one fixed step.
    pub fn tick(&mut self, world: &mut World, dt: f64) -> Fate {
        let contact = self.body.tick(world.terrain(), dt);

        if let Some(contact) = contact {
            // Ignore micro-bounces at the same height.
            if (self.last_y - f64::from(contact.y)).abs() >= 1.0 {
                self.bounces -= 1.0;
                self.last_y = f64::from(contact.y);

                let strike = DamageSource::Fall {
                    x: contact.x,
                    y: contact.y - 4,
                    damage: STRIKE_DAMAGE * self.damage_scale,
                };
                // An anchored set-piece under the tip deflects the blade
                // sideways; moving targets just take the hit.
                if let Some(center_x) = world.static_target_center(&strike) {
                    let (x, _) = self.body.precise_position();
                    let side = if x + 4.0 > center_x { 1.0 } else { -1.0 };
                    self.body.add_velocity(side * DEFLECT_X, DEFLECT_Y);
                }
                world.queue_damage(strike);
            }

            if self.bounces <= 0.0 {
                return self.die(world);
            }
        }

        if world.below_kill_plane(self.body.position().1) {
            return self.die(world);
        }

        self.lifetime -= dt;
        if self.lifetime <= 0.0 {
            return self.die(world);
        }
        Fate::Alive
    }

    /// bounces, lifetime, last strike height, damage scale, then body state.
    pub fn serialize(&self) -> StateVec {
        let mut data = vec![self.bounces, self.lifetime, self.last_y, self.damage_scale];
        data.extend(self.body.serialize());
        data
    }

    /// Restore state produced by [`serialize`](Self::serialize).
    pub fn deserialize(&mut self, data: &[f64]) -> Result<(), SimError> {
        if data.len() < 4 {
            return Err(manastorm_collision::StateError::TooShort {
                expected: 4,
                got: data.len(),
            }
            .into());
        }
        self.bounces = data[0];
        self.lifetime = data[1];
        self.last_y = data[2];
        self.damage_scale = data[3];
        self.body.deserialize(&data[4..])?;
        Ok(())
    }
}
