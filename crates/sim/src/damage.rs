//! Damage sources and targeting.
//!
//! A damage source is a value that can be replayed deterministically on
//! every peer: the host queues it locally and broadcasts it as a
//! `SyncDamage` message; followers queue the decoded copy. Both sides then
//! resolve targets from the same synchronized inputs.

use crate::error::SimError;
use crate::world::World;
use manastorm_collision::{stamps, PhysicsBody};
use manastorm_core::{DamageKind, EntityId, StateVec};

/// A damage event in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum DamageSource {
    /// Radial damage around a point.
    Explosion {
        /// Center x.
        x: f64,
        /// Center y.
        y: f64,
        /// Effect radius in cells.
        radius: f64,
        /// Damage dealt to every body inside the radius.
        damage: f64,
    },
    /// Damage under a falling object, shaped like the sword tip.
    Fall {
        /// Shape center x.
        x: i32,
        /// Shape top y.
        y: i32,
        /// Damage dealt to every overlapped body.
        damage: f64,
    },
}

impl DamageSource {
    /// The wire tag for this source.
    pub fn kind(&self) -> DamageKind {
        match self {
            DamageSource::Explosion { .. } => DamageKind::Explosion,
            DamageSource::Fall { .. } => DamageKind::Fall,
        }
    }

    /// Damage dealt per struck body.
    pub fn damage(&self) -> f64 {
        match self {
            DamageSource::Explosion { damage, .. } | DamageSource::Fall { damage, .. } => *damage,
        }
    }

    /// Payload for a `SyncDamage` message.
    pub fn serialize(&self) -> StateVec {
        match self {
            DamageSource::Explosion {
                x,
                y,
                radius,
                damage,
            } => vec![*x, *y, *radius, *damage],
            DamageSource::Fall { x, y, damage } => {
                vec![f64::from(*x), f64::from(*y), *damage]
            }
        }
    }

    /// Rebuild a source from its wire tag and payload.
    pub fn deserialize(kind: DamageKind, data: &[f64]) -> Result<Self, SimError> {
        let need = |len: usize| {
            if data.len() < len {
                Err(SimError::BadState(
                    manastorm_collision::StateError::TooShort {
                        expected: len,
                        got: data.len(),
                    },
                ))
            } else {
                Ok(())
            }
        };
        match kind {
            DamageKind::Explosion => {
                need(4)?;
                Ok(DamageSource::Explosion {
                    x: data[0],
                    y: data[1],
                    radius: data[2],
                    damage: data[3],
                })
            }
            DamageKind::Fall => {
                need(3)?;
                Ok(DamageSource::Fall {
                    x: data[0] as i32,
                    y: data[1] as i32,
                    damage: data[2],
                })
            }
        }
    }

    /// Ids of every damageable entity this source affects, in id order.
    pub fn targets(&self, world: &World) -> Vec<EntityId> {
        world
            .entities()
            .filter(|(_, entity)| entity.hp().is_some())
            .filter(|(_, entity)| {
                let Some(body) = entity.body() else {
                    return false;
                };
                self.covers(body)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether a body lies in this source's area of effect.
    pub fn covers(&self, body: &dyn PhysicsBody) -> bool {
        match *self {
            DamageSource::Explosion { x, y, radius, .. } => {
                let (bx, by) = body.precise_position();
                let mask = body.mask();
                let cx = bx + f64::from(mask.width()) / 2.0;
                let cy = by + f64::from(mask.height()) / 2.0;
                let dx = cx - x;
                let dy = cy - y;
                dx * dx + dy * dy <= radius * radius
            }
            DamageSource::Fall { x, y, .. } => {
                let shape = stamps::sword_tip();
                let shape_x = x - shape.width() as i32 / 2;
                let (bx, by) = body.position();
                shape.collides_with(body.mask(), bx - shape_x, by - y)
            }
        }
    }
}
