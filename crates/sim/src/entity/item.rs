//! Pickups: potions and magic scrolls.
//!
//! Items are anchored where they spawn (a [`StaticBody`]), which also lets
//! damage resolution treat them uniformly with moving bodies: an explosion
//! sweeps them away like anything else.

use crate::entity::{Entity, Fate};
use crate::error::SimError;
use crate::world::{World, WorldEvent};
use manastorm_collision::{stamps, PhysicsBody, StaticBody};
use manastorm_core::{Element, StateVec};
use rand::Rng;

/// Potion variants and their effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PotionKind {
    /// +50 hp.
    Health,
    /// +25 hp.
    SmallHealth,
    /// +50 mana to the collector's player.
    Mana,
    /// +25 mana to the collector's player.
    SmallMana,
}

impl PotionKind {
    /// Restored amount.
    pub fn amount(self) -> f64 {
        match self {
            PotionKind::Health | PotionKind::Mana => 50.0,
            PotionKind::SmallHealth | PotionKind::SmallMana => 25.0,
        }
    }

    /// Display name for pickup popups.
    pub fn name(self) -> &'static str {
        match self {
            PotionKind::Health => "Big health potion",
            PotionKind::SmallHealth => "Small health potion",
            PotionKind::Mana => "Big mana potion",
            PotionKind::SmallMana => "Small mana potion",
        }
    }

    fn tag(self) -> f64 {
        match self {
            PotionKind::Health => 0.0,
            PotionKind::SmallHealth => 1.0,
            PotionKind::Mana => 2.0,
            PotionKind::SmallMana => 3.0,
        }
    }

    fn from_tag(value: f64) -> Result<Self, SimError> {
        match value as i64 {
            0 => Ok(PotionKind::Health),
            1 => Ok(PotionKind::SmallHealth),
            2 => Ok(PotionKind::Mana),
            3 => Ok(PotionKind::SmallMana),
            _ => Err(SimError::BadTag {
                what: "potion kind",
                value,
            }),
        }
    }
}

/// A potion waiting to be collected.
#[derive(Debug, Clone)]
pub struct Potion {
    /// Which potion this is.
    pub kind: PotionKind,
    /// Set when damage sweeps the item away before anyone collects it.
    pub(crate) destroyed: bool,
    body: StaticBody,
}

impl Potion {
    /// Place a potion.
    pub fn new(x: f64, y: f64, kind: PotionKind) -> Self {
        Self {
            kind,
            destroyed: false,
            body: StaticBody::new(stamps::circle_3(), x, y),
        }
    }

    /// The item's anchored body.
    pub fn body(&self) -> &StaticBody {
        &self.body
    }

    /// Mutable access to the anchored body.
    pub fn body_mut(&mut self) -> &mut StaticBody {
        &mut self.body
    }

    /// Advance one fixed step: wait for a character to walk over the item.
    pub fn tick(&mut self, world: &mut World, _dt: f64) -> Fate {
        if self.destroyed {
            return Fate::Dead;
        }
        let (x, y) = self.body.position();
        let Some(collector) = world.character_overlapping(self.body.mask(), x, y) else {
            return Fate::Alive;
        };

        match self.kind {
            PotionKind::Health | PotionKind::SmallHealth => {
                world.heal(collector, self.kind.amount());
            }
            PotionKind::Mana | PotionKind::SmallMana => {
                world.push_event(WorldEvent::ManaPickup {
                    character: collector,
                    amount: self.kind.amount(),
                });
            }
        }
        world.push_event(WorldEvent::Popup {
            title: self.kind.name().to_string(),
            body: String::new(),
        });
        Fate::Dead
    }

    /// kind, then body state.
    pub fn serialize(&self) -> StateVec {
        let mut data = vec![self.kind.tag()];
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
        self.kind = PotionKind::from_tag(data[0])?;
        self.body.deserialize(&data[1..])?;
        Ok(())
    }
}

/// A scroll that permanently raises one element's level for the match.
#[derive(Debug, Clone)]
pub struct MagicScroll {
    /// The element the scroll empowers.
    pub element: Element,
    /// Set when damage sweeps the item away before anyone collects it.
    pub(crate) destroyed: bool,
    body: StaticBody,
}

/// Element level gained per collected scroll.
pub(crate) const SCROLL_BONUS: f64 = 0.25;

impl MagicScroll {
    /// Place a scroll.
    pub fn new(x: f64, y: f64, element: Element) -> Self {
        Self {
            element,
            destroyed: false,
            body: StaticBody::new(stamps::circle_3(), x, y),
        }
    }

    /// The item's anchored body.
    pub fn body(&self) -> &StaticBody {
        &self.body
    }

    /// Mutable access to the anchored body.
    pub fn body_mut(&mut self) -> &mut StaticBody {
        &mut self.body
    }

    /// Advance one fixed step: wait for a character to walk over the item.
    pub fn tick(&mut self, world: &mut World, _dt: f64) -> Fate {
        if self.destroyed {
            return Fate::Dead;
        }
        let (x, y) = self.body.position();
        if world.character_overlapping(self.body.mask(), x, y).is_none() {
            return Fate::Alive;
        }

        world.push_event(WorldEvent::ElementPickup {
            element: self.element,
            amount: SCROLL_BONUS,
        });
        world.push_event(WorldEvent::Popup {
            title: format!("{:?} scroll", self.element),
            body: String::new(),
        });
        Fate::Dead
    }

    /// element, then body state.
    pub fn serialize(&self) -> StateVec {
        let element = Element::ALL
            .iter()
            .position(|e| *e == self.element)
            .unwrap_or(0) as f64;
        let mut data = vec![element];
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
        self.element = Element::ALL
            .get(data[0] as usize)
            .copied()
            .ok_or(SimError::BadTag {
                what: "element",
                value: data[0],
            })?;
        self.body.deserialize(&data[1..])?;
        Ok(())
    }
}

/// Weighted drop table: small items are common, scrolls rare.
const DROPS: &[(u32, fn(f64, f64) -> Entity)] = &[
    (1, |x, y| Entity::Potion(Potion::new(x, y, PotionKind::Health))),
    (2, |x, y| {
        Entity::Potion(Potion::new(x, y, PotionKind::SmallHealth))
    }),
    (2, |x, y| Entity::Potion(Potion::new(x, y, PotionKind::Mana))),
    (3, |x, y| {
        Entity::Potion(Potion::new(x, y, PotionKind::SmallMana))
    }),
    (1, |x, y| {
        Entity::MagicScroll(MagicScroll::new(x, y, Element::Arcane))
    }),
    (1, |x, y| {
        Entity::MagicScroll(MagicScroll::new(x, y, Element::Elemental))
    }),
    (1, |x, y| {
        Entity::MagicScroll(MagicScroll::new(x, y, Element::Life))
    }),
    (1, |x, y| {
        Entity::MagicScroll(MagicScroll::new(x, y, Element::Physical))
    }),
];

/// Roll a random item at a position. Only the host rolls; followers learn
/// the result through a `Spawn` message.
pub fn random_item(rng: &mut impl Rng, x: f64, y: f64) -> Entity {
    let total: u32 = DROPS.iter().map(|(weight, _)| weight).sum();
    let mut roll = rng.gen_range(0..total);
    for (weight, build) in DROPS {
        if roll < *weight {
            return build(x, y);
        }
        roll -= weight;
    }
    unreachable!("weights cover the roll range");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn potion_tags_round_trip() {
        for kind in [
            PotionKind::Health,
            PotionKind::SmallHealth,
            PotionKind::Mana,
            PotionKind::SmallMana,
        ] {
            assert_eq!(PotionKind::from_tag(kind.tag()).unwrap(), kind);
        }
        assert!(PotionKind::from_tag(9.0).is_err());
    }

    #[test]
    fn drop_table_is_seed_deterministic() {
        let roll = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20)
                .map(|_| random_item(&mut rng, 0.0, 0.0).kind())
                .collect::<Vec<_>>()
        };
        assert_eq!(roll(42), roll(42));
    }
}
