//! The static spell table.
//!
//! Cursor art, cast animations and sounds are collaborator concerns; the
//! simulation only needs each spell's cost, its effect, and the turn state a
//! cast yields.

use crate::manager::TurnState;
use manastorm_core::Element;

/// What casting a spell does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpellEffect {
    /// Launch a fireball from the caster along the aim vector.
    Fireball {
        /// Spawn offset from the caster, so the projectile clears its own
        /// hitbox.
        x_offset: f64,
        /// Vertical spawn offset.
        y_offset: f64,
        /// Launch speed at full charge, cells per tick.
        speed: f64,
    },
    /// Drop a giant sword from the sky above the aimed point.
    Skyfall {
        /// Horizontal reach at full charge.
        reach: f64,
    },
    /// Strike everything right next to the caster.
    Melee {
        /// Effect radius around the caster.
        radius: f64,
        /// Base damage, scaled by the Physical element level.
        damage: f64,
    },
    /// Shove the caster along the aim vector without ending the turn.
    Gust {
        /// Impulse strength.
        power: f64,
    },
}

/// One row of the spell table.
#[derive(Debug, Clone, Copy)]
pub struct Spell {
    /// Display name.
    pub name: &'static str,
    /// Flavor line.
    pub description: &'static str,
    /// Element pool the cost is deducted from.
    pub element: Element,
    /// Element level consumed per cast.
    pub cost: f64,
    /// Turn state the cast yields.
    pub turn_state: TurnState,
    /// What the cast does.
    pub effect: SpellEffect,
}

/// Every castable spell, in selection order.
pub const SPELLS: &[Spell] = &[
    Spell {
        name: "Melee",
        description: "For less gifted sorcerers",
        element: Element::Physical,
        cost: 0.1,
        turn_state: TurnState::Ending,
        effect: SpellEffect::Melee {
            radius: 12.0,
            damage: 25.0,
        },
    },
    Spell {
        name: "Fireball",
        description: "Generic fireball",
        element: Element::Elemental,
        cost: 0.3,
        turn_state: TurnState::Attacked,
        effect: SpellEffect::Fireball {
            x_offset: 7.0,
            y_offset: -10.5,
            speed: 6.0,
        },
    },
    Spell {
        name: "Arthur's sword",
        description: "Giant sword from the sky",
        element: Element::Physical,
        cost: 0.4,
        turn_state: TurnState::Attacked,
        effect: SpellEffect::Skyfall { reach: 60.0 },
    },
    Spell {
        name: "Gust",
        description: "Move from a distance",
        element: Element::Life,
        cost: 0.1,
        turn_state: TurnState::Ongoing,
        effect: SpellEffect::Gust { power: 4.0 },
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_turn_state_is_reachable_from_a_cast() {
        let yields = |state: TurnState| SPELLS.iter().any(|spell| spell.turn_state == state);
        assert!(yields(TurnState::Ongoing));
        assert!(yields(TurnState::Attacked));
        assert!(yields(TurnState::Ending));
    }
}
