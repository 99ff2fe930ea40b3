#![warn(missing_docs)]
//! Core primitives shared across the workspace.

pub mod id;
pub mod input;
pub mod kinds;

use serde::{Deserialize, Serialize};

pub use id::{EntityId, IdAllocator};
pub use input::InputState;
pub use kinds::{DamageKind, EntityKind};

/// Compact value array used by every `serialize`/`deserialize` pair.
///
/// Carries exactly the simulation-relevant state of a body or entity
/// (position, velocity, remaining lifetime/bounces), never cosmetic state.
pub type StateVec = Vec<f64>;

/// Fixed simulation step in milliseconds (20 TPS => 50 ms per tick).
pub const TICK_MS: u64 = 50;

/// Fixed simulation step in seconds, used by all physics integration.
pub const TICK_DT: f64 = TICK_MS as f64 / 1000.0;

/// Fixed tick counter advancing once per simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any deterministic timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}

/// Elemental resource pools spells draw from.
///
/// The order is wire-visible: `ActiveCharacter` carries the levels as an
/// array indexed by `Element as usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    /// Raw physical force (swords, melee).
    Physical,
    /// Pure arcane power.
    Arcane,
    /// Fire, ice and lightning.
    Elemental,
    /// Healing and protection.
    Life,
}

impl Element {
    /// All elements in wire order.
    pub const ALL: [Element; 4] = [
        Element::Physical,
        Element::Arcane,
        Element::Elemental,
        Element::Life,
    ];

    /// Number of elements, the length of every element-level array.
    pub const COUNT: usize = Self::ALL.len();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_advances_monotonically() {
        let tick = SimTick::ZERO.advance(3).advance(2);
        assert_eq!(tick, SimTick(5));
    }

    #[test]
    fn element_wire_order_is_stable() {
        assert_eq!(Element::ALL[0], Element::Physical);
        assert_eq!(Element::ALL[3], Element::Life);
        assert_eq!(Element::COUNT, 4);
    }
}
