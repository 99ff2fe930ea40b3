//! Wire-visible discriminants for spawnable entities and damage sources.
//!
//! These live here rather than in the simulation crate so the protocol can
//! name them without depending on entity internals. Adding a variant is a
//! compile-time change: every dispatch site matches exhaustively.

use serde::{Deserialize, Serialize};

/// Kind tag carried by `Spawn` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A player-controlled wizard.
    Character,
    /// Explosive bouncing projectile.
    Fireball,
    /// Giant sword falling from the sky.
    Sword,
    /// Health or mana pickup.
    Potion,
    /// Element-level pickup.
    MagicScroll,
}

/// Kind tag carried by `SyncDamage` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    /// Radial damage around a point.
    Explosion,
    /// Shaped damage under a falling object.
    Fall,
}
