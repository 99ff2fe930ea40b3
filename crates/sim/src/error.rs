//! Simulation-level error taxonomy.

use manastorm_collision::StateError;
use manastorm_core::EntityId;
use thiserror::Error;

/// Fatal simulation/desynchronization errors.
///
/// Every variant means the peer's view of the world no longer matches the
/// host's. These are raised immediately rather than skipped, since skipping
/// would leave peers silently diverged.
#[derive(Debug, Error)]
pub enum SimError {
    /// A message referenced an entity id not present in the live entity map.
    #[error("unknown entity id {0}")]
    UnknownEntity(EntityId),

    /// A state vector could not reconstruct the target.
    #[error("bad state vector: {0}")]
    BadState(#[from] StateError),

    /// A numeric discriminant in a state vector had no mapping.
    #[error("invalid {what} tag {value}")]
    BadTag {
        /// What the tag was supposed to select.
        what: &'static str,
        /// The raw value received.
        value: f64,
    },

    /// A message referenced a player index outside the roster.
    #[error("unknown player index {0}")]
    UnknownPlayer(usize),

    /// A bulk entity update did not line up with the syncable list.
    #[error("entity update misaligned: {got} states for {expected} syncables")]
    UpdateMisaligned {
        /// Number of replicated entities on this peer.
        expected: usize,
        /// Number of states received.
        got: usize,
    },
}
