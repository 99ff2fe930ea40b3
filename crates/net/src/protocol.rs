//! Protocol message definitions for host-client replication.
//!
//! All messages use postcard serialization for compact binary encoding.
//! One `Message` enum covers both directions; peers dispatch on the variant
//! exhaustively, so adding a tag is a compile-time change at every site.

use manastorm_core::{DamageKind, EntityId, EntityKind, InputState, StateVec};
use serde::{Deserialize, Serialize};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Protocol magic bytes to identify the manastorm protocol.
pub const PROTOCOL_MAGIC: &[u8; 8] = b"MSTM\x00\x01\x00\x00";

/// Maximum length of a player or team name (bytes).
pub const MAX_NAME_LEN: usize = 32;

/// Maximum length of a popup title or body (bytes).
pub const MAX_POPUP_LEN: usize = 128;

/// Maximum values in one `StateVec` payload.
///
/// The largest entity state is a handful of values; anything near this
/// limit is hostile.
pub const MAX_STATE_LEN: usize = 64;

/// Maximum entity states in one bulk `EntityUpdate`.
pub const MAX_ENTITY_UPDATES: usize = 256;

/// Maximum players in one `SyncPlayers` snapshot.
pub const MAX_PLAYERS: usize = 8;

/// Maximum characters per player snapshot.
pub const MAX_CHARACTERS: usize = 8;

/// One character inside a `SyncPlayers` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    /// Agreed entity id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Remaining hit points.
    pub hp: f64,
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
}

/// One roster entry inside a `SyncPlayers` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Display name.
    pub name: String,
    /// Team label.
    pub team: String,
    /// Packed RGB display color.
    pub color: u32,
    /// Set on the copy sent to the player this entry describes.
    pub you: bool,
    /// Index into the spell table, if a spell is selected.
    pub selected_spell: Option<u32>,
    /// Owned characters in spawn order.
    pub characters: Vec<CharacterSnapshot>,
}

/// Every message that crosses a data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Client requests a seat, carrying compatibility proof.
    Join {
        /// Protocol version.
        version: u16,
        /// Schema hash for compatibility.
        schema_hash: u64,
        /// Requested display name.
        name: String,
        /// Requested team label.
        team: String,
    },
    /// Client finished applying the initial snapshot and will simulate.
    ClientReady,
    /// Full roster snapshot, sent on join and on roster change.
    SyncPlayers {
        /// Every player in roster order.
        players: Vec<PlayerSnapshot>,
        /// Host tick at send time.
        time: u64,
    },
    /// Authoritative turn-holder change.
    ActiveCharacter {
        /// Roster index of the holding player.
        player: u32,
        /// Index into that player's character list.
        character: u32,
        /// Element levels, wire order.
        elements: Vec<f64>,
        /// Tick the turn began on.
        turn_start: u64,
    },
    /// Forwarded controller state for the turn holder.
    InputState {
        /// The serialized controller state.
        input: InputState,
    },
    /// Authoritative state of the active character.
    ActiveUpdate {
        /// The character's state vector.
        state: StateVec,
    },
    /// Bulk state of every syncable entity, id order.
    EntityUpdate {
        /// One state vector per entity, index-aligned.
        states: Vec<StateVec>,
    },
    /// A host-resolved damage source to replay.
    SyncDamage {
        /// Damage discriminant.
        kind: DamageKind,
        /// Source payload.
        data: StateVec,
    },
    /// A new entity with its agreed id.
    Spawn {
        /// Entity discriminant.
        kind: EntityKind,
        /// Agreed id.
        id: EntityId,
        /// Construction payload.
        data: StateVec,
    },
    /// Targeted correction of one entity.
    DynamicUpdate {
        /// The corrected entity.
        id: EntityId,
        /// Its state vector.
        data: StateVec,
    },
    /// An entity was removed.
    Die {
        /// The removed entity.
        id: EntityId,
    },
    /// Camera-follow hint.
    Focus {
        /// Entity to follow.
        id: EntityId,
    },
    /// UI notification.
    Popup {
        /// Headline.
        title: String,
        /// Detail line, possibly empty.
        body: String,
    },
    /// A player selected or cleared a spell.
    SelectSpell {
        /// Index into the spell table, or none to clear.
        spell: Option<u32>,
        /// Roster index of the selecting player.
        player: u32,
    },
}

impl Message {
    /// Verify message limits and validity.
    ///
    /// This should be called on all received messages before dispatch.
    pub fn verify(&self) -> Result<(), &'static str> {
        match self {
            Message::Join { name, team, .. } => {
                if name.len() > MAX_NAME_LEN {
                    return Err("Join name too long");
                }
                if team.len() > MAX_NAME_LEN {
                    return Err("Join team too long");
                }
            }
            Message::SyncPlayers { players, .. } => {
                if players.len() > MAX_PLAYERS {
                    return Err("Too many players in snapshot");
                }
                for player in players {
                    if player.name.len() > MAX_NAME_LEN || player.team.len() > MAX_NAME_LEN {
                        return Err("Snapshot name too long");
                    }
                    if player.characters.len() > MAX_CHARACTERS {
                        return Err("Too many characters in snapshot");
                    }
                    for character in &player.characters {
                        if character.name.len() > MAX_NAME_LEN {
                            return Err("Character name too long");
                        }
                    }
                }
            }
            Message::ActiveCharacter { elements, .. } => {
                if elements.len() > MAX_STATE_LEN {
                    return Err("Element array too long");
                }
            }
            Message::ActiveUpdate { state } => {
                if state.len() > MAX_STATE_LEN {
                    return Err("Active state too long");
                }
            }
            Message::EntityUpdate { states } => {
                if states.len() > MAX_ENTITY_UPDATES {
                    return Err("Too many entity updates");
                }
                if states.iter().any(|state| state.len() > MAX_STATE_LEN) {
                    return Err("Entity state too long");
                }
            }
            Message::SyncDamage { data, .. }
            | Message::Spawn { data, .. }
            | Message::DynamicUpdate { data, .. } => {
                if data.len() > MAX_STATE_LEN {
                    return Err("State payload too long");
                }
            }
            Message::Popup { title, body } => {
                if title.len() > MAX_POPUP_LEN || body.len() > MAX_POPUP_LEN {
                    return Err("Popup text too long");
                }
            }
            Message::InputState { .. }
            | Message::ClientReady
            | Message::Die { .. }
            | Message::Focus { .. }
            | Message::SelectSpell { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_payloads_fail_verification() {
        let message = Message::Popup {
            title: "x".repeat(MAX_POPUP_LEN + 1),
            body: String::new(),
        };
        assert!(message.verify().is_err());

        let message = Message::EntityUpdate {
            states: vec![vec![0.0; MAX_STATE_LEN + 1]],
        };
        assert!(message.verify().is_err());
    }

    #[test]
    fn ordinary_messages_verify() {
        let message = Message::Spawn {
            kind: EntityKind::Fireball,
            id: 7,
            data: vec![1.0, 2.0, 3.0],
        };
        assert!(message.verify().is_ok());
    }
}
