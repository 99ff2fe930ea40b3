#![warn(missing_docs)]
//! Replication protocol, framing codec and data-channel abstractions.

mod channel;
mod codec;
mod connection;
mod protocol;

pub use channel::{ChannelError, ChannelEvent, DataChannel, MemoryChannel};
pub use codec::{compute_schema_hash, decode_message, encode_message};
pub use connection::{
    ConnectionError, JoinHandshake, JoinProgress, PeerConnection, JOIN_TIMEOUT_MS,
};
pub use protocol::{
    CharacterSnapshot, Message, PlayerSnapshot, MAX_CHARACTERS, MAX_ENTITY_UPDATES, MAX_NAME_LEN,
    MAX_PLAYERS, MAX_POPUP_LEN, MAX_STATE_LEN, PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
