//! Message encoding and decoding with framing.
//!
//! Provides length-prefixed encoding suitable for any ordered, reliable,
//! message-oriented channel.

use crate::protocol::{Message, PROTOCOL_MAGIC, PROTOCOL_VERSION};
use anyhow::{Context, Result};
use blake3::Hash;

/// Compute schema hash from protocol definitions.
///
/// Carried in `Join` so peers reject incompatible builds before any state
/// crosses the wire.
pub fn compute_schema_hash() -> u64 {
    let mut hasher = blake3::Hasher::new();

    hasher.update(&PROTOCOL_VERSION.to_le_bytes());
    hasher.update(PROTOCOL_MAGIC);

    // Message type names, deterministic order.
    hasher.update(b"Message");
    hasher.update(b"PlayerSnapshot");
    hasher.update(b"CharacterSnapshot");
    hasher.update(b"InputState");

    let hash: Hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Encode a message with length prefix.
///
/// Frame format: [length: u32][message_type: u8][payload: bytes]
pub fn encode_message(msg: &Message) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(msg).context("Failed to serialize message")?;

    let mut frame = Vec::with_capacity(4 + 1 + payload.len());

    // Length excludes the length field itself.
    let length = (1 + payload.len()) as u32;
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(message_type_tag(msg));
    frame.extend_from_slice(&payload);

    Ok(frame)
}

/// Decode a message from frame data.
///
/// Expects data to start with the length prefix.
pub fn decode_message(data: &[u8]) -> Result<Message> {
    if data.len() < 5 {
        return Err(anyhow::anyhow!(
            "Frame too short: {} bytes (minimum 5)",
            data.len()
        ));
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if data.len() < 4 + length {
        return Err(anyhow::anyhow!(
            "Incomplete frame: expected {} bytes, got {}",
            4 + length,
            data.len()
        ));
    }

    // The type tag at data[4] exists for multiplexing; postcard carries the
    // discriminant itself.
    let payload = &data[5..4 + length];

    let msg = postcard::from_bytes(payload).context("Failed to deserialize message")?;

    Ok(msg)
}

/// Get the frame type tag for a message.
fn message_type_tag(msg: &Message) -> u8 {
    match msg {
        Message::Join { .. } => 0,
        Message::ClientReady => 1,
        Message::SyncPlayers { .. } => 2,
        Message::ActiveCharacter { .. } => 3,
        Message::InputState { .. } => 4,
        Message::ActiveUpdate { .. } => 5,
        Message::EntityUpdate { .. } => 6,
        Message::SyncDamage { .. } => 7,
        Message::Spawn { .. } => 8,
        Message::DynamicUpdate { .. } => 9,
        Message::Die { .. } => 10,
        Message::Focus { .. } => 11,
        Message::Popup { .. } => 12,
        Message::SelectSpell { .. } => 13,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manastorm_core::EntityKind;

    #[test]
    fn round_trip_preserves_messages() {
        let messages = vec![
            Message::ClientReady,
            Message::Spawn {
                kind: EntityKind::Sword,
                id: 12,
                data: vec![4.0, 5.0, 1.0, 1.0],
            },
            Message::Popup {
                title: "Big mana potion".into(),
                body: String::new(),
            },
        ];
        for msg in messages {
            let frame = encode_message(&msg).unwrap();
            assert_eq!(decode_message(&frame).unwrap(), msg);
        }
    }

    #[test]
    fn schema_hash_is_stable() {
        assert_eq!(compute_schema_hash(), compute_schema_hash());
    }

    #[test]
    fn short_frames_are_rejected() {
        assert!(decode_message(&[]).is_err());
        assert!(decode_message(&[1, 0, 0, 0]).is_err());
    }
}
