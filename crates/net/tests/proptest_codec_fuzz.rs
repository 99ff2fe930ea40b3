//! Fuzz-style property tests for the replication codec.
//!
//! These tests validate that the decoder handles arbitrary network input
//! gracefully without crashing.

use manastorm_net::{
    compute_schema_hash, decode_message, encode_message, Message, PROTOCOL_VERSION,
};
use proptest::prelude::*;

proptest! {
    /// Property: arbitrary bytes don't crash the decoder.
    #[test]
    fn arbitrary_bytes_dont_crash(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let _result = decode_message(&random_bytes);
        // No panic = success
    }

    /// Property: join messages roundtrip.
    #[test]
    fn join_roundtrips(
        name in "[a-z]{1,16}",
        team in "[a-z]{1,16}",
    ) {
        let msg = Message::Join {
            version: PROTOCOL_VERSION,
            schema_hash: compute_schema_hash(),
            name,
            team,
        };

        let encoded = encode_message(&msg).unwrap();
        let decoded = decode_message(&encoded).unwrap();

        prop_assert_eq!(msg, decoded);
    }

    /// Property: entity updates roundtrip.
    #[test]
    fn entity_update_roundtrips(
        states in prop::collection::vec(
            prop::collection::vec(-1e6f64..1e6, 0..8),
            0..16,
        ),
    ) {
        let msg = Message::EntityUpdate { states };

        let encoded = encode_message(&msg).unwrap();
        let decoded = decode_message(&encoded).unwrap();

        prop_assert_eq!(msg, decoded);
    }

    /// Property: truncated frames don't crash.
    #[test]
    fn truncated_frames_handled(
        truncate_at in 0usize..50,
    ) {
        let msg = Message::Die { id: 42 };
        let mut encoded = encode_message(&msg).unwrap();

        if truncate_at < encoded.len() {
            encoded.truncate(truncate_at);
            let _result = decode_message(&encoded);
            // No panic = success
        }
    }
}
