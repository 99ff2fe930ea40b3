//! High-level connection management integrating channels, codec and protocol.
//!
//! Provides a typed message interface over any [`DataChannel`] plus the
//! join handshake state machine.

use crate::channel::{ChannelEvent, DataChannel};
use crate::codec::{compute_schema_hash, decode_message, encode_message};
use crate::protocol::{Message, PROTOCOL_VERSION};
use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A join that receives no `Open` within this window is aborted.
pub const JOIN_TIMEOUT_MS: u64 = 5_000;

/// Connection-level failures.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// No `Open` arrived within [`JOIN_TIMEOUT_MS`].
    #[error("join timed out after {JOIN_TIMEOUT_MS} ms")]
    JoinTimeout,
    /// The channel closed or failed mid-lifecycle.
    #[error("channel lost: {0}")]
    ChannelLost(String),
    /// The peer's protocol build is incompatible.
    #[error("schema mismatch: ours {ours:#x}, theirs {theirs:#x}")]
    SchemaMismatch {
        /// Our schema hash.
        ours: u64,
        /// The hash the peer sent.
        theirs: u64,
    },
}

/// A typed-message view over one data channel.
pub struct PeerConnection {
    channel: Box<dyn DataChannel>,
}

impl PeerConnection {
    /// Wrap a channel.
    pub fn new(channel: Box<dyn DataChannel>) -> Self {
        Self { channel }
    }

    /// Encode and queue one message.
    pub fn send(&mut self, msg: &Message) -> Result<()> {
        let frame = encode_message(msg)?;
        self.channel.send(&frame)?;
        Ok(())
    }

    /// Decode the next inbound message, verifying its limits.
    ///
    /// Returns `Ok(None)` when no frame is waiting. A frame that cannot be
    /// decoded or fails verification is an error, never skipped.
    pub fn try_recv(&mut self) -> Result<Option<Message>> {
        let Some(frame) = self.channel.try_recv() else {
            return Ok(None);
        };
        let msg = decode_message(&frame)?;
        msg.verify().map_err(|reason| {
            warn!(reason, "rejecting inbound message");
            anyhow::anyhow!("message rejected: {reason}")
        })?;
        Ok(Some(msg))
    }

    /// Take the next lifecycle event from the channel.
    pub fn poll_event(&mut self) -> Option<ChannelEvent> {
        self.channel.poll_event()
    }

    /// Close the underlying channel.
    pub fn close(&mut self) {
        self.channel.close();
    }

    /// Validate a peer's compatibility proof from its `Join`.
    pub fn check_schema(&self, version: u16, schema_hash: u64) -> Result<(), ConnectionError> {
        let ours = compute_schema_hash();
        if version != PROTOCOL_VERSION || schema_hash != ours {
            return Err(ConnectionError::SchemaMismatch {
                ours,
                theirs: schema_hash,
            });
        }
        Ok(())
    }
}

/// Progress of an in-flight join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinProgress {
    /// Still waiting for the channel to open.
    Waiting,
    /// The channel opened and `Join` was sent.
    Joined,
}

/// Client-side join handshake.
///
/// Time is measured against a caller-supplied millisecond clock, not a wall
/// clock read inside the machine, so tests and the headless runner control
/// it deterministically.
pub struct JoinHandshake {
    started_at_ms: u64,
    name: String,
    team: String,
}

impl JoinHandshake {
    /// Start a join attempt at the given clock reading.
    pub fn new(now_ms: u64, name: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            started_at_ms: now_ms,
            name: name.into(),
            team: team.into(),
        }
    }

    /// Drive the handshake.
    ///
    /// On `Open`, sends `Join` with the compatibility proof and completes.
    /// A `Closed` or `Error` event, or the timeout expiring, tears the
    /// channel down and fails the join; no partial state remains.
    pub fn poll(
        &mut self,
        connection: &mut PeerConnection,
        now_ms: u64,
    ) -> Result<JoinProgress, ConnectionError> {
        while let Some(event) = connection.poll_event() {
            match event {
                ChannelEvent::Open => {
                    info!(name = %self.name, "channel open, joining");
                    let join = Message::Join {
                        version: PROTOCOL_VERSION,
                        schema_hash: compute_schema_hash(),
                        name: self.name.clone(),
                        team: self.team.clone(),
                    };
                    connection.send(&join).map_err(|err| {
                        connection.close();
                        ConnectionError::ChannelLost(err.to_string())
                    })?;
                    return Ok(JoinProgress::Joined);
                }
                ChannelEvent::Closed => {
                    connection.close();
                    return Err(ConnectionError::ChannelLost("closed by peer".into()));
                }
                ChannelEvent::Error(reason) => {
                    connection.close();
                    return Err(ConnectionError::ChannelLost(reason));
                }
            }
        }

        if now_ms.saturating_sub(self.started_at_ms) >= JOIN_TIMEOUT_MS {
            debug!("join deadline passed");
            connection.close();
            return Err(ConnectionError::JoinTimeout);
        }
        Ok(JoinProgress::Waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    #[test]
    fn join_completes_once_the_channel_opens() {
        let (client, mut host) = MemoryChannel::pair();
        let mut connection = PeerConnection::new(Box::new(client));
        let mut handshake = JoinHandshake::new(0, "merlin", "red");

        assert_eq!(
            handshake.poll(&mut connection, 10).unwrap(),
            JoinProgress::Joined
        );

        host.poll_event();
        let frame = host.try_recv().expect("join frame sent");
        let msg = decode_message(&frame).unwrap();
        assert!(matches!(msg, Message::Join { ref name, .. } if name == "merlin"));
    }

    #[test]
    fn join_times_out_against_the_caller_clock() {
        let mut connection = PeerConnection::new(Box::new(MemoryChannel::dangling()));
        let mut handshake = JoinHandshake::new(1_000, "merlin", "red");

        assert_eq!(
            handshake.poll(&mut connection, 5_999).unwrap(),
            JoinProgress::Waiting
        );
        assert!(matches!(
            handshake.poll(&mut connection, 6_000),
            Err(ConnectionError::JoinTimeout)
        ));
    }

    #[test]
    fn peer_close_aborts_the_join() {
        let (client, mut host) = MemoryChannel::pair();
        let mut connection = PeerConnection::new(Box::new(client));
        // Drop the Open the pair seeded, then close from the host side.
        connection.poll_event();
        host.close();

        let mut handshake = JoinHandshake::new(0, "merlin", "red");
        assert!(matches!(
            handshake.poll(&mut connection, 10),
            Err(ConnectionError::ChannelLost(_))
        ));
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let (client, _host) = MemoryChannel::pair();
        let connection = PeerConnection::new(Box::new(client));
        assert!(connection.check_schema(PROTOCOL_VERSION, 1).is_err());
        assert!(connection
            .check_schema(PROTOCOL_VERSION, compute_schema_hash())
            .is_ok());
    }
}
