//! Ordered, reliable, message-oriented data channels.
//!
//! One channel carries whole frames in send order; no ordering exists across
//! different channels, so anything that must be globally ordered goes through
//! the host. The in-memory implementation backs tests and the headless
//! runner; a real transport implements the same trait.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::trace;

/// Lifecycle notification from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel is established; frames may flow.
    Open,
    /// The peer closed the channel.
    Closed,
    /// The underlying transport failed.
    Error(String),
}

/// Failure sending on a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel is closed on either end.
    #[error("channel closed")]
    Closed,
    /// The underlying transport failed.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// An ordered, reliable, message-oriented link to one peer.
pub trait DataChannel {
    /// Queue one frame for the peer. Frames arrive whole and in send order.
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError>;

    /// Take the next inbound frame, if one is waiting.
    fn try_recv(&mut self) -> Option<Vec<u8>>;

    /// Take the next lifecycle event, if one is pending.
    fn poll_event(&mut self) -> Option<ChannelEvent>;

    /// Close the channel; the peer observes `Closed`.
    fn close(&mut self);
}

#[derive(Debug, Default)]
struct Shared {
    /// Inbound frame queue per side.
    frames: [VecDeque<Vec<u8>>; 2],
    /// Pending lifecycle events per side.
    events: [VecDeque<ChannelEvent>; 2],
    closed: bool,
}

/// In-process channel endpoint.
#[derive(Debug)]
pub struct MemoryChannel {
    shared: Arc<Mutex<Shared>>,
    side: usize,
}

impl MemoryChannel {
    /// Create a connected pair; both ends observe `Open` immediately.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        for events in &mut lock(&shared).events {
            events.push_back(ChannelEvent::Open);
        }
        (
            MemoryChannel {
                shared: Arc::clone(&shared),
                side: 0,
            },
            MemoryChannel { shared, side: 1 },
        )
    }

    /// Create an endpoint that never opens: the peer side is never
    /// constructed. Joins against it can only time out.
    pub fn dangling() -> MemoryChannel {
        MemoryChannel {
            shared: Arc::new(Mutex::new(Shared::default())),
            side: 0,
        }
    }
}

fn lock(shared: &Arc<Mutex<Shared>>) -> std::sync::MutexGuard<'_, Shared> {
    // Single logical thread owns each pair; poisoning cannot arise from
    // contention, only from a panicking test, where unwinding further is fine.
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl DataChannel for MemoryChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        let mut shared = lock(&self.shared);
        if shared.closed {
            return Err(ChannelError::Closed);
        }
        trace!(len = bytes.len(), side = self.side, "frame queued");
        shared.frames[1 - self.side].push_back(bytes.to_vec());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        lock(&self.shared).frames[self.side].pop_front()
    }

    fn poll_event(&mut self) -> Option<ChannelEvent> {
        lock(&self.shared).events[self.side].pop_front()
    }

    fn close(&mut self) {
        let mut shared = lock(&self.shared);
        if !shared.closed {
            shared.closed = true;
            shared.events[1 - self.side].push_back(ChannelEvent::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_arrive_whole_and_in_order() {
        let (mut a, mut b) = MemoryChannel::pair();
        assert_eq!(a.poll_event(), Some(ChannelEvent::Open));
        assert_eq!(b.poll_event(), Some(ChannelEvent::Open));

        a.send(b"first").unwrap();
        a.send(b"second").unwrap();
        assert_eq!(b.try_recv().as_deref(), Some(&b"first"[..]));
        assert_eq!(b.try_recv().as_deref(), Some(&b"second"[..]));
        assert_eq!(b.try_recv(), None);
    }

    #[test]
    fn close_is_observed_by_the_peer() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.poll_event();
        b.poll_event();

        a.close();
        assert_eq!(b.poll_event(), Some(ChannelEvent::Closed));
        assert!(matches!(b.send(b"late"), Err(ChannelError::Closed)));
    }

    #[test]
    fn dangling_endpoint_never_opens() {
        let mut channel = MemoryChannel::dangling();
        assert_eq!(channel.poll_event(), None);
    }
}
