//! Process-wide entity id allocation.
//!
//! Replicated entities must carry the same id on every peer without a
//! negotiation round-trip: the peer that first constructs an entity calls
//! [`IdAllocator::set`] with the id it intends to use (self-chosen on the
//! host, or the value received in a `Spawn`/`SyncPlayers` message on a
//! follower) so subsequent local allocations continue from the same baseline
//! on both sides.

use serde::{Deserialize, Serialize};

/// Process-unique entity identifier.
pub type EntityId = u64;

/// Monotonically increasing id counter.
///
/// Owned by the world and passed explicitly into spawn paths; tests inject an
/// isolated allocator per simulation instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: EntityId,
}

impl IdAllocator {
    /// Create an allocator starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next id and advance the counter.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Install the next id to hand out.
    ///
    /// Must be called before constructing a remotely-originated entity so
    /// that [`allocate`](Self::allocate) yields the agreed id.
    pub fn set(&mut self, id: EntityId) {
        self.next = id;
    }

    /// The id the next call to [`allocate`](Self::allocate) will return.
    pub fn peek(&self) -> EntityId {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_post_increments() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate(), 0);
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.peek(), 2);
    }

    #[test]
    fn peers_agree_after_set() {
        // Peer 1 spawns an entity with id 7; peer 2 learns of it and installs
        // the same id. Both then allocate locally in the same relative order.
        let mut host = IdAllocator::new();
        let mut follower = IdAllocator::new();

        host.set(7);
        follower.set(7);
        assert_eq!(host.allocate(), follower.allocate());

        let host_ids: Vec<_> = (0..4).map(|_| host.allocate()).collect();
        let follower_ids: Vec<_> = (0..4).map(|_| follower.allocate()).collect();
        assert_eq!(host_ids, follower_ids);
        assert_eq!(host_ids, vec![8, 9, 10, 11]);
    }
}
