#![warn(missing_docs)]
//! Authoritative host session: seating, input application, world stepping
//! and replication of host-resolved events.

mod session;

pub use session::{HostSession, CHARACTERS_PER_PLAYER};
