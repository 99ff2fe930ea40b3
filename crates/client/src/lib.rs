#![warn(missing_docs)]
//! Follower session: local simulation corrected by authoritative messages.

mod session;

pub use session::ClientSession;
