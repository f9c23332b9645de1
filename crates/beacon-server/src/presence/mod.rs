//! Presence records and the periodic broadcast.

pub mod scheduler;
pub mod store;
