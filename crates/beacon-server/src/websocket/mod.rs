//! WebSocket connection handling, registry, and per-client sessions.

pub mod connection;
pub mod handler;
pub mod registry;
pub mod session;
