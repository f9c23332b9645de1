//! # beacon-server
//!
//! Presence & visibility broadcast engine behind an Axum HTTP + `WebSocket`
//! server.
//!
//! - Presence store: one record per identity, swept by TTL
//! - Connection registry: per-connection viewer state and outbound queue
//! - Broadcast scheduler: periodic full snapshots, filtered per viewer
//! - Protocol handler: `hello` / `heartbeat` / `set_tracker_flag`
//! - HTTP endpoints: `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod entitlement;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod presence;
pub mod server;
pub mod service;
pub mod websocket;

pub use config::{PresenceConfig, ServerConfig};
pub use entitlement::{AllowListEntitlement, ClaimedEntitlement, EntitlementVerifier};
pub use errors::ServerError;
pub use presence::scheduler::{BroadcastScheduler, TickReport};
pub use presence::store::PresenceStore;
pub use server::{BeaconServer, SHUTDOWN_GRACE};
pub use service::PresenceService;
pub use websocket::registry::ConnectionRegistry;
