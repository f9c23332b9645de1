//! # beacon-core
//!
//! Shared vocabulary for the Beacon presence service.
//!
//! - **Branded IDs**: `IdentityId`, `ConnectionId` as newtypes for type safety
//! - **Presence records**: `PresenceRecord`, `Location`, `Coords`
//! - **Visibility**: `ViewerState`, `PublicView`, and the [`disclose`] filter
//! - **Wire protocol**: `InboundMessage` / `OutboundMessage` JSON frames
//! - **Errors**: `ProtocolError` classifying discarded frames

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod presence;
pub mod protocol;
pub mod visibility;

pub use errors::ProtocolError;
pub use ids::{ConnectionId, IdentityId};
pub use presence::{Coords, Location, PresenceRecord};
pub use protocol::{Heartbeat, Hello, InboundMessage, OutboundMessage, SetTrackerFlag};
pub use visibility::{PublicView, ViewerState, disclose};
