//! Per-viewer visibility filter.
//!
//! Coordinates are disclosed only under mutual consent: the viewer and the
//! target must both hold the tracking capability, and the target must have
//! reported a position.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::IdentityId;
use crate::presence::{Coords, PresenceRecord};

/// What a connection is allowed to see, as last declared by that connection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewerState {
    /// Identity claimed via `hello`, if any.
    pub bound_identity: Option<IdentityId>,
    /// Tracking capability this connection last declared.
    pub has_tracker: bool,
    /// Opaque value echoed from `hello`; no effect on visibility.
    pub client_nonce: Option<Value>,
}

/// The disclosed view of one presence record, in wire shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicView {
    /// Identity ID.
    pub mc_uuid: IdentityId,
    /// Display name.
    pub mc_name: String,
    /// Server, `null` until reported.
    pub server: Option<String>,
    /// Dimension, `null` until reported.
    pub dimension: Option<String>,
    /// Last update, milliseconds since the Unix epoch.
    pub last_seen: i64,
    /// Whether the target holds the tracking capability.
    pub has_tracker: bool,
    /// Position; omitted from the frame unless consent is mutual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coords>,
}

/// Compute the view of `record` that `viewer` may see.
pub fn disclose(record: &PresenceRecord, viewer: &ViewerState) -> PublicView {
    let coords = if viewer.has_tracker && record.has_tracker {
        record.coords
    } else {
        None
    };
    PublicView {
        mc_uuid: record.id.clone(),
        mc_name: record.display_name.clone(),
        server: record.location.server.clone(),
        dimension: record.location.dimension.clone(),
        last_seen: record.last_seen_at.timestamp_millis(),
        has_tracker: record.has_tracker,
        coords,
    }
}
