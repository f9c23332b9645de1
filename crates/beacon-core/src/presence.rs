//! Presence records: the latest known state of one tracked identity.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::IdentityId;

/// Where an identity was last reported.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Game server the player is connected to.
    pub server: Option<String>,
    /// Dimension within that server.
    pub dimension: Option<String>,
}

/// A finite `(x, y, z)` position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Coords {
    /// Build coordinates, rejecting NaN and infinities.
    pub fn new(x: f64, y: f64, z: f64) -> Option<Self> {
        (x.is_finite() && y.is_finite() && z.is_finite()).then_some(Self { x, y, z })
    }

    /// Extract coordinates from an untyped `{"x","y","z"}` payload.
    ///
    /// All three axes must be JSON numbers. A partial or mistyped object
    /// yields `None` rather than a partially applied position.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let axis = |name: &str| obj.get(name).and_then(Value::as_f64);
        Self::new(axis("x")?, axis("y")?, axis("z")?)
    }
}

/// Presence state for one identity.
///
/// At most one record exists per [`IdentityId`]. Any update claiming the id
/// overwrites the mutable fields; there is no per-connection ownership.
#[derive(Clone, Debug, PartialEq)]
pub struct PresenceRecord {
    /// Stable identity key.
    pub id: IdentityId,
    /// Human-readable name.
    pub display_name: String,
    /// Last reported server/dimension.
    pub location: Location,
    /// Last reported position, only kept while tracking is granted.
    pub coords: Option<Coords>,
    /// Whether this identity currently holds the tracking capability.
    pub has_tracker: bool,
    /// Time of the last `hello` or `heartbeat`.
    pub last_seen_at: DateTime<Utc>,
}

impl PresenceRecord {
    /// An empty record for `id`, seen at `now`.
    pub fn new(id: IdentityId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name: String::new(),
            location: Location::default(),
            coords: None,
            has_tracker: false,
            last_seen_at: now,
        }
    }

    /// Whether the record has gone stale: `now - last_seen_at > ttl`.
    ///
    /// A `last_seen_at` in the future (clock skew) never counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        (now - self.last_seen_at)
            .to_std()
            .is_ok_and(|age| age > ttl)
    }
}
