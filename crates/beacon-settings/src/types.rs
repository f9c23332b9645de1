//! Settings types.
//!
//! Every struct uses `#[serde(default)]` so a partial settings file only
//! needs the keys it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconSettings {
    /// Network and WebSocket settings.
    pub server: ServerSettings,
    /// Presence broadcast tuning.
    pub presence: PresenceSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl BeaconSettings {
    /// Reject values the server cannot run with.
    ///
    /// Reports the first offending field; see [`sanitize`](Self::sanitize)
    /// for the full list.
    pub fn validate(&self) -> Result<()> {
        match self.clone().sanitize().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Reset each value the server cannot run with to its default.
    ///
    /// Returns one [`SettingsError::InvalidValue`] per reset field. Valid
    /// fields are left alone.
    pub fn sanitize(&mut self) -> Vec<SettingsError> {
        let defaults = Self::default();
        let mut problems = Vec::new();

        if self.presence.broadcast_interval_ms == 0 {
            problems.push(SettingsError::invalid(
                "presence.broadcastIntervalMs",
                "must be greater than 0",
            ));
            self.presence.broadcast_interval_ms = defaults.presence.broadcast_interval_ms;
        }
        if self.presence.presence_ttl_ms == 0 {
            problems.push(SettingsError::invalid(
                "presence.presenceTtlMs",
                "must be greater than 0",
            ));
            self.presence.presence_ttl_ms = defaults.presence.presence_ttl_ms;
        }
        if !self.server.ws_path.starts_with('/') {
            problems.push(SettingsError::invalid(
                "server.wsPath",
                format!("must start with '/', got {:?}", self.server.ws_path),
            ));
            self.server.ws_path = defaults.server.ws_path;
        }
        if self.server.outbound_buffer == 0 {
            problems.push(SettingsError::invalid(
                "server.outboundBuffer",
                "must be greater than 0",
            ));
            self.server.outbound_buffer = defaults.server.outbound_buffer;
        }
        if self.server.ping_interval_secs == 0 {
            problems.push(SettingsError::invalid(
                "server.pingIntervalSecs",
                "must be greater than 0",
            ));
            self.server.ping_interval_secs = defaults.server.ping_interval_secs;
        }
        problems
    }
}

/// Server network and WebSocket settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Path of the WebSocket endpoint.
    pub ws_path: String,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
    /// Seconds between server-initiated Ping frames.
    pub ping_interval_secs: u64,
    /// Seconds without a Pong before a client is dropped.
    pub pong_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            ws_path: "/ws".to_string(),
            max_message_size: 64 * 1024,
            outbound_buffer: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
        }
    }
}

impl ServerSettings {
    /// Ping interval as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Pong timeout as a [`Duration`].
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

/// Presence broadcast settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceSettings {
    /// Milliseconds between broadcast ticks.
    pub broadcast_interval_ms: u64,
    /// Milliseconds without an update before a record is swept.
    pub presence_ttl_ms: u64,
    /// Lifetime dropped sends after which a slow connection is evicted.
    pub max_send_drops: u64,
    /// Dimension assigned by `hello` before the first heartbeat reports one.
    pub baseline_dimension: String,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: 2_000,
            presence_ttl_ms: 30_000,
            max_send_drops: 100,
            baseline_dimension: "minecraft:overworld".to_string(),
        }
    }
}

impl PresenceSettings {
    /// Broadcast interval as a [`Duration`].
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Presence TTL as a [`Duration`].
    pub fn presence_ttl(&self) -> Duration {
        Duration::from_millis(self.presence_ttl_ms)
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (`RUST_LOG` takes precedence).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
