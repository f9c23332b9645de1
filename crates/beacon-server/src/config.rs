//! Runtime configuration for the server and the broadcast engine.

use std::time::Duration;

use beacon_settings::{BeaconSettings, PresenceSettings, ServerSettings};

/// Network and per-connection settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// `WebSocket` endpoint path.
    pub ws_path: String,
    /// Max inbound `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity per connection.
    pub outbound_buffer: usize,
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// How long a client may stay silent before it is dropped.
    pub pong_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            ws_path: s.ws_path.clone(),
            max_message_size: s.max_message_size,
            outbound_buffer: s.outbound_buffer,
            ping_interval: s.ping_interval(),
            pong_timeout: s.pong_timeout(),
        }
    }
}

/// Presence engine tuning.
#[derive(Clone, Debug)]
pub struct PresenceConfig {
    /// Time between broadcast ticks.
    pub broadcast_interval: Duration,
    /// Records idle longer than this are swept.
    pub presence_ttl: Duration,
    /// Lifetime dropped sends before a slow connection is evicted.
    pub max_send_drops: u64,
    /// Dimension a fresh `hello` starts in.
    pub baseline_dimension: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self::from(&PresenceSettings::default())
    }
}

impl From<&PresenceSettings> for PresenceConfig {
    fn from(s: &PresenceSettings) -> Self {
        Self {
            broadcast_interval: s.broadcast_interval(),
            presence_ttl: s.presence_ttl(),
            max_send_drops: s.max_send_drops,
            baseline_dimension: s.baseline_dimension.clone(),
        }
    }
}

/// Split loaded settings into server and presence configuration.
pub fn from_settings(settings: &BeaconSettings) -> (ServerConfig, PresenceConfig) {
    (
        ServerConfig::from(&settings.server),
        PresenceConfig::from(&settings.presence),
    )
}
