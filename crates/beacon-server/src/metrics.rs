//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup; a second install fails.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// A handle backed by a recorder that is not installed globally.
///
/// Renders an empty exposition; used where no process-wide recorder exists.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Presence frames dropped on a full outbound queue (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Slow connections evicted by the scheduler (counter).
pub const WS_EVICTIONS_TOTAL: &str = "ws_evictions_total";
/// Broadcast ticks run (counter).
pub const PRESENCE_TICKS_TOTAL: &str = "presence_ticks_total";
/// Records removed by TTL sweep (counter).
pub const PRESENCE_SWEPT_TOTAL: &str = "presence_swept_total";
/// Live presence records after the last sweep (gauge).
pub const PRESENCE_RECORDS: &str = "presence_records";
/// Inbound frames discarded (counter, labels: reason).
pub const PROTOCOL_DISCARDED_TOTAL: &str = "protocol_discarded_total";
