//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use beacon_core::ConnectionId;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, SendOutcome};
use super::handler::dispatch;
use crate::config::ServerConfig;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::service::PresenceService;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection with empty viewer state
/// 2. Applies inbound frames in receipt order
/// 3. Forwards queued outbound frames and sends periodic Pings
/// 4. Unregisters on disconnect; the presence record is left to expire
#[instrument(skip_all, fields(conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    service: Arc<PresenceService>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.outbound_buffer.max(1));
    let connection = Arc::new(ClientConnection::new(ConnectionId::new(), send_tx));
    let conn_id = connection.id.clone();
    let _ = tracing::Span::current().record("conn_id", conn_id.as_str());

    let connection_start = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    service.connections().register(connection.clone()).await;

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = connection.clone();
    let outbound_shutdown = shutdown.clone();
    let ping_every = config.ping_interval;
    let pong_timeout = config.pong_timeout;
    let closed = connection.close_token();
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive() && outbound_conn.last_pong_elapsed() > pong_timeout {
                        warn!(timeout = ?pong_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = closed.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                () = outbound_shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        // Stop the reader too if the writer gave up first.
        outbound_conn.close();
    });

    let closed = connection.close_token();
    loop {
        let next = tokio::select! {
            () = closed.cancelled() => break,
            () = shutdown.cancelled() => break,
            next = ws_rx.next() => next,
        };
        let Some(Ok(msg)) = next else { break };
        connection.mark_alive();

        // Binary frames carrying UTF-8 are treated as text.
        let text = match msg {
            Message::Text(ref t) => t.as_str(),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    s
                } else {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            }
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Some(reply) = dispatch(text, &connection, &service, Utc::now()).await {
            if connection.send_message(&reply) != SendOutcome::Sent {
                debug!("failed to enqueue reply (channel full or closed)");
            }
        }
    }

    // Clean up
    let _ = service.connections().unregister(&conn_id).await;
    connection.close();
    let _ = outbound.await;

    info!(
        duration_secs = connection_start.elapsed().as_secs(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
}
