//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use beacon_core::{ConnectionId, IdentityId, OutboundMessage, ViewerState};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Result of a non-blocking send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued for the writer task.
    Sent,
    /// Outbound queue at capacity; the frame was dropped.
    Full,
    /// Writer task is gone; the connection is closing.
    Closed,
}

/// Represents a connected WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Identity binding and capability for this viewer.
    viewer: Mutex<ViewerState>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// Whether the client has shown activity since the last ping.
    is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to full channel.
    dropped_messages: AtomicU64,
    /// Fired to tear down the session from outside the reader loop.
    closed: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection with empty viewer state.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            viewer: Mutex::new(ViewerState::default()),
            tx,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(Instant::now()),
            dropped_messages: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Copy of the current viewer state.
    pub fn viewer(&self) -> ViewerState {
        self.viewer.lock().clone()
    }

    /// Replace the viewer state.
    pub fn set_viewer(&self, state: ViewerState) {
        *self.viewer.lock() = state;
    }

    /// Mutate the viewer state in place.
    pub fn update_viewer<R>(&self, f: impl FnOnce(&mut ViewerState) -> R) -> R {
        f(&mut self.viewer.lock())
    }

    /// Identity bound by `hello`, if any.
    pub fn bound_identity(&self) -> Option<IdentityId> {
        self.viewer.lock().bound_identity.clone()
    }

    /// Whether this viewer currently holds the tracking capability.
    pub fn has_tracker(&self) -> bool {
        self.viewer.lock().has_tracker
    }

    /// Queue a text frame without blocking.
    ///
    /// A full queue increments the drop counter.
    pub fn send(&self, message: Arc<String>) -> SendOutcome {
        match self.tx.try_send(message) {
            Ok(()) => SendOutcome::Sent,
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Full
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Serialize an outbound message and queue it.
    pub fn send_message(&self, message: &OutboundMessage) -> SendOutcome {
        match serde_json::to_string(message) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize outbound message");
                SendOutcome::Closed
            }
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Ask the session to shut down.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token that fires when the connection is closed.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("viewer", &*self.viewer.lock())
            .field("dropped_messages", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(cap: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(cap);
        (ClientConnection::new(ConnectionId::new(), tx), rx)
    }

    #[test]
    fn new_connection_is_unbound() {
        let (conn, _rx) = make_connection(4);
        assert!(conn.bound_identity().is_none());
        assert!(!conn.has_tracker());
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection(4);
        assert_eq!(conn.send(Arc::new("hello".into())), SendOutcome::Sent);
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn send_to_closed_channel() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert_eq!(conn.send(Arc::new("x".into())), SendOutcome::Closed);
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn send_to_full_channel_counts_drop() {
        let (conn, _rx) = make_connection(1);
        assert_eq!(conn.send(Arc::new("1".into())), SendOutcome::Sent);
        assert_eq!(conn.send(Arc::new("2".into())), SendOutcome::Full);
        assert_eq!(conn.send(Arc::new("3".into())), SendOutcome::Full);
        assert_eq!(conn.drop_count(), 2);
    }

    #[tokio::test]
    async fn send_message_serializes() {
        let (conn, mut rx) = make_connection(4);
        let _ = conn.send_message(&OutboundMessage::HelloAck { ok: true });
        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed, serde_json::json!({"type": "hello_ack", "ok": true}));
    }

    #[test]
    fn viewer_updates() {
        let (conn, _rx) = make_connection(4);
        conn.update_viewer(|v| {
            v.bound_identity = Some("a".into());
            v.has_tracker = true;
        });
        assert_eq!(conn.bound_identity(), Some(IdentityId::from("a")));
        assert!(conn.has_tracker());

        conn.set_viewer(ViewerState::default());
        assert!(conn.bound_identity().is_none());
    }

    #[test]
    fn mark_alive_and_check() {
        let (conn, _rx) = make_connection(4);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[tokio::test]
    async fn close_fires_token() {
        let (conn, _rx) = make_connection(4);
        let token = conn.close_token();
        conn.close();
        assert!(conn.is_closed());
        token.cancelled().await;
    }
}
