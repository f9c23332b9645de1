//! Inbound message dispatch: parses a text frame and applies it to the
//! connection's viewer state and the presence store.

use beacon_core::{
    Heartbeat, Hello, InboundMessage, Location, OutboundMessage, PresenceRecord,
    ProtocolError, SetTrackerFlag,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, instrument};

use super::connection::ClientConnection;
use crate::metrics::PROTOCOL_DISCARDED_TOTAL;
use crate::service::PresenceService;

/// Handle one inbound frame, discarding it on any protocol error.
///
/// Discards are logged at debug level and counted; nothing is sent back and
/// the connection stays open.
#[instrument(skip_all, fields(conn_id = %conn.id))]
pub async fn dispatch(
    text: &str,
    conn: &ClientConnection,
    service: &PresenceService,
    now: DateTime<Utc>,
) -> Option<OutboundMessage> {
    match handle_message(text, conn, service, now).await {
        Ok(reply) => reply,
        Err(err) => {
            debug!(reason = err.label(), error = %err, "discarded inbound frame");
            counter!(PROTOCOL_DISCARDED_TOTAL, "reason" => err.label()).increment(1);
            None
        }
    }
}

/// Parse and apply one inbound frame.
///
/// Returns the reply to send, if the message has one.
pub async fn handle_message(
    text: &str,
    conn: &ClientConnection,
    service: &PresenceService,
    now: DateTime<Utc>,
) -> Result<Option<OutboundMessage>, ProtocolError> {
    match InboundMessage::parse(text)? {
        InboundMessage::Hello(hello) => on_hello(hello, conn, service, now).await,
        InboundMessage::Heartbeat(hb) => on_heartbeat(hb, conn, service, now),
        InboundMessage::SetTrackerFlag(flag) => on_set_tracker_flag(flag, conn, service).await,
    }
}

async fn on_hello(
    hello: Hello,
    conn: &ClientConnection,
    service: &PresenceService,
    now: DateTime<Utc>,
) -> Result<Option<OutboundMessage>, ProtocolError> {
    let granted = service
        .entitlements()
        .has_tracking_capability(Some(&hello.mc_uuid), hello.has_tracker)
        .await;

    conn.update_viewer(|v| {
        v.bound_identity = Some(hello.mc_uuid.clone());
        v.has_tracker = granted;
        v.client_nonce = hello.client_nonce;
    });

    let baseline = service.config().baseline_dimension.clone();
    let _ = service.store().upsert(hello.mc_uuid.clone(), now, |r| {
        r.display_name = hello.mc_name;
        r.location = Location {
            server: hello.server,
            dimension: Some(baseline),
        };
        r.coords = None;
        r.has_tracker = granted;
    });

    debug!(identity = %hello.mc_uuid, has_tracker = granted, "hello accepted");
    Ok(Some(OutboundMessage::HelloAck { ok: true }))
}

fn on_heartbeat(
    hb: Heartbeat,
    conn: &ClientConnection,
    service: &PresenceService,
    now: DateTime<Utc>,
) -> Result<Option<OutboundMessage>, ProtocolError> {
    let viewer = conn.viewer();
    let Some(identity) = viewer.bound_identity else {
        return Err(ProtocolError::Unbound { kind: "heartbeat" });
    };

    let coords = if viewer.has_tracker { hb.coords } else { None };

    // A swept record comes back under the identity's own id until the next hello.
    let has_tracker = viewer.has_tracker;
    let _ = service.store().upsert_seeded(
        identity,
        now,
        |id, now| PresenceRecord {
            display_name: id.to_string(),
            has_tracker,
            ..PresenceRecord::new(id, now)
        },
        |r| {
            if let Some(server) = hb.server {
                r.location.server = Some(server);
            }
            if let Some(dimension) = hb.dimension {
                r.location.dimension = Some(dimension);
            }
            r.coords = coords;
        },
    );
    Ok(None)
}

async fn on_set_tracker_flag(
    flag: SetTrackerFlag,
    conn: &ClientConnection,
    service: &PresenceService,
) -> Result<Option<OutboundMessage>, ProtocolError> {
    if service.connections().get(&conn.id).await.is_none() {
        return Err(ProtocolError::Unregistered {
            kind: "set_tracker_flag",
        });
    }

    let identity = conn.bound_identity();
    let granted = service
        .entitlements()
        .has_tracking_capability(identity.as_ref(), flag.has_tracker)
        .await;
    conn.update_viewer(|v| v.has_tracker = granted);

    if let Some(id) = identity {
        let _ = service
            .store()
            .update_existing(&id, |r| r.has_tracker = granted);
    }
    Ok(None)
}
