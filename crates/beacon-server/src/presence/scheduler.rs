//! Periodic presence broadcast.
//!
//! Each tick sweeps expired records, then sends every open connection a full
//! snapshot filtered through [`disclose`]. A payload depends only on whether
//! the viewer holds the tracking capability, so at most two variants are
//! serialized per tick and shared across recipients.

use std::sync::Arc;

use beacon_core::{OutboundMessage, PresenceRecord, ViewerState, disclose};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{
    PRESENCE_RECORDS, PRESENCE_SWEPT_TOTAL, PRESENCE_TICKS_TOTAL, WS_BROADCAST_DROPS_TOTAL,
    WS_EVICTIONS_TOTAL,
};
use crate::service::PresenceService;
use crate::websocket::connection::SendOutcome;

/// Outcome of one broadcast tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Records removed by the TTL sweep.
    pub swept: usize,
    /// Connections the snapshot was queued for.
    pub recipients: usize,
    /// Connections found closed at send time.
    pub skipped: usize,
    /// Connections whose outbound queue was full.
    pub dropped: usize,
    /// Connections evicted for too many dropped frames.
    pub evicted: usize,
}

/// Drives sweep-then-broadcast on a fixed interval.
#[derive(Debug)]
pub struct BroadcastScheduler {
    service: Arc<PresenceService>,
}

impl BroadcastScheduler {
    /// Create a scheduler over `service`.
    pub fn new(service: Arc<PresenceService>) -> Self {
        Self { service }
    }

    /// Run one tick at the current wall-clock time.
    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick as if the time were `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let config = self.service.config();
        let store = self.service.store();

        let swept = store.sweep_expired(now, config.presence_ttl);
        for id in &swept {
            debug!(identity = %id, "presence expired");
        }
        let records = store.all();

        counter!(PRESENCE_TICKS_TOTAL).increment(1);
        counter!(PRESENCE_SWEPT_TOTAL).increment(u64::try_from(swept.len()).unwrap_or(u64::MAX));
        #[allow(clippy::cast_precision_loss)]
        gauge!(PRESENCE_RECORDS).set(records.len() as f64);

        let mut report = TickReport {
            swept: swept.len(),
            ..TickReport::default()
        };
        let mut payloads = PayloadCache::new(&records);

        for (conn, viewer) in self.service.connections().all().await {
            let Some(payload) = payloads.for_viewer(&viewer) else {
                continue;
            };
            match conn.send(payload) {
                SendOutcome::Sent => report.recipients += 1,
                SendOutcome::Closed => report.skipped += 1,
                SendOutcome::Full => {
                    report.dropped += 1;
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    let drops = conn.drop_count();
                    warn!(conn_id = %conn.id, drops, "outbound queue full, presence frame dropped");

                    if drops >= config.max_send_drops {
                        let _ = self.service.connections().unregister(&conn.id).await;
                        conn.close();
                        report.evicted += 1;
                        counter!(WS_EVICTIONS_TOTAL).increment(1);
                        warn!(conn_id = %conn.id, drops, "evicting slow connection");
                    }
                }
            }
        }

        debug!(
            records = records.len(),
            swept = report.swept,
            recipients = report.recipients,
            dropped = report.dropped,
            "presence tick"
        );
        report
    }

    /// Tick every `broadcast_interval` until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.service.config().broadcast_interval;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = period.as_millis(), "broadcast scheduler started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let _ = self.tick().await;
                }
            }
        }
        info!("broadcast scheduler stopped");
    }
}

/// Lazily serialized snapshot, one slot per capability value.
struct PayloadCache<'a> {
    records: &'a [PresenceRecord],
    slots: [Option<Arc<String>>; 2],
}

impl<'a> PayloadCache<'a> {
    fn new(records: &'a [PresenceRecord]) -> Self {
        Self {
            records,
            slots: [None, None],
        }
    }

    fn for_viewer(&mut self, viewer: &ViewerState) -> Option<Arc<String>> {
        let slot = &mut self.slots[usize::from(viewer.has_tracker)];
        if slot.is_none() {
            let message = OutboundMessage::Presence {
                players: self.records.iter().map(|r| disclose(r, viewer)).collect(),
            };
            match serde_json::to_string(&message) {
                Ok(json) => *slot = Some(Arc::new(json)),
                Err(e) => {
                    warn!(error = %e, "failed to serialize presence payload");
                    return None;
                }
            }
        }
        slot.clone()
    }
}
