//! Keyed registry of presence records.
//!
//! Backed by a sharded map, so every operation on one identity is a single
//! read-modify-write under that shard's lock and a sweep never holds a lock
//! across the whole registry.

use std::time::Duration;

use beacon_core::{IdentityId, PresenceRecord};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// In-memory presence records, one per identity.
#[derive(Debug, Default)]
pub struct PresenceStore {
    records: DashMap<IdentityId, PresenceRecord>,
}

impl PresenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update the record for `id`, then stamp `last_seen_at = now`.
    ///
    /// Returns a copy of the record as written.
    pub fn upsert(
        &self,
        id: IdentityId,
        now: DateTime<Utc>,
        mutate: impl FnOnce(&mut PresenceRecord),
    ) -> PresenceRecord {
        self.upsert_seeded(id, now, PresenceRecord::new, mutate)
    }

    /// Like [`upsert`](Self::upsert), but a missing record starts from `seed`.
    pub fn upsert_seeded(
        &self,
        id: IdentityId,
        now: DateTime<Utc>,
        seed: impl FnOnce(IdentityId, DateTime<Utc>) -> PresenceRecord,
        mutate: impl FnOnce(&mut PresenceRecord),
    ) -> PresenceRecord {
        let mut entry = self
            .records
            .entry(id.clone())
            .or_insert_with(|| seed(id, now));
        mutate(entry.value_mut());
        entry.last_seen_at = now;
        entry.value().clone()
    }

    /// Mutate an existing record without touching `last_seen_at`.
    ///
    /// Returns `false` if there is no record for `id`.
    pub fn update_existing(&self, id: &IdentityId, mutate: impl FnOnce(&mut PresenceRecord)) -> bool {
        match self.records.get_mut(id) {
            Some(mut record) => {
                mutate(record.value_mut());
                true
            }
            None => false,
        }
    }

    /// Copy of one record.
    pub fn get(&self, id: &IdentityId) -> Option<PresenceRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// Snapshot of every record, ordered by identity.
    pub fn all(&self) -> Vec<PresenceRecord> {
        let mut out: Vec<PresenceRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Remove every record with `now - last_seen_at > ttl`.
    ///
    /// Returns the identities that were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<IdentityId> {
        let mut removed = Vec::new();
        self.records.retain(|id, record| {
            if record.is_expired(now, ttl) {
                removed.push(id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{Coords, Location};
    use std::sync::Arc;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    const TTL: Duration = Duration::from_millis(30_000);

    #[test]
    fn upsert_creates_missing_record() {
        let store = PresenceStore::new();
        let rec = store.upsert("a".into(), at(1_000), |r| r.display_name = "Alex".into());
        assert_eq!(rec.display_name, "Alex");
        assert_eq!(rec.last_seen_at, at(1_000));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upsert_overwrites_and_refreshes_timestamp() {
        let store = PresenceStore::new();
        let _ = store.upsert("a".into(), at(1_000), |r| {
            r.display_name = "One".into();
            r.has_tracker = true;
        });
        let rec = store.upsert("a".into(), at(5_000), |r| r.display_name = "Two".into());
        assert_eq!(rec.display_name, "Two");
        assert!(rec.has_tracker, "fields not touched by the mutator are kept");
        assert_eq!(rec.last_seen_at, at(5_000));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upsert_seeded_only_seeds_new_records() {
        let store = PresenceStore::new();
        let seed = |id: IdentityId, now| PresenceRecord {
            display_name: id.to_string(),
            has_tracker: true,
            ..PresenceRecord::new(id, now)
        };
        let rec = store.upsert_seeded("a".into(), at(0), seed, |_| {});
        assert_eq!(rec.display_name, "a");
        assert!(rec.has_tracker);

        let _ = store.upsert("a".into(), at(1), |r| r.has_tracker = false);
        let rec = store.upsert_seeded("a".into(), at(2), seed, |_| {});
        assert!(!rec.has_tracker);
    }

    #[test]
    fn update_existing_leaves_timestamp() {
        let store = PresenceStore::new();
        let _ = store.upsert("a".into(), at(1_000), |_| {});
        assert!(store.update_existing(&"a".into(), |r| r.has_tracker = true));
        let rec = store.get(&"a".into()).unwrap();
        assert!(rec.has_tracker);
        assert_eq!(rec.last_seen_at, at(1_000));
    }

    #[test]
    fn update_existing_missing_is_noop() {
        let store = PresenceStore::new();
        assert!(!store.update_existing(&"ghost".into(), |r| r.has_tracker = true));
        assert!(store.is_empty());
    }

    #[test]
    fn all_is_sorted_by_identity() {
        let store = PresenceStore::new();
        for id in ["c", "a", "b"] {
            let _ = store.upsert(id.into(), at(0), |_| {});
        }
        let ids: Vec<String> = store.all().into_iter().map(|r| r.id.into_inner()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn all_is_a_snapshot() {
        let store = PresenceStore::new();
        let _ = store.upsert("a".into(), at(0), |r| {
            r.coords = Coords::new(1.0, 2.0, 3.0);
            r.location = Location::default();
        });
        let snapshot = store.all();
        let _ = store.upsert("a".into(), at(1), |r| r.coords = None);
        assert!(snapshot[0].coords.is_some());
    }

    #[test]
    fn sweep_removes_only_expired() {
        let store = PresenceStore::new();
        let _ = store.upsert("old".into(), at(0), |_| {});
        let _ = store.upsert("fresh".into(), at(20_000), |_| {});

        let removed = store.sweep_expired(at(30_000), TTL);
        assert!(removed.is_empty(), "exactly ttl old is not expired");

        let removed = store.sweep_expired(at(30_001), TTL);
        assert_eq!(removed, vec![IdentityId::from("old")]);
        assert!(store.get(&"old".into()).is_none());
        assert!(store.get(&"fresh".into()).is_some());
    }

    #[test]
    fn heartbeat_keeps_record_alive() {
        let store = PresenceStore::new();
        let _ = store.upsert("a".into(), at(0), |_| {});
        let _ = store.upsert("a".into(), at(25_000), |_| {});
        assert!(store.sweep_expired(at(40_000), TTL).is_empty());
        assert_eq!(store.sweep_expired(at(55_001), TTL).len(), 1);
    }

    #[test]
    fn concurrent_upserts_keep_one_record_per_identity() {
        let store = Arc::new(PresenceStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let id = IdentityId::from(format!("p{}", i % 10));
                        let _ = store.upsert(id, at(i64::from(t) * 1_000 + i64::from(i)), |r| {
                            r.display_name = format!("thread-{t}");
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 10);
    }
}
