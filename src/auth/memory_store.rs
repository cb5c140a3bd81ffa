//! In-process session store with expiry sweeping.
//!
//! Anonymous visitors get a record as soon as a page hands out a CSRF token,
//! so expired records must actually leave the map: [`load`] drops the one it
//! was asked for and [`delete_expired`] sweeps the rest. Both are driven by
//! the session cleanup task in [`AppState`](crate::state::AppState).
//!
//! [`load`]: SessionStore::load
//! [`delete_expired`]: ExpiredDeletion::delete_expired

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, ExpiredDeletion, SessionStore};

/// Session records keyed by id. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<DashMap<Id, Record>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records currently held, expired or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn is_expired(record: &Record, now: OffsetDateTime) -> bool {
    record.expiry_date <= now
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        loop {
            match self.records.entry(record.id) {
                // Id collision: draw another
                Entry::Occupied(_) => record.id = Id::default(),
                Entry::Vacant(slot) => {
                    slot.insert(record.clone());
                    return Ok(());
                }
            }
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        self.records
            .remove_if(session_id, |_, record| is_expired(record, now));

        Ok(self.records.get(session_id).map(|record| record.clone()))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.records.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for MemorySessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let now = OffsetDateTime::now_utc();
        self.records.retain(|_, record| !is_expired(record, now));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use time::Duration;

    use super::*;

    fn record(expires_in: Duration) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::new(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemorySessionStore::new();
        let mut live = record(Duration::hours(1));
        store.create(&mut live).await.unwrap();

        let loaded = store.load(&live.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, live.id);

        store.delete(&live.id).await.unwrap();
        assert!(store.load(&live.id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_load_removes_expired_record() {
        let store = MemorySessionStore::new();
        let mut stale = record(Duration::hours(-1));
        store.create(&mut stale).await.unwrap();
        assert_eq!(store.len(), 1);

        assert!(store.load(&stale.id).await.unwrap().is_none());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired_sweeps_only_stale_records() {
        let store = MemorySessionStore::new();
        for _ in 0..3 {
            store.create(&mut record(Duration::hours(-1))).await.unwrap();
        }
        let mut live = record(Duration::hours(1));
        store.create(&mut live).await.unwrap();
        assert_eq!(store.len(), 4);

        store.delete_expired().await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.load(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_replaces_colliding_id() {
        let store = MemorySessionStore::new();
        let mut first = record(Duration::hours(1));
        store.create(&mut first).await.unwrap();

        let mut second = record(Duration::hours(1));
        second.id = first.id;
        store.create(&mut second).await.unwrap();

        assert_ne!(second.id, first.id);
        assert_eq!(store.len(), 2);
    }
}
