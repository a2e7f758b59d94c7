//! In-process rendezvous store for standalone mode and tests.
//!
//! Last-write-wins per-key records plus append-only logs, with change
//! notifications over a tokio broadcast channel. Subscribers re-read on
//! notification; no payload travels on the channel.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::interfaces::store::{ChangeEvent, ChangeKind, RendezvousStore, Result};
use crate::model::{PositionLogEntry, PublisherState};

/// Default capacity for the change feed.
const CHANNEL_CAPACITY: usize = 1024;

/// One stored log row with its auto-assigned id.
#[derive(Debug, Clone)]
struct LogRecord {
    id: Uuid,
    entry: PositionLogEntry,
}

/// In-memory store keyed like a document database:
/// `publishers/{id}` for state, `publishers/{id}/logs/{autoId}` for the
/// position log.
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, PublisherState>>,
    logs: RwLock<BTreeMap<String, Vec<LogRecord>>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Create a store with an explicit change-feed capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            records: RwLock::new(BTreeMap::new()),
            logs: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    fn notify(&self, publisher_id: &str, kind: ChangeKind) {
        // No receivers is fine for publish-only scenarios.
        let _ = self.events.send(ChangeEvent {
            publisher_id: publisher_id.to_string(),
            kind,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RendezvousStore for MemoryStore {
    async fn put_state(&self, publisher_id: &str, state: PublisherState) -> Result<()> {
        self.records
            .write()
            .await
            .insert(publisher_id.to_string(), state);

        debug!(publisher_id = %publisher_id, "state record written");
        self.notify(publisher_id, ChangeKind::State);
        Ok(())
    }

    async fn mark_inactive(&self, publisher_id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(publisher_id) {
            Some(state) => {
                state.active = false;
                drop(records);
                debug!(publisher_id = %publisher_id, "publisher marked inactive");
                self.notify(publisher_id, ChangeKind::State);
            }
            // Stop before any successful write: leave the store untouched.
            None => debug!(publisher_id = %publisher_id, "no record to mark inactive"),
        }
        Ok(())
    }

    async fn get_state(&self, publisher_id: &str) -> Result<Option<PublisherState>> {
        Ok(self.records.read().await.get(publisher_id).cloned())
    }

    async fn append_log(&self, publisher_id: &str, entry: PositionLogEntry) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.logs
            .write()
            .await
            .entry(publisher_id.to_string())
            .or_default()
            .push(LogRecord { id, entry });

        self.notify(publisher_id, ChangeKind::Log);
        Ok(id)
    }

    async fn get_log(&self, publisher_id: &str) -> Result<Vec<PositionLogEntry>> {
        Ok(self
            .logs
            .read()
            .await
            .get(publisher_id)
            .map(|records| records.iter().map(|r| r.entry.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_publishers(&self) -> Result<Vec<String>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}
