//! Rider-side snapshot delivery.
//!
//! Subscriptions push full snapshots, never deltas: the initial read is
//! delivered immediately, then every state write triggers a re-fetch
//! and a fresh snapshot. Missing a notification therefore loses nothing
//! but latency; the next snapshot carries the complete current view.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::interfaces::store::{ChangeKind, RendezvousStore};
use crate::model::{FleetView, PublisherView};

/// Errors delivered through a subscription instead of a snapshot.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubscriptionError {
    /// The change feed overflowed and `n` notifications were dropped.
    /// The subscription recovers on the next notification.
    #[error("change feed lagged, {0} notifications dropped")]
    Lagged(u64),

    /// A snapshot re-fetch failed; the subscription stays open.
    #[error("snapshot read failed: {0}")]
    Read(String),

    /// The store's change feed closed. Terminal.
    #[error("change feed closed")]
    Closed,
}

/// What a single-publisher subscription delivers.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    Snapshot(PublisherView),
    Error(SubscriptionError),
}

/// What a fleet-wide subscription delivers.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    Snapshot(FleetView),
    Error(SubscriptionError),
}

/// Consumer of single-publisher snapshots.
pub trait ViewSink: Send + Sync {
    fn deliver(&self, event: ViewEvent) -> BoxFuture<'static, ()>;
}

/// Consumer of fleet snapshots.
pub trait FleetSink: Send + Sync {
    fn deliver(&self, event: FleetEvent) -> BoxFuture<'static, ()>;
}

/// Cancellation handle for one subscription.
///
/// Dropping the handle cancels the subscription; `close` does the same
/// explicitly. Closing is idempotent and delivers nothing further.
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn close(self) {
        self.task.abort();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Snapshot-delivering reader over a rendezvous store.
pub struct Subscriber {
    store: Arc<dyn RendezvousStore>,
}

impl Subscriber {
    pub fn new(store: Arc<dyn RendezvousStore>) -> Self {
        Self { store }
    }

    /// Subscribe to one publisher's tri-state view.
    ///
    /// The sink receives the current view immediately, then a fresh one
    /// after every state write for that publisher. The change feed
    /// receiver is opened before the initial read so no write between
    /// read and listen is ever missed.
    pub fn subscribe_one(
        &self,
        publisher_id: impl Into<String>,
        sink: Box<dyn ViewSink>,
    ) -> SubscriptionHandle {
        let publisher_id = publisher_id.into();
        let store = self.store.clone();
        let mut changes = store.changes();

        let task = tokio::spawn(async move {
            info!(publisher_id = %publisher_id, "subscription opened");
            deliver_current(&publisher_id, store.as_ref(), sink.as_ref()).await;

            loop {
                match changes.recv().await {
                    Ok(event) => {
                        if event.kind != ChangeKind::State || event.publisher_id != publisher_id {
                            continue;
                        }
                        deliver_current(&publisher_id, store.as_ref(), sink.as_ref()).await;
                    }
                    Err(RecvError::Lagged(n)) => {
                        // Snapshots are self-contained, so a lag only
                        // delays the view until the next notification.
                        warn!(publisher_id = %publisher_id, dropped = n, "change feed lagged");
                        sink.deliver(ViewEvent::Error(SubscriptionError::Lagged(n))).await;
                        deliver_current(&publisher_id, store.as_ref(), sink.as_ref()).await;
                    }
                    Err(RecvError::Closed) => {
                        debug!(publisher_id = %publisher_id, "change feed closed");
                        sink.deliver(ViewEvent::Error(SubscriptionError::Closed)).await;
                        return;
                    }
                }
            }
        });

        SubscriptionHandle { task }
    }

    /// Subscribe to the whole fleet.
    ///
    /// Each snapshot maps every publisher id the store has ever seen to
    /// its current view, so the key set only grows and stopped buses
    /// stay visible as `Inactive`.
    pub fn subscribe_all(&self, sink: Box<dyn FleetSink>) -> SubscriptionHandle {
        let store = self.store.clone();
        let mut changes = store.changes();

        let task = tokio::spawn(async move {
            info!("fleet subscription opened");
            deliver_fleet(store.as_ref(), sink.as_ref()).await;

            loop {
                match changes.recv().await {
                    Ok(event) => {
                        if event.kind != ChangeKind::State {
                            continue;
                        }
                        deliver_fleet(store.as_ref(), sink.as_ref()).await;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(dropped = n, "fleet change feed lagged");
                        sink.deliver(FleetEvent::Error(SubscriptionError::Lagged(n))).await;
                        deliver_fleet(store.as_ref(), sink.as_ref()).await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("fleet change feed closed");
                        sink.deliver(FleetEvent::Error(SubscriptionError::Closed)).await;
                        return;
                    }
                }
            }
        });

        SubscriptionHandle { task }
    }
}

/// Fetch one publisher's view and push it to the sink.
async fn deliver_current(publisher_id: &str, store: &dyn RendezvousStore, sink: &dyn ViewSink) {
    match store.get_state(publisher_id).await {
        Ok(record) => {
            sink.deliver(ViewEvent::Snapshot(PublisherView::from_record(record))).await;
        }
        Err(e) => {
            warn!(publisher_id = %publisher_id, error = %e, "snapshot read failed");
            sink.deliver(ViewEvent::Error(SubscriptionError::Read(e.to_string()))).await;
        }
    }
}

/// Build the full fleet view and push it to the sink.
async fn deliver_fleet(store: &dyn RendezvousStore, sink: &dyn FleetSink) {
    let ids = match store.list_publishers().await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "fleet listing failed");
            sink.deliver(FleetEvent::Error(SubscriptionError::Read(e.to_string()))).await;
            return;
        }
    };

    let mut fleet = FleetView::new();
    for id in ids {
        match store.get_state(&id).await {
            Ok(record) => {
                fleet.insert(id, PublisherView::from_record(record));
            }
            Err(e) => {
                warn!(publisher_id = %id, error = %e, "fleet snapshot read failed");
                sink.deliver(FleetEvent::Error(SubscriptionError::Read(e.to_string()))).await;
                return;
            }
        }
    }

    sink.deliver(FleetEvent::Snapshot(fleet)).await;
}
