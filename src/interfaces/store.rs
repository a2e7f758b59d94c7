//! Rendezvous store interface.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{PositionLogEntry, PublisherState};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Which part of a publisher's data changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The per-publisher state record was written.
    State,
    /// An entry was appended to the publisher's position log.
    Log,
}

/// Notification emitted on every store write.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub publisher_id: String,
    pub kind: ChangeKind,
}

/// Interface for the shared rendezvous point between publishers and
/// subscribers.
///
/// Key layout mirrors a document database: `publishers/{id}` holds the
/// [`PublisherState`] record, `publishers/{id}/logs/{autoId}` the
/// append-only position log. Writes are last-write-wins per key; change
/// notifications are push-based and carry no payload (readers re-fetch).
///
/// # Implementations
///
/// - `MemoryStore`: in-process store for standalone mode and tests.
///   Hosted document databases are external collaborators adapted
///   behind this trait, not reimplemented here.
#[async_trait]
pub trait RendezvousStore: Send + Sync {
    /// Overwrite the publisher's state record in full.
    async fn put_state(&self, publisher_id: &str, state: PublisherState) -> Result<()>;

    /// Merge `active: false` into the existing record, leaving every
    /// other field untouched.
    ///
    /// No-op when the record is absent: a stop before any successful
    /// tick must not create a partial record.
    async fn mark_inactive(&self, publisher_id: &str) -> Result<()>;

    /// Fetch the publisher's state record, if it exists.
    async fn get_state(&self, publisher_id: &str) -> Result<Option<PublisherState>>;

    /// Append an entry to the publisher's position log, returning the
    /// auto-assigned entry id.
    async fn append_log(&self, publisher_id: &str, entry: PositionLogEntry) -> Result<Uuid>;

    /// Fetch the publisher's full log in insertion order.
    async fn get_log(&self, publisher_id: &str) -> Result<Vec<PositionLogEntry>>;

    /// List every publisher id that has ever had a successful state
    /// write. Monotonically growing; ids are never removed.
    async fn list_publishers(&self) -> Result<Vec<String>>;

    /// Open a receiver on the store's change feed.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}
