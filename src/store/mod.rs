pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::StoreError;

/// A document as delivered by the backend, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: serde_json::Value,
    /// Resolved server creation time; None while the server timestamp
    /// placeholder has not been committed yet.
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for a create. The backend assigns the id and the creation time.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub fields: serde_json::Value,
}

/// One delivery on a standing subscription. Every snapshot carries the full
/// current state of the collection, not a diff.
#[derive(Debug, Clone)]
pub enum SnapshotEvent {
    Snapshot(Vec<StoredDocument>),
    Error(StoreError),
}

/// Standing subscription to one collection. Dropping the handle releases the
/// subscription; the producer side stops once the receiver is gone.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SnapshotEvent>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<SnapshotEvent>) -> Self {
        Self { rx }
    }

    /// Next delivery, or None once the channel is closed.
    pub async fn next_event(&mut self) -> Option<SnapshotEvent> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resume or provision an anonymous identity. Returns the stable token
    /// attached to every write from this session.
    async fn resolve_identity(&self) -> Result<String, StoreError>;

    /// Open a standing subscription. The initial state of the collection is
    /// delivered as the first snapshot.
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;

    /// Create a document, returning its backend-assigned id.
    async fn create(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError>;

    /// Delete a document by id.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}
