use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{DocumentStore, NewDocument, SnapshotEvent, StoredDocument, Subscription};
use crate::error::StoreError;

#[derive(Default)]
struct Flags {
    fail_next_create: Option<StoreError>,
    fail_next_delete: Option<StoreError>,
    fail_subscribe: Option<StoreError>,
    /// While set, created documents carry no resolved timestamp, simulating
    /// a server timestamp placeholder that has not committed yet.
    hold_timestamps: bool,
}

/// In-process document store with push notifications to every live
/// subscriber. Backs the test suite and the binary's offline mode.
pub struct MemoryStore {
    collections: DashMap<String, Vec<StoredDocument>>,
    watchers: Mutex<Vec<(String, mpsc::UnboundedSender<SnapshotEvent>)>>,
    identity: Mutex<Result<String, String>>,
    flags: Mutex<Flags>,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            watchers: Mutex::new(Vec::new()),
            identity: Mutex::new(Ok(format!("anon-{}", Uuid::now_v7()))),
            flags: Mutex::new(Flags::default()),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Insert a document directly, bypassing the create path. Notifies
    /// subscribers like any other mutation.
    pub fn seed(&self, collection: &str, doc: StoredDocument) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        self.notify(collection);
    }

    /// Resolve the timestamp of every pending document in the collection.
    pub fn resolve_pending(&self, collection: &str) {
        if let Some(mut docs) = self.collections.get_mut(collection) {
            for doc in docs.iter_mut() {
                if doc.created_at.is_none() {
                    doc.created_at = Some(Utc::now());
                }
            }
        }
        self.notify(collection);
    }

    /// Push a transport error to every subscriber of the collection without
    /// closing their channels.
    pub fn emit_error(&self, collection: &str, err: StoreError) {
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|(coll, tx)| {
            coll != collection || tx.send(SnapshotEvent::Error(err.clone())).is_ok()
        });
    }

    pub fn fail_identity(&self, msg: impl Into<String>) {
        *self.identity.lock().unwrap() = Err(msg.into());
    }

    pub fn fail_next_create(&self, err: StoreError) {
        self.flags.lock().unwrap().fail_next_create = Some(err);
    }

    pub fn fail_next_delete(&self, err: StoreError) {
        self.flags.lock().unwrap().fail_next_delete = Some(err);
    }

    pub fn fail_subscribe(&self, err: StoreError) {
        self.flags.lock().unwrap().fail_subscribe = Some(err);
    }

    pub fn hold_timestamps(&self, hold: bool) {
        self.flags.lock().unwrap().hold_timestamps = hold;
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on the collection.
    pub fn watcher_count(&self, collection: &str) -> usize {
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|(_, tx)| !tx.is_closed());
        watchers.iter().filter(|(coll, _)| coll == collection).count()
    }

    fn docs(&self, collection: &str) -> Vec<StoredDocument> {
        self.collections
            .get(collection)
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    fn notify(&self, collection: &str) {
        let docs = self.docs(collection);
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|(coll, tx)| {
            coll != collection || tx.send(SnapshotEvent::Snapshot(docs.clone())).is_ok()
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn resolve_identity(&self) -> Result<String, StoreError> {
        self.identity
            .lock()
            .unwrap()
            .clone()
            .map_err(StoreError::Identity)
    }

    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        if let Some(err) = self.flags.lock().unwrap().fail_subscribe.take() {
            return Err(err);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        // Initial state counts as the first snapshot.
        let _ = tx.send(SnapshotEvent::Snapshot(self.docs(collection)));
        self.watchers
            .lock()
            .unwrap()
            .push((collection.to_string(), tx));
        Ok(Subscription::new(rx))
    }

    async fn create(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.flags.lock().unwrap().fail_next_create.take() {
            return Err(err);
        }
        let id = Uuid::now_v7().to_string();
        let created_at = if self.flags.lock().unwrap().hold_timestamps {
            None
        } else {
            Some(Utc::now())
        };
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                fields: doc.fields,
                created_at,
            });
        self.notify(collection);
        Ok(id)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.flags.lock().unwrap().fail_next_delete.take() {
            return Err(err);
        }
        let removed = match self.collections.get_mut(collection) {
            Some(mut docs) => {
                let before = docs.len();
                docs.retain(|doc| doc.id != id);
                docs.len() < before
            }
            None => false,
        };
        if !removed {
            return Err(StoreError::NotFound(format!(
                "document {id} not found in {collection}"
            )));
        }
        self.notify(collection);
        Ok(())
    }
}
