use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{StoreError, SubmitError};
use crate::filter;
use crate::models::{Submission, SubmissionInput};
use crate::store::{DocumentStore, NewDocument};
use crate::sync::{self, ListView};

/// Write-path feedback clears itself after this long.
pub const NOTICE_CLEAR_AFTER: Duration = Duration::from_secs(3);

/// Transient write-path feedback for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Success(String),
    Failure(String),
}

/// Confirmation capability for destructive actions, injected so the delete
/// contract is testable without a rendering surface.
pub trait Confirm: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Confirms everything. For headless callers that gate deletion themselves.
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// One client session: anonymous identity, a single live subscription to the
/// submissions collection, and the write path. Created once at startup and
/// torn down once at shutdown.
pub struct Session {
    store: Arc<dyn DocumentStore>,
    collection: String,
    identity: Option<String>,
    view_rx: watch::Receiver<ListView>,
    query_tx: watch::Sender<String>,
    notice_tx: watch::Sender<Option<Notice>>,
    notice_seq: Arc<AtomicU64>,
    sync_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Resolve identity, then open the live subscription. Identity failure
    /// disables the write path but the list still loads; a subscription
    /// failure surfaces as the view's error state.
    pub async fn start(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Session {
        let collection = collection.into();

        let identity = match store.resolve_identity().await {
            Ok(token) => Some(token),
            Err(err) => {
                tracing::warn!("identity provisioning failed, writes disabled: {err}");
                None
            }
        };

        let (view_tx, view_rx) = watch::channel(ListView::loading());
        let sync_task = match store.subscribe(&collection).await {
            Ok(subscription) => Some(tokio::spawn(sync::run(subscription, view_tx))),
            Err(err) => {
                tracing::error!("failed to subscribe to {collection}: {err}");
                let _ = view_tx.send(ListView {
                    loading: false,
                    records: Arc::new(Vec::new()),
                    error: Some(err.to_string()),
                });
                None
            }
        };

        let (query_tx, _) = watch::channel(String::new());
        let (notice_tx, _) = watch::channel(None);

        Session {
            store,
            collection,
            identity,
            view_rx,
            query_tx,
            notice_tx,
            notice_seq: Arc::new(AtomicU64::new(0)),
            sync_task,
        }
    }

    /// Validate and send one submission. The list itself only updates
    /// through the next snapshot, not through this return value.
    pub async fn submit(&self, input: &SubmissionInput) -> Result<(), SubmitError> {
        let expected = match validate(input) {
            Ok(n) => n,
            Err(err) => {
                if let SubmitError::Validation(msg) = &err {
                    self.publish_notice(Notice::Failure(msg.clone()));
                }
                return Err(err);
            }
        };

        let Some(identity) = &self.identity else {
            self.publish_notice(Notice::Failure(
                "Session is not ready. Please try again later.".to_string(),
            ));
            return Err(SubmitError::IdentityNotReady);
        };

        let doc = NewDocument {
            fields: json!({
                "company_uuid": input.company_uuid,
                "sales_manager": input.sales_manager,
                "expected_originations": expected,
                "submittedBy": identity,
            }),
        };

        match self.store.create(&self.collection, doc).await {
            Ok(id) => {
                tracing::info!("submission {id} accepted");
                self.publish_notice(Notice::Success("Data submitted successfully!".to_string()));
                Ok(())
            }
            Err(err) => {
                tracing::error!("failed to submit: {err}");
                self.publish_notice(Notice::Failure(
                    "An error occurred. Please try again.".to_string(),
                ));
                Err(SubmitError::Store(err))
            }
        }
    }

    /// Delete by id. Backend failures are surfaced, never swallowed; the
    /// working set is untouched until the next snapshot confirms the
    /// removal.
    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        match self.store.delete(&self.collection, id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!("failed to delete submission {id}: {err}");
                self.publish_notice(Notice::Failure(
                    "There was an error deleting the entry. Please try again.".to_string(),
                ));
                Err(err)
            }
        }
    }

    /// Delete by id after asking the injected confirmation capability.
    /// Returns Ok(false) without touching the backend when declined.
    pub async fn remove_confirmed(
        &self,
        id: &str,
        confirm: &dyn Confirm,
    ) -> Result<bool, StoreError> {
        let company = self
            .view_rx
            .borrow()
            .records
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.company_uuid.clone())
            .unwrap_or_else(|| id.to_string());
        let message = format!(
            "Are you sure you want to delete the entry for company {company}? This action cannot be undone."
        );
        if !confirm.confirm(&message) {
            return Ok(false);
        }
        self.remove(id).await.map(|_| true)
    }

    /// The reactive list view. Consumers observe full-snapshot replacements.
    pub fn view(&self) -> watch::Receiver<ListView> {
        self.view_rx.clone()
    }

    pub fn notices(&self) -> watch::Receiver<Option<Notice>> {
        self.notice_tx.subscribe()
    }

    pub fn set_query(&self, query: impl Into<String>) {
        // send_replace stores the value even while nobody is subscribed.
        let _ = self.query_tx.send_replace(query.into());
    }

    pub fn query(&self) -> String {
        self.query_tx.borrow().clone()
    }

    /// Current records with the search query applied. Recomputed on every
    /// call from the latest snapshot.
    pub fn visible_records(&self) -> Vec<Submission> {
        let view = self.view_rx.borrow().clone();
        let query = self.query_tx.borrow().clone();
        filter::filter_submissions(&view.records, &query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Tear the session down, releasing the subscription.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.sync_task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    fn publish_notice(&self, notice: Notice) {
        let seq = self.notice_seq.fetch_add(1, Ordering::SeqCst) + 1;
        // send_replace keeps the notice stored for subscribers that attach
        // after publication.
        let _ = self.notice_tx.send_replace(Some(notice));

        // Auto-clear unless a newer notice superseded this one.
        let notice_tx = self.notice_tx.clone();
        let notice_seq = self.notice_seq.clone();
        tokio::spawn(async move {
            tokio::time::sleep(NOTICE_CLEAR_AFTER).await;
            if notice_seq.load(Ordering::SeqCst) == seq {
                let _ = notice_tx.send_replace(None);
            }
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.sync_task.take() {
            task.abort();
        }
    }
}

fn validate(input: &SubmissionInput) -> Result<f64, SubmitError> {
    if input.company_uuid.is_empty()
        || input.sales_manager.is_empty()
        || input.expected_originations.is_empty()
    {
        return Err(SubmitError::Validation(
            "Please fill out all fields.".to_string(),
        ));
    }
    match input.expected_originations.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(SubmitError::Validation(
            "Expected originations must be a number.".to_string(),
        )),
    }
}
