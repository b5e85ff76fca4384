use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;

use crate::models::Submission;
use crate::store::{SnapshotEvent, StoredDocument, Subscription};

/// The reactive view published to the presentation layer. Replaced
/// wholesale on every delivery, never patched.
#[derive(Debug, Clone, Default)]
pub struct ListView {
    pub loading: bool,
    pub records: Arc<Vec<Submission>>,
    pub error: Option<String>,
}

impl ListView {
    /// Initial state before the first snapshot arrives.
    pub fn loading() -> Self {
        Self {
            loading: true,
            records: Arc::new(Vec::new()),
            error: None,
        }
    }
}

/// Drive one subscription until its channel closes, publishing a sorted
/// full snapshot on every delivery. A transport error surfaces as the view's
/// error state and does not stop consumption; the list recovers on the next
/// good snapshot.
pub async fn run(mut subscription: Subscription, view: watch::Sender<ListView>) {
    while let Some(event) = subscription.next_event().await {
        match event {
            SnapshotEvent::Snapshot(docs) => {
                let mut records: Vec<Submission> = docs.iter().map(normalize).collect();
                sort_submissions(&mut records);
                tracing::debug!("snapshot applied ({} records)", records.len());
                let _ = view.send(ListView {
                    loading: false,
                    records: Arc::new(records),
                    error: None,
                });
            }
            SnapshotEvent::Error(err) => {
                tracing::error!("submissions subscription error: {err}");
                let records = view.borrow().records.clone();
                let _ = view.send(ListView {
                    loading: false,
                    records,
                    error: Some(err.to_string()),
                });
            }
        }
    }
    tracing::debug!("submissions subscription closed");
}

/// Materialize a raw document into a Submission, normalizing the timestamp
/// and coercing the numeric field.
pub fn normalize(doc: &StoredDocument) -> Submission {
    let submitted_at = doc.created_at;
    let submitted_at_display = match submitted_at {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "N/A".to_string(),
    };

    Submission {
        id: doc.id.clone(),
        company_uuid: field_str(&doc.fields, "company_uuid"),
        sales_manager: field_str(&doc.fields, "sales_manager"),
        expected_originations: field_number(&doc.fields, "expected_originations"),
        submitted_at,
        submitted_at_display,
        submitted_by: doc
            .fields
            .get("submittedBy")
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
    }
}

/// Newest first; records with an unresolved timestamp sort strictly last,
/// and ties break by id so re-renders stay stable.
pub fn sort_submissions(records: &mut [Submission]) {
    let key = |s: &Submission| s.submitted_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
    records.sort_by(|a, b| key(b).cmp(&key(a)).then_with(|| a.id.cmp(&b.id)));
}

fn field_str(fields: &Value, name: &str) -> String {
    fields
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn field_number(fields: &Value, name: &str) -> f64 {
    let value = fields.get(name);
    value
        .and_then(Value::as_f64)
        .or_else(|| value.and_then(Value::as_str).and_then(|s| s.parse().ok()))
        .unwrap_or(0.0)
}
