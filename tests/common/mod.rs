use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use intake::models::SubmissionInput;
use intake::session::Session;
use intake::store::StoredDocument;
use intake::store::memory::MemoryStore;
use intake::sync::ListView;

pub const COLLECTION: &str = "tableau-submissions";

/// A session wired to a fresh in-memory store.
pub struct TestSession {
    pub store: Arc<MemoryStore>,
    pub session: Session,
}

pub async fn spawn_session() -> TestSession {
    spawn_session_with(Arc::new(MemoryStore::new())).await
}

/// Spawn against a store that was prepared beforehand (seeded documents,
/// injected failures).
pub async fn spawn_session_with(store: Arc<MemoryStore>) -> TestSession {
    let session = intake::build_session(store.clone(), COLLECTION).await;
    TestSession { store, session }
}

pub fn input(company: &str, manager: &str, expected: &str) -> SubmissionInput {
    SubmissionInput::new(company, manager, expected)
}

pub fn doc(
    id: &str,
    company: &str,
    manager: &str,
    expected: f64,
    submitted_at: Option<DateTime<Utc>>,
) -> StoredDocument {
    StoredDocument {
        id: id.to_string(),
        fields: json!({
            "company_uuid": company,
            "sales_manager": manager,
            "expected_originations": expected,
            "submittedBy": "seeded",
        }),
        created_at: submitted_at,
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Wait until the published view satisfies the predicate, or panic.
pub async fn wait_for_view(session: &Session, pred: impl Fn(&ListView) -> bool) -> ListView {
    let mut rx = session.view();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        {
            let view = rx.borrow_and_update();
            if pred(&view) {
                return view.clone();
            }
        }
        match tokio::time::timeout_at(deadline, rx.changed()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => {
                let last = rx.borrow().clone();
                panic!("view never reached the expected state: {last:?}")
            }
        }
    }
}

/// Ids of the view's records, in display order.
pub fn ids(view: &ListView) -> Vec<String> {
    view.records.iter().map(|s| s.id.clone()).collect()
}
