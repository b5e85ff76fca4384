use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::{DocumentStore, NewDocument, SnapshotEvent, StoredDocument, Subscription};
use crate::error::StoreError;

#[derive(Clone)]
struct AuthSession {
    id_token: String,
    local_id: String,
}

/// Firestore REST transport. The REST surface has no push channel, so the
/// subscription is a polling watcher that emits a full snapshot whenever the
/// collection contents change.
pub struct FirestoreStore {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    api_key: String,
    project_id: String,
    poll_interval: Duration,
    auth: Mutex<Option<AuthSession>>,
}

impl FirestoreStore {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                client: reqwest::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()
                    .expect("Failed to build reqwest client"),
                api_key: api_key.into(),
                project_id: project_id.into(),
                poll_interval,
                auth: Mutex::new(None),
            }),
        }
    }
}

impl Inner {
    fn documents_url(&self) -> String {
        format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
            self.project_id
        )
    }

    fn auth_token(&self) -> Option<String> {
        self.auth
            .lock()
            .unwrap()
            .as_ref()
            .map(|auth| auth.id_token.clone())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let url = format!("{}/{collection}?pageSize=300", self.documents_url());
        let mut req = self.client.get(&url);
        if let Some(token) = self.auth_token() {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("list failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(StoreError::Transport(format!(
                "list failed with status {}",
                resp.status()
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Transport(format!("invalid list response: {e}")))?;

        let docs = body
            .get("documents")
            .and_then(Value::as_array)
            .map(|docs| docs.iter().filter_map(decode_document).collect())
            .unwrap_or_default();
        Ok(docs)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn resolve_identity(&self) -> Result<String, StoreError> {
        // Resume the in-memory session if one was already provisioned.
        if let Some(auth) = self.inner.auth.lock().unwrap().clone() {
            return Ok(auth.local_id);
        }

        let url = format!(
            "https://identitytoolkit.googleapis.com/v1/accounts:signUp?key={}",
            self.inner.api_key
        );
        let resp = self
            .inner
            .client
            .post(&url)
            .json(&json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| StoreError::Identity(format!("anonymous sign-in failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(StoreError::Identity(format!(
                "anonymous sign-in failed with status {}",
                resp.status()
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Identity(format!("invalid sign-in response: {e}")))?;

        let id_token = body
            .get("idToken")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Identity("sign-in response missing idToken".to_string()))?;
        let local_id = body
            .get("localId")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Identity("sign-in response missing localId".to_string()))?;

        *self.inner.auth.lock().unwrap() = Some(AuthSession {
            id_token: id_token.to_string(),
            local_id: local_id.to_string(),
        });
        tracing::info!("anonymous identity provisioned");
        Ok(local_id.to_string())
    }

    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = self.inner.clone();
        let collection = collection.to_string();

        tokio::spawn(async move {
            let mut last: Option<Vec<StoredDocument>> = None;
            loop {
                match inner.list_documents(&collection).await {
                    Ok(docs) => {
                        if last.as_ref() != Some(&docs) {
                            if tx.send(SnapshotEvent::Snapshot(docs.clone())).is_err() {
                                break;
                            }
                            last = Some(docs);
                        }
                    }
                    Err(err) => {
                        if tx.send(SnapshotEvent::Error(err)).is_err() {
                            break;
                        }
                    }
                }
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = tokio::time::sleep(inner.poll_interval) => {}
                }
            }
            tracing::debug!("firestore watcher for {collection} stopped");
        });

        Ok(Subscription::new(rx))
    }

    async fn create(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError> {
        let url = format!("{}/{collection}", self.inner.documents_url());
        let mut req = self
            .inner
            .client
            .post(&url)
            .json(&json!({ "fields": encode_fields(&doc.fields) }));
        if let Some(token) = self.inner.auth_token() {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("create failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(StoreError::Transport(format!(
                "create failed with status {}",
                resp.status()
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Transport(format!("invalid create response: {e}")))?;
        let name = body.get("name").and_then(Value::as_str).ok_or_else(|| {
            StoreError::Transport("create response missing document name".to_string())
        })?;
        Ok(document_id(name).to_string())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = format!("{}/{collection}/{id}", self.inner.documents_url());
        let mut req = self.inner.client.delete(&url);
        if let Some(token) = self.inner.auth_token() {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("delete failed: {e}")))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(StoreError::NotFound(format!("document {id} not found")))
        } else {
            Err(StoreError::Transport(format!(
                "delete failed with status {status}"
            )))
        }
    }
}

fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn decode_document(doc: &Value) -> Option<StoredDocument> {
    let name = doc.get("name").and_then(Value::as_str)?;
    let fields = doc
        .get("fields")
        .map(decode_fields)
        .unwrap_or_else(|| json!({}));
    let created_at = doc
        .get("createTime")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));
    Some(StoredDocument {
        id: document_id(name).to_string(),
        fields,
        created_at,
    })
}

/// Firestore's typed-value JSON to plain JSON.
fn decode_fields(fields: &Value) -> Value {
    let Some(map) = fields.as_object() else {
        return json!({});
    };
    let decoded: serde_json::Map<String, Value> = map
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect();
    Value::Object(decoded)
}

fn decode_value(value: &Value) -> Value {
    if let Some(s) = value.get("stringValue").and_then(Value::as_str) {
        return json!(s);
    }
    if let Some(s) = value.get("integerValue").and_then(Value::as_str) {
        // Firestore serializes 64-bit integers as strings.
        return s.parse::<i64>().map(|n| json!(n)).unwrap_or_else(|_| json!(s));
    }
    if let Some(n) = value.get("doubleValue").and_then(Value::as_f64) {
        return json!(n);
    }
    if let Some(b) = value.get("booleanValue").and_then(Value::as_bool) {
        return json!(b);
    }
    if let Some(s) = value.get("timestampValue").and_then(Value::as_str) {
        return json!(s);
    }
    if let Some(map) = value.get("mapValue").and_then(|m| m.get("fields")) {
        return decode_fields(map);
    }
    if let Some(items) = value
        .get("arrayValue")
        .and_then(|a| a.get("values"))
        .and_then(Value::as_array)
    {
        return Value::Array(items.iter().map(decode_value).collect());
    }
    Value::Null
}

/// Plain JSON to Firestore's typed-value JSON.
fn encode_fields(fields: &Value) -> Value {
    let Some(map) = fields.as_object() else {
        return json!({});
    };
    let encoded: serde_json::Map<String, Value> = map
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::String(s) => json!({ "stringValue": s }),
        Value::Number(n) if n.is_i64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n.as_f64() }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Null => json!({ "nullValue": null }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({
            "mapValue": { "fields": encode_fields(&Value::Object(map.clone())) }
        }),
    }
}
