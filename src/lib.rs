pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod session;
pub mod store;
pub mod sync;

use std::sync::Arc;

use crate::session::Session;
use crate::store::DocumentStore;

/// Build one client session against the given store: resolve the anonymous
/// identity, open the live subscription, and hand back the handle the
/// presentation layer drives.
pub async fn build_session(
    store: Arc<dyn DocumentStore>,
    collection: impl Into<String>,
) -> Session {
    Session::start(store, collection).await
}
