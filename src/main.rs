use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use intake::config::Config;
use intake::store::firestore::FirestoreStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting intake");

    let store = Arc::new(FirestoreStore::new(
        config.firebase_api_key.clone(),
        config.firebase_project_id.clone(),
        Duration::from_secs(config.poll_interval_secs),
    ));

    let session = intake::build_session(store, config.collection.clone()).await;
    match session.identity() {
        Some(token) => tracing::info!("session identity: {token}"),
        None => tracing::warn!("no session identity; running read-only"),
    }

    let mut view = session.view();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // Tail the live list until shutdown.
    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow().clone();
                if let Some(err) = &snapshot.error {
                    tracing::warn!("submissions unavailable: {err}");
                    continue;
                }
                tracing::info!("{} submissions", snapshot.records.len());
                for record in snapshot.records.iter() {
                    tracing::debug!(
                        "{} | {} | {} | {}",
                        record.company_uuid,
                        record.sales_manager,
                        record.expected_originations,
                        record.submitted_at_display,
                    );
                }
            }
            _ = &mut shutdown => break,
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping session");
}
