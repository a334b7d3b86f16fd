//! Loyalty Service - HTTP API for the loyalty points ledger
//!
//! This is the main entry point for the loyalty service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loyalty_service::{create_router, AppState, ServiceConfig, StorageBackend};
use loyalty_store::{FileStore, LedgerStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,loyalty=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Loyalty Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        run_address = %config.run_address,
        accrual_address = %config.accrual_address,
        deletion_workers = config.deletion_workers,
        poll_interval_ms = config.accrual_poll_interval_ms,
        max_retries = config.accrual_max_retries,
        "Service configuration loaded"
    );

    let (store, file_store) = open_store(&config).await?;

    let state = AppState::new(store, config.clone())?;
    let reconciler = Arc::clone(&state.reconciler);
    let deletions = Arc::clone(&state.deletions);

    let resumed = reconciler.bootstrap().await?;
    tracing::info!(orders = resumed, "Resumed reconciliation of pending orders");

    let app = create_router(state);

    tracing::info!(run_address = %config.run_address, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.run_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining link deletions");
    deletions.shutdown().await;

    if let Some(file_store) = file_store {
        file_store.flush().await?;
        tracing::info!(path = %file_store.path().display(), "Snapshot written");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Open the configured backend. The file store is also returned on its own
/// so it can be flushed at shutdown.
async fn open_store(
    config: &ServiceConfig,
) -> Result<(Arc<dyn LedgerStore>, Option<Arc<FileStore>>), Box<dyn std::error::Error>> {
    match config.storage_backend() {
        StorageBackend::Postgres(dsn) => {
            tracing::info!("Connecting to Postgres");
            let store = PgStore::connect(&dsn).await?;
            store.migrate().await?;
            Ok((Arc::new(store), None))
        }
        StorageBackend::File(path) => {
            tracing::info!(path = %path, "Opening file store");
            let store = Arc::new(FileStore::open(&path)?);
            Ok((Arc::clone(&store) as Arc<dyn LedgerStore>, Some(store)))
        }
        StorageBackend::Memory => {
            tracing::warn!(
                "No DATABASE_URI or FILE_STORAGE_PATH set - data will not survive a restart"
            );
            Ok((Arc::new(MemoryStore::new()), None))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Ctrl-C received"),
        () = terminate => tracing::info!("SIGTERM received"),
    }
}
