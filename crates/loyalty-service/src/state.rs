//! Application state.

use std::sync::Arc;

use loyalty_store::LedgerStore;

use crate::accrual::{AccrualClient, AccrualError};
use crate::config::ServiceConfig;
use crate::deletion::DeletionPool;
use crate::reconcile::{ReconcileConfig, Reconciler};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger backend.
    pub store: Arc<dyn LedgerStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Background accrual reconciliation.
    pub reconciler: Arc<Reconciler>,

    /// Background link deletion.
    pub deletions: Arc<DeletionPool>,
}

impl AppState {
    /// Create the application state and start its background workers.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the accrual HTTP client cannot be built.
    pub fn new(store: Arc<dyn LedgerStore>, config: ServiceConfig) -> Result<Self, AccrualError> {
        let client = AccrualClient::new(&config.accrual_address, config.accrual_timeout())?;
        tracing::info!(
            accrual_url = %client.base_url(),
            timeout_ms = config.accrual_timeout_ms,
            "Accrual client configured"
        );

        let reconciler = Reconciler::new(
            Arc::clone(&store),
            client,
            ReconcileConfig::from(&config),
        );
        let deletions = DeletionPool::start(Arc::clone(&store), config.deletion_workers);

        Ok(Self {
            store,
            config,
            reconciler: Arc::new(reconciler),
            deletions: Arc::new(deletions),
        })
    }
}
