//! Service configuration.

use std::time::Duration;

/// Secret used when `SECRET_KEY` is not set. Only suitable for local runs.
const DEV_SECRET_KEY: &str = "loyalty-dev-secret";

/// Where the ledger lives, chosen from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL at the given DSN.
    Postgres(String),
    /// CBOR snapshot at the given path.
    File(String),
    /// Process memory; nothing survives a restart.
    Memory,
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub run_address: String,

    /// Base URL of the accrual service (default: `http://localhost:8088`).
    pub accrual_address: String,

    /// PostgreSQL DSN. Takes precedence over the file store.
    pub database_uri: Option<String>,

    /// Snapshot path for the file-backed store.
    pub file_storage_path: Option<String>,

    /// Secret for signing and verifying access tokens.
    pub secret_key: String,

    /// Name of the cookie carrying the access token (default: "`access_token`").
    pub access_token_name: String,

    /// Per-request timeout for accrual calls in milliseconds.
    pub accrual_timeout_ms: u64,

    /// Delay between polls of a pending order in milliseconds.
    pub accrual_poll_interval_ms: u64,

    /// Consecutive accrual failures tolerated before a poll loop gives up.
    pub accrual_max_retries: u32,

    /// Number of soft-delete workers.
    pub deletion_workers: usize,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secret_key = std::env::var("SECRET_KEY").unwrap_or_else(|_| {
            tracing::warn!("SECRET_KEY not set - using the development secret");
            defaults.secret_key.clone()
        });

        Self {
            run_address: std::env::var("RUN_ADDRESS").unwrap_or(defaults.run_address),
            accrual_address: std::env::var("ACCRUAL_SYSTEM_ADDRESS")
                .unwrap_or(defaults.accrual_address),
            database_uri: non_empty_var("DATABASE_URI"),
            file_storage_path: non_empty_var("FILE_STORAGE_PATH"),
            secret_key,
            access_token_name: std::env::var("ACCESS_TOKEN_NAME")
                .unwrap_or(defaults.access_token_name),
            accrual_timeout_ms: parsed_var("ACCRUAL_TIMEOUT_MS")
                .unwrap_or(defaults.accrual_timeout_ms),
            accrual_poll_interval_ms: parsed_var("ACCRUAL_POLL_INTERVAL_MS")
                .unwrap_or(defaults.accrual_poll_interval_ms)
                .max(1),
            accrual_max_retries: parsed_var("ACCRUAL_MAX_RETRIES")
                .unwrap_or(defaults.accrual_max_retries),
            deletion_workers: parsed_var("DELETION_WORKERS")
                .unwrap_or(defaults.deletion_workers)
                .max(1),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: parsed_var("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: parsed_var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }

    /// Pick the ledger backend: a DSN wins over a file path, memory is the fallback.
    #[must_use]
    pub fn storage_backend(&self) -> StorageBackend {
        match (&self.database_uri, &self.file_storage_path) {
            (Some(dsn), _) => StorageBackend::Postgres(dsn.clone()),
            (None, Some(path)) => StorageBackend::File(path.clone()),
            (None, None) => StorageBackend::Memory,
        }
    }

    /// Accrual request timeout.
    #[must_use]
    pub fn accrual_timeout(&self) -> Duration {
        Duration::from_millis(self.accrual_timeout_ms)
    }

    /// Delay between polls of a pending order.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.accrual_poll_interval_ms.max(1))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            run_address: "0.0.0.0:8080".into(),
            accrual_address: "http://localhost:8088".into(),
            database_uri: None,
            file_storage_path: None,
            secret_key: DEV_SECRET_KEY.into(),
            access_token_name: "access_token".into(),
            accrual_timeout_ms: 5000,
            accrual_poll_interval_ms: 1000,
            accrual_max_retries: 3,
            deletion_workers: 10,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
