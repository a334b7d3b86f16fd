//! Error types for ledger storage.

use loyalty_core::{Decimal, LoyaltyError, UserId};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Snapshot file could not be read or written.
    #[error("io error: {0}")]
    Io(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// The order number is already stored.
    #[error("order already exists (owner {owner})")]
    AlreadyExists {
        /// The user that owns the stored order.
        owner: UserId,
    },

    /// The withdrawal exceeds the balance at commit time.
    #[error("insufficient funds: current={current}, requested={requested}")]
    InsufficientFunds {
        /// Balance inside the atomic unit.
        current: Decimal,
        /// Amount requested.
        requested: Decimal,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<StoreError> for LoyaltyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientFunds { current, requested } => {
                Self::InsufficientFunds { current, requested }
            }
            other => Self::Storage(other.to_string()),
        }
    }
}
