//! Error types for the loyalty ledger.

use rust_decimal::Decimal;

use crate::ids::IdError;

/// Result type for loyalty operations.
pub type Result<T> = std::result::Result<T, LoyaltyError>;

/// Errors that can occur in loyalty operations.
///
/// Validation and conflict errors go straight back to the synchronous caller.
/// Upstream errors only ever occur inside background reconciliation and are
/// logged there.
#[derive(Debug, thiserror::Error)]
pub enum LoyaltyError {
    /// The order number is not a digit string.
    #[error("invalid order number format: {0}")]
    Format(String),

    /// The order number or amount failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The order number is already owned by another user.
    #[error("order {order} belongs to another user")]
    Conflict {
        /// The contested order number.
        order: String,
    },

    /// The withdrawal exceeds the current balance.
    #[error("insufficient funds: current={current}, requested={requested}")]
    InsufficientFunds {
        /// Balance available at the time of the check.
        current: Decimal,
        /// Amount requested.
        requested: Decimal,
    },

    /// The accrual service is unreachable or returned something unusable.
    #[error("accrual service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The ledger store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<IdError> for LoyaltyError {
    fn from(err: IdError) -> Self {
        match err {
            IdError::NotNumeric | IdError::InvalidUuid => Self::Format(err.to_string()),
            IdError::BadChecksum => Self::Validation(err.to_string()),
        }
    }
}
