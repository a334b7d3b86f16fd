//! Balance and withdrawal types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderNumber, UserId};

/// A user's balance, derived from the ledger.
///
/// `current` is the sum of processed accruals minus `withdrawn`; `withdrawn`
/// is the sum of every withdrawal the user has made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    /// Points available for withdrawal.
    pub current: Decimal,

    /// Points withdrawn over the user's lifetime.
    pub withdrawn: Decimal,
}

impl Balance {
    /// Build a balance from the two ledger totals.
    #[must_use]
    pub fn from_totals(accrued: Decimal, withdrawn: Decimal) -> Self {
        Self {
            current: accrued - withdrawn,
            withdrawn,
        }
    }

    /// Whether `sum` can be debited without the balance going negative.
    #[must_use]
    pub fn covers(&self, sum: Decimal) -> bool {
        sum <= self.current
    }

    /// The balance after debiting `sum`.
    #[must_use]
    pub fn debit(self, sum: Decimal) -> Self {
        Self {
            current: self.current - sum,
            withdrawn: self.withdrawn + sum,
        }
    }
}

/// A debit against a user's balance. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Reference order number; need not be an order known to the ledger.
    pub order: OrderNumber,

    /// The user whose balance is debited.
    pub user_id: UserId,

    /// Positive amount debited.
    pub sum: Decimal,

    /// When the debit was recorded.
    pub processed_at: DateTime<Utc>,
}

impl Withdrawal {
    /// Create a withdrawal stamped with the current time.
    #[must_use]
    pub fn new(order: OrderNumber, user_id: UserId, sum: Decimal) -> Self {
        Self {
            order,
            user_id,
            sum,
            processed_at: Utc::now(),
        }
    }
}
