//! Order types.
//!
//! An order is created by a user submission and then driven to a terminal
//! state by reconciliation against the accrual service. Once terminal it is
//! never mutated again.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderNumber, UserId};

/// Processing state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Stored locally, the accrual service has no information yet.
    New,
    /// Registered by the accrual service, calculation not started.
    Registered,
    /// The accrual service is calculating.
    Processing,
    /// Rejected by the accrual service; no accrual is granted.
    Invalid,
    /// Calculation finished; the accrual is final.
    Processed,
}

impl OrderStatus {
    /// Whether no further transitions can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// Wire/database spelling of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Registered => "REGISTERED",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "REGISTERED" => Ok(Self::Registered),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// A purchase submitted for loyalty accrual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Globally unique, checksum-valid order number.
    pub number: OrderNumber,

    /// Owner of the order for its whole lifetime.
    pub user_id: UserId,

    /// Current processing state.
    pub status: OrderStatus,

    /// Points granted; only meaningful once `status` is `Processed`.
    pub accrual: Decimal,

    /// When the order was first submitted.
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    /// Create a freshly submitted order with status `New`.
    #[must_use]
    pub fn new(number: OrderNumber, user_id: UserId) -> Self {
        Self {
            number,
            user_id,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            uploaded_at: Utc::now(),
        }
    }

    /// Whether reconciliation has finished for this order.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The amount this order contributes to the owner's balance.
    ///
    /// Orders that are not `Processed` contribute nothing.
    #[must_use]
    pub fn credited(&self) -> Decimal {
        if self.status == OrderStatus::Processed {
            self.accrual
        } else {
            Decimal::ZERO
        }
    }
}

/// One observation of an order's state as reported by the accrual service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualSnapshot {
    /// The order the snapshot describes.
    pub order: OrderNumber,

    /// Upstream processing state.
    pub status: OrderStatus,

    /// Points calculated so far (zero until processed).
    #[serde(default, with = "rust_decimal::serde::float")]
    pub accrual: Decimal,
}

impl AccrualSnapshot {
    /// Snapshot for an order the accrual service does not know about yet.
    #[must_use]
    pub fn unknown(order: OrderNumber) -> Self {
        Self {
            order,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
        }
    }
}
