//! Accrual service wire types.

use loyalty_core::{AccrualSnapshot, Decimal, OrderNumber, OrderStatus};
use serde::{Deserialize, Serialize};

/// Body of `GET /api/orders/{number}` when the service knows the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAccrualResponse {
    /// Order number as echoed by the service.
    pub order: String,

    /// Calculation state.
    pub status: OrderStatus,

    /// Points granted; only present once processed.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub accrual: Option<Decimal>,
}

impl OrderAccrualResponse {
    /// Convert into a snapshot for the order that was asked about.
    ///
    /// Returns `None` if the reported accrual is negative.
    #[must_use]
    pub fn into_snapshot(self, order: OrderNumber) -> Option<AccrualSnapshot> {
        let accrual = self.accrual.unwrap_or(Decimal::ZERO);
        if accrual < Decimal::ZERO {
            return None;
        }
        Some(AccrualSnapshot {
            order,
            status: self.status,
            accrual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number() -> OrderNumber {
        "12345678903".parse().unwrap()
    }

    #[test]
    fn parses_processed_body() {
        let body: OrderAccrualResponse = serde_json::from_str(
            r#"{"order":"12345678903","status":"PROCESSED","accrual":500}"#,
        )
        .unwrap();
        let snapshot = body.into_snapshot(number()).unwrap();
        assert_eq!(snapshot.status, OrderStatus::Processed);
        assert_eq!(snapshot.accrual, Decimal::from(500));
    }

    #[test]
    fn missing_accrual_is_zero() {
        let body: OrderAccrualResponse =
            serde_json::from_str(r#"{"order":"12345678903","status":"PROCESSING"}"#).unwrap();
        let snapshot = body.into_snapshot(number()).unwrap();
        assert_eq!(snapshot.accrual, Decimal::ZERO);
    }

    #[test]
    fn negative_accrual_is_rejected() {
        let body: OrderAccrualResponse = serde_json::from_str(
            r#"{"order":"12345678903","status":"PROCESSED","accrual":-1}"#,
        )
        .unwrap();
        assert!(body.into_snapshot(number()).is_none());
    }

    #[test]
    fn unknown_status_fails_to_parse() {
        let parsed: Result<OrderAccrualResponse, _> =
            serde_json::from_str(r#"{"order":"12345678903","status":"DONE"}"#);
        assert!(parsed.is_err());
    }
}
