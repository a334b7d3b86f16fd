//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use loyalty_core::{Decimal, LoyaltyError};
use loyalty_store::StoreError;
use serde::Serialize;

use crate::deletion::DeletionError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid access token.
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Well-formed request with an invalid order number or amount.
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// The order number belongs to another user.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The withdrawal exceeds the current balance.
    #[error("insufficient funds: current={current}, requested={requested}")]
    InsufficientFunds {
        /// Balance at the time of the check.
        current: Decimal,
        /// Amount requested.
        requested: Decimal,
    },

    /// Background capacity is exhausted; the client may retry.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unprocessable",
                msg.clone(),
                None,
            ),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientFunds { current, requested } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_funds",
                self.to_string(),
                Some(serde_json::json!({
                    "current": current.to_string(),
                    "requested": requested.to_string(),
                })),
            ),
            Self::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LoyaltyError> for ApiError {
    fn from(err: LoyaltyError) -> Self {
        match err {
            LoyaltyError::Format(msg) => Self::BadRequest(msg),
            LoyaltyError::Validation(msg) => Self::Unprocessable(msg),
            LoyaltyError::Conflict { order } => {
                Self::Conflict(format!("order {order} was uploaded by another user"))
            }
            LoyaltyError::InsufficientFunds { current, requested } => {
                Self::InsufficientFunds { current, requested }
            }
            LoyaltyError::UpstreamUnavailable(msg) | LoyaltyError::Storage(msg) => {
                Self::Internal(msg)
            }
        }
    }
}

impl From<DeletionError> for ApiError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::Busy => Self::ServiceUnavailable(err.to_string()),
            DeletionError::Closed => Self::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        LoyaltyError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let cases = [
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unprocessable("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                ApiError::InsufficientFunds {
                    current: Decimal::from(500),
                    requested: Decimal::from(600),
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                ApiError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn store_insufficient_funds_maps_to_402() {
        let err: ApiError = StoreError::InsufficientFunds {
            current: Decimal::from(500),
            requested: Decimal::from(600),
        }
        .into();
        assert!(matches!(err, ApiError::InsufficientFunds { .. }));
    }

    #[test]
    fn store_failures_are_internal() {
        let err: ApiError = StoreError::Database("connection reset".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn saturated_deletion_pool_is_503() {
        let err: ApiError = DeletionError::Busy.into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = DeletionError::Closed.into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
