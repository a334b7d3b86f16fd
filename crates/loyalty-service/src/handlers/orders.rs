//! Order submission and listing handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use loyalty_core::{Decimal, Order, OrderStatus};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::ledger::{self, Submission};
use crate::state::AppState;

/// One entry of the order list.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// Order number.
    pub number: String,
    /// Accrual status.
    pub status: OrderStatus,
    /// Points credited; only present once processed.
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub accrual: Option<Decimal>,
    /// Upload timestamp (RFC 3339).
    pub uploaded_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.to_string(),
            status: order.status,
            accrual: (order.status == OrderStatus::Processed).then_some(order.accrual),
            uploaded_at: order.uploaded_at.to_rfc3339(),
        }
    }
}

/// Submit an order number (plain-text body).
///
/// 202 for a new order, 200 if the caller already submitted it.
pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: String,
) -> Result<StatusCode, ApiError> {
    let submission =
        ledger::submit_order(state.store.as_ref(), &state.reconciler, auth.user_id, &body).await?;

    Ok(match submission {
        Submission::Accepted(_) => StatusCode::ACCEPTED,
        Submission::AlreadyOwned(_) => StatusCode::OK,
    })
}

/// List the caller's orders, oldest first. 204 when there are none.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let orders = state.store.list_orders(&auth.user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderResponse> = orders.iter().map(OrderResponse::from).collect();
    Ok(Json(body).into_response())
}
