//! Balance and withdrawal handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use loyalty_core::{Balance, Decimal, Withdrawal};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::ledger;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Points available to spend.
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    /// Points withdrawn over the account's lifetime.
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            current: balance.current,
            withdrawn: balance.withdrawn,
        }
    }
}

/// Withdrawal request.
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// Order number the points are spent on.
    pub order: String,
    /// Points to debit.
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
}

/// One entry of the withdrawal history.
#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    /// Order number the points were spent on.
    pub order: String,
    /// Points debited.
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    /// Timestamp (RFC 3339).
    pub processed_at: String,
}

impl From<&Withdrawal> for WithdrawalResponse {
    fn from(w: &Withdrawal) -> Self {
        Self {
            order: w.order.to_string(),
            sum: w.sum,
            processed_at: w.processed_at.to_rfc3339(),
        }
    }
}

/// Get the caller's balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.store.balance(&auth.user_id).await?;
    Ok(Json(balance.into()))
}

/// Spend points. Responds with the balance after the debit.
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<WithdrawRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance =
        ledger::withdraw(state.store.as_ref(), auth.user_id, &body.order, body.sum).await?;
    Ok(Json(balance.into()))
}

/// List the caller's withdrawals, oldest first. 204 when there are none.
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let withdrawals = state.store.list_withdrawals(&auth.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalResponse> = withdrawals.iter().map(WithdrawalResponse::from).collect();
    Ok(Json(body).into_response())
}
