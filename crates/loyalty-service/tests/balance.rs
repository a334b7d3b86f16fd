//! Balance and withdrawal integration tests.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use common::{TestHarness, ORDER_A, ORDER_C};
use loyalty_core::Decimal;
use serde_json::json;

/// Submit `ORDER_A` and wait until the accrual service credits `points`.
async fn earn(harness: &TestHarness, points: u32) {
    harness.accrual_processed(ORDER_A, points).await;
    harness
        .server
        .post("/api/user/orders")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .text(ORDER_A)
        .await
        .assert_status(StatusCode::ACCEPTED);
    harness
        .wait_for_balance(&harness.test_user_id, Decimal::from(points))
        .await;
}

async fn balance(harness: &TestHarness) -> serde_json::Value {
    let response = harness
        .server
        .get("/api/user/balance")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn new_user_has_zero_balance() {
    let harness = TestHarness::new().await;

    let body = balance(&harness).await;
    assert_eq!(body["current"], 0.0);
    assert_eq!(body["withdrawn"], 0.0);
}

#[tokio::test]
async fn overdraw_is_refused_and_balance_kept() {
    let harness = TestHarness::new().await;
    earn(&harness, 500).await;

    let response = harness
        .server
        .post("/api/user/balance/withdraw")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .json(&json!({ "order": ORDER_C, "sum": 600 }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_funds");

    let body = balance(&harness).await;
    assert_eq!(body["current"], 500.0);
    assert_eq!(body["withdrawn"], 0.0);
}

#[tokio::test]
async fn withdrawal_debits_and_is_listed() {
    let harness = TestHarness::new().await;
    earn(&harness, 500).await;

    harness
        .server
        .get("/api/user/withdrawals")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = harness
        .server
        .post("/api/user/balance/withdraw")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .json(&json!({ "order": ORDER_C, "sum": 200 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["current"], 300.0);

    let body = balance(&harness).await;
    assert_eq!(body["current"], 300.0);
    assert_eq!(body["withdrawn"], 200.0);

    let response = harness
        .server
        .get("/api/user/withdrawals")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let list: Vec<serde_json::Value> = response.json();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["order"], ORDER_C);
    assert_eq!(list[0]["sum"], 200.0);
    assert!(list[0]["processed_at"].is_string());
}

#[tokio::test]
async fn withdrawal_with_bad_order_is_unprocessable() {
    let harness = TestHarness::new().await;
    earn(&harness, 500).await;

    harness
        .server
        .post("/api/user/balance/withdraw")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .json(&json!({ "order": "2377225625", "sum": 10 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    harness
        .server
        .post("/api/user/balance/withdraw")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .json(&json!({ "order": ORDER_C, "sum": 0 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let body = balance(&harness).await;
    assert_eq!(body["current"], 500.0);
}

#[tokio::test]
async fn balance_requires_token() {
    let harness = TestHarness::new().await;

    harness
        .server
        .get("/api/user/balance")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    harness
        .server
        .get("/api/user/withdrawals")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
