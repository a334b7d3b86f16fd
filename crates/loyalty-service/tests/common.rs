//! Common test utilities for loyalty-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loyalty_core::{Decimal, UserId};
use loyalty_service::auth::sign_token;
use loyalty_service::{create_router, AppState, ServiceConfig};
use loyalty_store::{LedgerStore, MemoryStore};

/// Valid order numbers (Luhn) used across tests.
pub const ORDER_A: &str = "12345678903";
pub const ORDER_B: &str = "4561261212345467";
pub const ORDER_C: &str = "2377225624";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Ledger behind the server.
    pub store: Arc<MemoryStore>,
    /// Stand-in for the accrual service.
    pub accrual: MockServer,
    /// Shared state, for draining background work.
    pub state: AppState,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// Token signing secret.
    pub secret: String,
}

impl TestHarness {
    /// Create a harness with an empty ledger. The accrual stub answers 204
    /// for any order without a more specific mock.
    pub async fn new() -> Self {
        let accrual = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/orders/\d+$"))
            .respond_with(ResponseTemplate::new(204))
            .with_priority(10)
            .mount(&accrual)
            .await;

        let secret = "integration-secret".to_string();
        let config = ServiceConfig {
            accrual_address: accrual.uri(),
            secret_key: secret.clone(),
            accrual_timeout_ms: 1000,
            accrual_poll_interval_ms: 20,
            deletion_workers: 4,
            ..ServiceConfig::default()
        };

        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config).expect("Failed to build app state");
        let router: Router = create_router(state.clone());

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            accrual,
            state,
            test_user_id: UserId::generate(),
            secret,
        }
    }

    /// `Authorization` header value for the test user.
    pub fn user_auth_header(&self) -> HeaderValue {
        self.auth_header_for(&self.test_user_id)
    }

    /// `Authorization` header value for any user.
    pub fn auth_header_for(&self, user_id: &UserId) -> HeaderValue {
        let token = sign_token(&self.secret, user_id);
        HeaderValue::from_str(&format!("Bearer {token}")).expect("token is ASCII")
    }

    /// `Cookie` header value carrying the test user's token.
    pub fn user_cookie(&self) -> HeaderValue {
        let token = sign_token(&self.secret, &self.test_user_id);
        HeaderValue::from_str(&format!("access_token={token}")).expect("token is ASCII")
    }

    /// Make the accrual stub report `order` as processed with `accrual` points.
    pub async fn accrual_processed(&self, order: &str, accrual: u32) {
        Mock::given(method("GET"))
            .and(path(format!("/api/orders/{order}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order": order,
                "status": "PROCESSED",
                "accrual": accrual
            })))
            .mount(&self.accrual)
            .await;
    }

    /// Wait until `user_id`'s current balance reaches `expected`.
    pub async fn wait_for_balance(&self, user_id: &UserId, expected: Decimal) {
        for _ in 0..200 {
            let balance = self.store.balance(user_id).await.expect("balance");
            if balance.current == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("balance never reached {expected}");
    }
}
