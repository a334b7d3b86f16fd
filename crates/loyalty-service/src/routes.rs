//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{balance, health, orders, urls};
use crate::state::AppState;

/// Maximum concurrent requests across the `/api/user` routes.
const USER_API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Liveness
/// - `GET /ping` - Storage reachability
///
/// ## User API (access token, concurrency-limited)
/// - `POST /api/user/orders` - Submit an order number
/// - `GET /api/user/orders` - List submitted orders
/// - `GET /api/user/balance` - Current and withdrawn points
/// - `POST /api/user/balance/withdraw` - Spend points
/// - `GET /api/user/withdrawals` - Withdrawal history
/// - `DELETE /api/user/urls` - Soft-delete short links
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let user_routes = Router::new()
        .route("/orders", post(orders::submit_order).get(orders::list_orders))
        .route("/balance", get(balance::get_balance))
        .route("/balance/withdraw", post(balance::withdraw))
        .route("/withdrawals", get(balance::list_withdrawals))
        .route("/urls", delete(urls::delete_urls))
        .layer(ConcurrencyLimitLayer::new(USER_API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .route("/ping", get(health::ping))
        .nest("/api/user", user_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout_seconds)))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}
