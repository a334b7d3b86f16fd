//! Short-link deletion handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Queue the caller's links for soft deletion (JSON array of slugs).
///
/// Responds 202 as soon as the batch is queued, or 503 if the deletion
/// pool is saturated. Never waits for a free slot.
pub async fn delete_urls(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(slugs): Json<Vec<String>>,
) -> Result<StatusCode, ApiError> {
    let count = slugs.len();
    state
        .deletions
        .delete_slugs(auth.user_id, slugs)?;

    tracing::debug!(user_id = %auth.user_id, slugs = count, "Link deletion accepted");
    Ok(StatusCode::ACCEPTED)
}
