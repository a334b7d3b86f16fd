//! Access tokens and the `AuthUser` extractor.
//!
//! A token is `<user_id>.<hex hmac-sha256(user_id)>` signed with the
//! configured secret. It is accepted from the access-token cookie or from an
//! `Authorization: Bearer` header; the cookie wins when both are present.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use loyalty_core::UserId;

use crate::crypto::{constant_time_eq, hmac_sha256_hex};
use crate::error::ApiError;
use crate::state::AppState;

/// Issue a token for `user_id`.
#[must_use]
pub fn sign_token(secret: &str, user_id: &UserId) -> String {
    let subject = user_id.to_string();
    let signature = hmac_sha256_hex(secret, &subject);
    format!("{subject}.{signature}")
}

/// Check a token's signature and return the user it names.
///
/// Returns `None` for anything malformed or signed with another secret.
#[must_use]
pub fn verify_token(secret: &str, token: &str) -> Option<UserId> {
    let (subject, signature) = token.trim().rsplit_once('.')?;
    let expected = hmac_sha256_hex(secret, subject);
    if !constant_time_eq(&expected, &signature.to_ascii_lowercase()) {
        return None;
    }
    subject.parse().ok()
}

/// Pull the raw token out of the request headers.
fn token_from_headers<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value);

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    })
}

/// An authenticated user.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The user ID carried by the token.
    pub user_id: UserId,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = token_from_headers(&parts.headers, &state.config.access_token_name)
                .ok_or(ApiError::Unauthorized)?;

            let user_id = verify_token(&state.config.secret_key, token).ok_or_else(|| {
                tracing::debug!("Rejected access token");
                ApiError::Unauthorized
            })?;

            Ok(AuthUser { user_id })
        })
    }
}
