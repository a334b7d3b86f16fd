//! Loyalty HTTP API Service.
//!
//! This crate provides the HTTP API and background machinery for the loyalty
//! ledger, including:
//!
//! - Order submission and listing
//! - Balance and withdrawals
//! - Accrual reconciliation against the external accrual service
//! - Batched soft deletion of short links
//!
//! # Authentication
//!
//! Every `/api/user` route requires a signed access token, either in the
//! `access_token` cookie or as a `Bearer` token. The token is issued by an
//! external login service sharing `SECRET_KEY`; see [`auth::sign_token`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers without awaits stay async for axum

pub mod accrual;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod deletion;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod reconcile;
pub mod routes;
pub mod state;

pub use accrual::{AccrualClient, AccrualError};
pub use config::{ServiceConfig, StorageBackend};
pub use deletion::DeletionPool;
pub use error::ApiError;
pub use reconcile::{ReconcileConfig, Reconciler};
pub use routes::create_router;
pub use state::AppState;
