//! Core types and utilities for the loyalty points ledger.
//!
//! This crate provides the foundational types used throughout the platform:
//!
//! - **Identifiers**: `UserId`, `OrderNumber`
//! - **Orders**: `Order`, `OrderStatus`, `AccrualSnapshot`
//! - **Ledger**: `Balance`, `Withdrawal`
//! - **Links**: `ShortLink`
//! - **Validation**: the Luhn check used for every order number
//!
//! # Amounts
//!
//! Accruals, withdrawals and balances are `rust_decimal::Decimal` so that
//! sums over many orders stay exact. A balance is never stored as a running
//! counter; it is always derived from the processed accruals and the
//! withdrawals of a user.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod ledger;
pub mod link;
pub mod luhn;
pub mod order;

pub use error::{LoyaltyError, Result};
pub use ids::{IdError, OrderNumber, UserId};
pub use ledger::{Balance, Withdrawal};
pub use link::ShortLink;
pub use order::{AccrualSnapshot, Order, OrderStatus};

/// Re-exported so downstream crates agree on the money type.
pub use rust_decimal::Decimal;
