//! Accrual service integration.
//!
//! The accrual service calculates the points granted for an order. It is an
//! opaque upstream: the ledger only asks it, one order at a time, how far the
//! calculation has come.

pub mod client;
pub mod types;

pub use client::{AccrualClient, AccrualError};
pub use types::OrderAccrualResponse;
