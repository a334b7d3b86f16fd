//! API handlers.

pub mod balance;
pub mod health;
pub mod orders;
pub mod urls;
