//! Ledger storage for the loyalty service.
//!
//! The ledger is the single owner of durable order, withdrawal and short-link
//! state. Every other component mutates it through [`LedgerStore`] only.
//!
//! # Backends
//!
//! - [`PgStore`]: PostgreSQL, used in production. Withdrawals for the same
//!   user are serialized with a transaction-scoped advisory lock.
//! - [`MemoryStore`]: a single mutex around plain maps.
//! - [`FileStore`]: a `MemoryStore` persisted as a CBOR snapshot on flush.
//!
//! # Example
//!
//! ```no_run
//! use loyalty_core::{Order, UserId};
//! use loyalty_store::{LedgerStore, MemoryStore};
//!
//! # async fn demo() -> loyalty_store::Result<()> {
//! let store = MemoryStore::new();
//! let user = UserId::generate();
//! let order = Order::new("12345678903".parse().unwrap(), user);
//!
//! store.insert_order(&order).await?;
//! let balance = store.balance(&user).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod file;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use loyalty_core::{
    Balance, Decimal, Order, OrderNumber, OrderStatus, ShortLink, UserId, Withdrawal,
};

/// The storage trait defining all ledger operations.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // =========================================================================
    // Orders
    // =========================================================================

    /// Insert a new order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` carrying the stored owner if the
    /// order number is already present, for any user.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Find an order by number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_order(&self, number: &OrderNumber) -> Result<Option<Order>>;

    /// List a user's orders, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>>;

    /// Record the latest status and accrual observed for an order.
    ///
    /// An order that is already terminal is left untouched and the call
    /// succeeds, so replaying a reconciliation is harmless.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order doesn't exist.
    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<()>;

    /// List every order that has not reached a terminal status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_non_terminal_orders(&self) -> Result<Vec<Order>>;

    // =========================================================================
    // Balance and withdrawals
    // =========================================================================

    /// Compute a user's balance from processed accruals and withdrawals.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn balance(&self, user_id: &UserId) -> Result<Balance>;

    /// Check the balance and record a withdrawal as one atomic unit.
    ///
    /// Returns the balance after the debit.
    ///
    /// # Errors
    ///
    /// - `StoreError::InsufficientFunds` if the sum exceeds the balance; no
    ///   row is written.
    /// - Any storage failure leaves no partial debit behind.
    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<Balance>;

    /// List a user's withdrawals, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_withdrawals(&self, user_id: &UserId) -> Result<Vec<Withdrawal>>;

    // =========================================================================
    // Short links
    // =========================================================================

    /// Insert or replace a short link.
    ///
    /// A link that is already soft-deleted stays deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_link(&self, link: &ShortLink) -> Result<()>;

    /// Get a short link by slug, deleted or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_link(&self, slug: &str) -> Result<Option<ShortLink>>;

    /// Mark the user's links among `slugs` as deleted.
    ///
    /// Slugs owned by someone else or unknown are ignored. Applying the same
    /// batch twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn soft_delete(&self, user_id: &UserId, slugs: &[String]) -> Result<()>;

    // =========================================================================
    // Health
    // =========================================================================

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve requests.
    async fn ping(&self) -> Result<()>;
}
