//! In-memory ledger.
//!
//! All state lives behind one mutex. Each operation takes the lock exactly
//! once, which is also what makes the withdrawal check-then-write atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use loyalty_core::{
    Balance, Decimal, Order, OrderNumber, OrderStatus, ShortLink, UserId, Withdrawal,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::LedgerStore;

/// Everything the in-memory ledger holds. Also the file snapshot format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    orders: HashMap<OrderNumber, Order>,
    withdrawals: Vec<Withdrawal>,
    links: HashMap<String, ShortLink>,
}

impl Snapshot {
    fn balance(&self, user_id: &UserId) -> Balance {
        let accrued: Decimal = self
            .orders
            .values()
            .filter(|o| o.user_id == *user_id)
            .map(Order::credited)
            .sum();
        let withdrawn: Decimal = self
            .withdrawals
            .iter()
            .filter(|w| w.user_id == *user_id)
            .map(|w| w.sum)
            .sum();
        Balance::from_totals(accrued, withdrawn)
    }
}

/// Mutex-guarded in-memory ledger.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Snapshot>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    pub(crate) fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Database(format!("ledger lock poisoned: {e}")))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    // =========================================================================
    // Orders
    // =========================================================================

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(existing) = state.orders.get(&order.number) {
            return Err(StoreError::AlreadyExists {
                owner: existing.user_id,
            });
        }
        state.orders.insert(order.number.clone(), order.clone());
        Ok(())
    }

    async fn find_order(&self, number: &OrderNumber) -> Result<Option<Order>> {
        Ok(self.lock()?.orders.get(number).cloned())
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let state = self.lock()?;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == *user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<()> {
        let mut state = self.lock()?;
        let order = state.orders.get_mut(number).ok_or(StoreError::NotFound)?;
        if order.is_terminal() {
            return Ok(());
        }
        order.status = status;
        order.accrual = accrual;
        Ok(())
    }

    async fn list_non_terminal_orders(&self) -> Result<Vec<Order>> {
        let state = self.lock()?;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| !o.is_terminal())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(orders)
    }

    // =========================================================================
    // Balance and withdrawals
    // =========================================================================

    async fn balance(&self, user_id: &UserId) -> Result<Balance> {
        Ok(self.lock()?.balance(user_id))
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<Balance> {
        let mut state = self.lock()?;
        let balance = state.balance(&withdrawal.user_id);
        if !balance.covers(withdrawal.sum) {
            return Err(StoreError::InsufficientFunds {
                current: balance.current,
                requested: withdrawal.sum,
            });
        }
        state.withdrawals.push(withdrawal.clone());
        Ok(balance.debit(withdrawal.sum))
    }

    async fn list_withdrawals(&self, user_id: &UserId) -> Result<Vec<Withdrawal>> {
        let state = self.lock()?;
        let mut withdrawals: Vec<Withdrawal> = state
            .withdrawals
            .iter()
            .filter(|w| w.user_id == *user_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        withdrawals.sort_by(|a, b| a.processed_at.cmp(&b.processed_at));
        Ok(withdrawals)
    }

    // =========================================================================
    // Short links
    // =========================================================================

    async fn put_link(&self, link: &ShortLink) -> Result<()> {
        let mut state = self.lock()?;
        let mut link = link.clone();
        // A soft delete is permanent.
        if let Some(existing) = state.links.get(&link.slug) {
            link.deleted |= existing.deleted;
        }
        state.links.insert(link.slug.clone(), link);
        Ok(())
    }

    async fn get_link(&self, slug: &str) -> Result<Option<ShortLink>> {
        Ok(self.lock()?.links.get(slug).cloned())
    }

    async fn soft_delete(&self, user_id: &UserId, slugs: &[String]) -> Result<()> {
        let mut state = self.lock()?;
        for slug in slugs {
            if let Some(link) = state.links.get_mut(slug) {
                if link.user_id == *user_id {
                    link.deleted = true;
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}
