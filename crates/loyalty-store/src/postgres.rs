//! PostgreSQL ledger.
//!
//! Balances are derived with `SUM` over `orders` and `withdrawals`; there is
//! no cached balance row. Withdrawals take a transaction-scoped advisory lock
//! keyed by the user id before reading the balance, so two debits for the same
//! user can never both pass the funds check against a stale total.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loyalty_core::{
    Balance, Decimal, Order, OrderNumber, OrderStatus, ShortLink, UserId, Withdrawal,
};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::LedgerStore;

/// Default connection pool size.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// How long to wait for a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

type OrderRow = (String, Uuid, String, Decimal, DateTime<Utc>);
type WithdrawalRow = (String, Uuid, Decimal, DateTime<Utc>);
type LinkRow = (String, String, Uuid, bool);

/// PostgreSQL-backed ledger.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `dsn`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(dsn)
            .await?;
        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::info!("ledger migrations applied");
        Ok(())
    }

    /// Borrow the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn balance_on(conn: &mut PgConnection, user_id: &UserId) -> Result<Balance> {
        let (accrued, withdrawn): (Decimal, Decimal) = sqlx::query_as(
            r"
            SELECT
                (SELECT COALESCE(SUM(accrual), 0) FROM orders
                  WHERE user_id = $1 AND status = 'PROCESSED'),
                (SELECT COALESCE(SUM(amount), 0) FROM withdrawals
                  WHERE user_id = $1)
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&mut *conn)
        .await?;

        Ok(Balance::from_totals(accrued, withdrawn))
    }
}

fn order_from_row((number, user_id, status, accrual, uploaded_at): OrderRow) -> Result<Order> {
    Ok(Order {
        number: number
            .parse()
            .map_err(|e| StoreError::Serialization(format!("order {number}: {e}")))?,
        user_id: UserId::from_uuid(user_id),
        status: status.parse().map_err(StoreError::Serialization)?,
        accrual,
        uploaded_at,
    })
}

fn withdrawal_from_row((order, user_id, sum, processed_at): WithdrawalRow) -> Result<Withdrawal> {
    Ok(Withdrawal {
        order: order
            .parse()
            .map_err(|e| StoreError::Serialization(format!("withdrawal order {order}: {e}")))?,
        user_id: UserId::from_uuid(user_id),
        sum,
        processed_at,
    })
}

fn link_from_row((slug, url, user_id, deleted): LinkRow) -> ShortLink {
    ShortLink {
        slug,
        url,
        user_id: UserId::from_uuid(user_id),
        deleted,
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    // =========================================================================
    // Orders
    // =========================================================================

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let inserted = sqlx::query(
            r"
            INSERT INTO orders (number, user_id, status, accrual, uploaded_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (number) DO NOTHING
            ",
        )
        .bind(order.number.as_str())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.accrual)
        .bind(order.uploaded_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(());
        }

        let (owner,): (Uuid,) = sqlx::query_as("SELECT user_id FROM orders WHERE number = $1")
            .bind(order.number.as_str())
            .fetch_one(&self.pool)
            .await?;

        Err(StoreError::AlreadyExists {
            owner: UserId::from_uuid(owner),
        })
    }

    async fn find_order(&self, number: &OrderNumber) -> Result<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT number, user_id, status, accrual, uploaded_at FROM orders WHERE number = $1",
        )
        .bind(number.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(order_from_row).transpose()
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r"
            SELECT number, user_id, status, accrual, uploaded_at FROM orders
            WHERE user_id = $1
            ORDER BY uploaded_at, number
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(order_from_row).collect()
    }

    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<()> {
        let updated = sqlx::query(
            r"
            UPDATE orders SET status = $2, accrual = $3
            WHERE number = $1 AND status NOT IN ('INVALID', 'PROCESSED')
            ",
        )
        .bind(number.as_str())
        .bind(status.as_str())
        .bind(accrual)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            let exists: Option<(String,)> =
                sqlx::query_as("SELECT status FROM orders WHERE number = $1")
                    .bind(number.as_str())
                    .fetch_optional(&self.pool)
                    .await?;
            if exists.is_none() {
                return Err(StoreError::NotFound);
            }
        }

        Ok(())
    }

    async fn list_non_terminal_orders(&self) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r"
            SELECT number, user_id, status, accrual, uploaded_at FROM orders
            WHERE status NOT IN ('INVALID', 'PROCESSED')
            ORDER BY uploaded_at
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(order_from_row).collect()
    }

    // =========================================================================
    // Balance and withdrawals
    // =========================================================================

    async fn balance(&self, user_id: &UserId) -> Result<Balance> {
        let mut conn = self.pool.acquire().await?;
        Self::balance_on(&mut *conn, user_id).await
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<Balance> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(withdrawal.user_id.to_string())
            .execute(&mut *tx)
            .await?;

        let balance = Self::balance_on(&mut *tx, &withdrawal.user_id).await?;
        if !balance.covers(withdrawal.sum) {
            // Dropping the transaction rolls it back and releases the lock.
            return Err(StoreError::InsufficientFunds {
                current: balance.current,
                requested: withdrawal.sum,
            });
        }

        sqlx::query(
            r"
            INSERT INTO withdrawals (user_id, order_number, amount, processed_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(withdrawal.user_id.as_uuid())
        .bind(withdrawal.order.as_str())
        .bind(withdrawal.sum)
        .bind(withdrawal.processed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(balance.debit(withdrawal.sum))
    }

    async fn list_withdrawals(&self, user_id: &UserId) -> Result<Vec<Withdrawal>> {
        let rows: Vec<WithdrawalRow> = sqlx::query_as(
            r"
            SELECT order_number, user_id, amount, processed_at FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at, id
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(withdrawal_from_row).collect()
    }

    // =========================================================================
    // Short links
    // =========================================================================

    async fn put_link(&self, link: &ShortLink) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO links (slug, url, user_id, deleted)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO UPDATE SET
                url = EXCLUDED.url,
                user_id = EXCLUDED.user_id,
                deleted = links.deleted OR EXCLUDED.deleted
            ",
        )
        .bind(&link.slug)
        .bind(&link.url)
        .bind(link.user_id.as_uuid())
        .bind(link.deleted)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_link(&self, slug: &str) -> Result<Option<ShortLink>> {
        let row: Option<LinkRow> =
            sqlx::query_as("SELECT slug, url, user_id, deleted FROM links WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(link_from_row))
    }

    async fn soft_delete(&self, user_id: &UserId, slugs: &[String]) -> Result<()> {
        if slugs.is_empty() {
            return Ok(());
        }

        let updated = sqlx::query(
            "UPDATE links SET deleted = TRUE WHERE user_id = $1 AND slug = ANY($2) AND NOT deleted",
        )
        .bind(user_id.as_uuid())
        .bind(slugs)
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::debug!(
            user_id = %user_id,
            requested = slugs.len(),
            updated,
            "soft delete applied"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
