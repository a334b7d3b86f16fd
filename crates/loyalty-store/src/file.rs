//! File-backed ledger.
//!
//! Serves everything from a [`MemoryStore`] and persists it as a single CBOR
//! snapshot. The snapshot is loaded on [`FileStore::open`] and rewritten on
//! [`FileStore::flush`]; writes between flushes are lost on a crash.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use loyalty_core::{
    Balance, Decimal, Order, OrderNumber, OrderStatus, ShortLink, UserId, Withdrawal,
};

use crate::error::{Result, StoreError};
use crate::memory::{MemoryStore, Snapshot};
use crate::LedgerStore;

/// Ledger persisted to a snapshot file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open the snapshot at `path`, starting empty if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = match std::fs::read(&path) {
            Ok(data) => Self::deserialize(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), "opened file ledger");

        Ok(Self {
            path,
            inner: MemoryStore::from_snapshot(snapshot),
        })
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current state to disk.
    ///
    /// The snapshot is written to a sibling temp file and renamed over the
    /// old one, so a crash mid-write never leaves a truncated snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub async fn flush(&self) -> Result<()> {
        let data = Self::serialize(&self.inner.snapshot()?)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), bytes = data.len(), "flushed file ledger");
        Ok(())
    }

    fn serialize(snapshot: &Snapshot) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(snapshot, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> Result<Snapshot> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl LedgerStore for FileStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.inner.insert_order(order).await
    }

    async fn find_order(&self, number: &OrderNumber) -> Result<Option<Order>> {
        self.inner.find_order(number).await
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>> {
        self.inner.list_orders(user_id).await
    }

    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<()> {
        self.inner.update_order_status(number, status, accrual).await
    }

    async fn list_non_terminal_orders(&self) -> Result<Vec<Order>> {
        self.inner.list_non_terminal_orders().await
    }

    async fn balance(&self, user_id: &UserId) -> Result<Balance> {
        self.inner.balance(user_id).await
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<Balance> {
        self.inner.insert_withdrawal(withdrawal).await
    }

    async fn list_withdrawals(&self, user_id: &UserId) -> Result<Vec<Withdrawal>> {
        self.inner.list_withdrawals(user_id).await
    }

    async fn put_link(&self, link: &ShortLink) -> Result<()> {
        self.inner.put_link(link).await
    }

    async fn get_link(&self, slug: &str) -> Result<Option<ShortLink>> {
        self.inner.get_link(slug).await
    }

    async fn soft_delete(&self, user_id: &UserId, slugs: &[String]) -> Result<()> {
        self.inner.soft_delete(user_id, slugs).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("ledger.cbor")).unwrap();
        assert!(store.list_non_terminal_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_survives_flush_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.cbor");
        let user = UserId::generate();
        let number: OrderNumber = "12345678903".parse().unwrap();

        {
            let store = FileStore::open(&path).unwrap();
            store.insert_order(&Order::new(number.clone(), user)).await.unwrap();
            store
                .update_order_status(&number, OrderStatus::Processed, Decimal::new(72998, 2))
                .await
                .unwrap();
            store
                .insert_withdrawal(&Withdrawal::new(
                    "79927398713".parse().unwrap(),
                    user,
                    Decimal::new(2998, 2),
                ))
                .await
                .unwrap();
            store
                .put_link(&ShortLink::new("abc", "https://example.com", user))
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        let order = reopened.find_order(&number).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert_eq!(order.accrual, Decimal::new(72998, 2));

        let balance = reopened.balance(&user).await.unwrap();
        assert_eq!(balance.current, Decimal::from(700));
        assert_eq!(balance.withdrawn, Decimal::new(2998, 2));

        assert!(reopened.get_link("abc").await.unwrap().is_some());
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.cbor");
        std::fs::write(&path, b"not cbor at all").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
