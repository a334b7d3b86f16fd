//! Batched soft deletion of short links.
//!
//! A fixed pipeline built once at startup:
//!
//! ```text
//! delete_slugs ─► intake ─► distributor ─┬─► worker 0 ─┐
//!                                        ├─► worker 1 ─┼─► completions ─► drain
//!                                        └─► worker N ─┘
//! ```
//!
//! The distributor hands batches to workers round-robin. Every worker reports
//! into one completion channel that a single drain task consumes. Callers
//! never wait: a batch is either queued at once or refused with
//! [`DeletionError::Busy`]. Nothing is reported back after queueing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use loyalty_core::UserId;
use loyalty_store::LedgerStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Batches the intake channel buffers per worker before callers are refused.
const INTAKE_SLOTS_PER_WORKER: usize = 4;

/// Errors from the deletion pool.
#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    /// The pool has been shut down and accepts no more work.
    #[error("deletion pool is shut down")]
    Closed,

    /// The intake buffer is full.
    #[error("deletion pool is saturated")]
    Busy,
}

/// One caller's request: soft-delete these slugs for this user.
#[derive(Debug, Clone)]
struct DeletionBatch {
    user_id: UserId,
    slugs: Vec<String>,
}

/// What a worker reports after applying a batch.
#[derive(Debug)]
struct Completion {
    worker: usize,
    user_id: UserId,
    slugs: usize,
    error: Option<String>,
}

/// Fan-out/fan-in pool applying soft deletes in the background.
pub struct DeletionPool {
    intake: Mutex<Option<mpsc::Sender<DeletionBatch>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    completed: Arc<AtomicU64>,
    workers: usize,
}

impl DeletionPool {
    /// Start the pool with `workers` workers (at least one).
    #[must_use]
    pub fn start(store: Arc<dyn LedgerStore>, workers: usize) -> Self {
        let workers = workers.max(1);
        let (intake_tx, intake_rx) = mpsc::channel(workers * INTAKE_SLOTS_PER_WORKER);
        let (done_tx, done_rx) = mpsc::channel(workers);
        let completed = Arc::new(AtomicU64::new(0));

        let mut tasks = Vec::with_capacity(workers + 2);
        let mut worker_txs = Vec::with_capacity(workers);

        for id in 0..workers {
            let (tx, rx) = mpsc::channel(1);
            worker_txs.push(tx);
            tasks.push(tokio::spawn(worker(
                id,
                Arc::clone(&store),
                rx,
                done_tx.clone(),
            )));
        }
        // Only the workers hold completion senders now, so the drain ends
        // exactly when the last worker exits.
        drop(done_tx);

        tasks.push(tokio::spawn(distribute(intake_rx, worker_txs)));
        tasks.push(tokio::spawn(drain(done_rx, Arc::clone(&completed))));

        tracing::info!(workers, "Deletion pool started");

        Self {
            intake: Mutex::new(Some(intake_tx)),
            tasks: Mutex::new(tasks),
            completed,
            workers,
        }
    }

    /// Queue `slugs` for soft deletion on behalf of `user_id`.
    ///
    /// Never waits for a free slot.
    ///
    /// # Errors
    ///
    /// - `DeletionError::Busy` if the intake buffer is full.
    /// - `DeletionError::Closed` after [`DeletionPool::shutdown`].
    pub fn delete_slugs(
        &self,
        user_id: UserId,
        slugs: Vec<String>,
    ) -> Result<(), DeletionError> {
        if slugs.is_empty() {
            return Ok(());
        }

        let sender = self
            .intake
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DeletionError::Closed)?;

        let count = slugs.len();
        sender
            .try_send(DeletionBatch { user_id, slugs })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeletionError::Busy,
                mpsc::error::TrySendError::Closed(_) => DeletionError::Closed,
            })?;

        tracing::debug!(user_id = %user_id, slugs = count, "Deletion batch queued");
        Ok(())
    }

    /// Stop accepting work and wait until every queued batch is applied.
    pub async fn shutdown(&self) {
        let sender = self
            .intake
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let tasks: Vec<_> = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );

        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Deletion task failed");
            }
        }

        tracing::info!(
            completed = self.completed_batches(),
            "Deletion pool drained"
        );
    }

    /// Number of batches the workers have finished, successfully or not.
    #[must_use]
    pub fn completed_batches(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Number of workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

async fn distribute(
    mut intake: mpsc::Receiver<DeletionBatch>,
    workers: Vec<mpsc::Sender<DeletionBatch>>,
) {
    let mut next = 0;
    while let Some(batch) = intake.recv().await {
        if let Err(e) = workers[next].send(batch).await {
            let lost = e.0;
            tracing::error!(
                worker = next,
                user_id = %lost.user_id,
                slugs = lost.slugs.len(),
                "Deletion worker gone, batch dropped"
            );
        }
        next = (next + 1) % workers.len();
    }
}

async fn worker(
    id: usize,
    store: Arc<dyn LedgerStore>,
    mut batches: mpsc::Receiver<DeletionBatch>,
    done: mpsc::Sender<Completion>,
) {
    while let Some(batch) = batches.recv().await {
        let error = store
            .soft_delete(&batch.user_id, &batch.slugs)
            .await
            .err()
            .map(|e| e.to_string());

        let completion = Completion {
            worker: id,
            user_id: batch.user_id,
            slugs: batch.slugs.len(),
            error,
        };

        if done.send(completion).await.is_err() {
            tracing::warn!(worker = id, "Completion stream closed");
        }
    }
}

async fn drain(mut completions: mpsc::Receiver<Completion>, completed: Arc<AtomicU64>) {
    while let Some(c) = completions.recv().await {
        completed.fetch_add(1, Ordering::Relaxed);
        match c.error {
            None => tracing::debug!(
                worker = c.worker,
                user_id = %c.user_id,
                slugs = c.slugs,
                "Links soft-deleted"
            ),
            Some(error) => tracing::error!(
                worker = c.worker,
                user_id = %c.user_id,
                slugs = c.slugs,
                error = %error,
                "Soft delete failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_core::ShortLink;
    use loyalty_store::MemoryStore;

    async fn store_with_links(user: UserId, slugs: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for slug in slugs {
            store
                .put_link(&ShortLink::new(*slug, format!("https://example.com/{slug}"), user))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn shutdown_applies_every_queued_batch() {
        let user = UserId::generate();
        let slugs: Vec<String> = (0..40).map(|i| format!("s{i}")).collect();
        let refs: Vec<&str> = slugs.iter().map(String::as_str).collect();
        let store = store_with_links(user, &refs).await;

        let pool = DeletionPool::start(store.clone(), 4);
        for chunk in slugs.chunks(3) {
            pool.delete_slugs(user, chunk.to_vec()).unwrap();
        }
        pool.shutdown().await;

        assert_eq!(pool.completed_batches(), 14);
        for slug in &slugs {
            assert!(store.get_link(slug).await.unwrap().unwrap().deleted, "{slug}");
        }
    }

    #[tokio::test]
    async fn duplicate_batches_are_idempotent() {
        let user = UserId::generate();
        let store = store_with_links(user, &["slug1", "slug2"]).await;
        let pool = DeletionPool::start(store.clone(), 10);

        let batch = vec!["slug1".to_string(), "slug2".to_string()];
        pool.delete_slugs(user, batch.clone()).unwrap();
        pool.delete_slugs(user, batch).unwrap();
        pool.shutdown().await;

        assert_eq!(pool.completed_batches(), 2);
        assert!(store.get_link("slug1").await.unwrap().unwrap().deleted);
        assert!(store.get_link("slug2").await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn other_users_links_survive() {
        let owner = UserId::generate();
        let store = store_with_links(owner, &["mine"]).await;
        let pool = DeletionPool::start(store.clone(), 2);

        pool.delete_slugs(UserId::generate(), vec!["mine".into()])
            .unwrap();
        pool.shutdown().await;

        assert!(!store.get_link("mine").await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn closed_pool_rejects_work() {
        let pool = DeletionPool::start(Arc::new(MemoryStore::new()), 0);
        assert_eq!(pool.workers(), 1);
        pool.shutdown().await;

        let err = pool
            .delete_slugs(UserId::generate(), vec!["x".into()])
            .unwrap_err();
        assert!(matches!(err, DeletionError::Closed));
    }

    #[tokio::test]
    async fn full_intake_refuses_instead_of_waiting() {
        let user = UserId::generate();
        let store = store_with_links(user, &["s"]).await;
        let pool = DeletionPool::start(store.clone(), 1);

        // The single-threaded test runtime does not run the pool's tasks
        // until this test yields, so nothing drains the intake meanwhile.
        for _ in 0..INTAKE_SLOTS_PER_WORKER {
            pool.delete_slugs(user, vec!["s".into()]).unwrap();
        }
        let err = pool.delete_slugs(user, vec!["s".into()]).unwrap_err();
        assert!(matches!(err, DeletionError::Busy));

        pool.shutdown().await;
        assert_eq!(pool.completed_batches(), INTAKE_SLOTS_PER_WORKER as u64);
        assert!(store.get_link("s").await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let pool = DeletionPool::start(Arc::new(MemoryStore::new()), 1);
        pool.delete_slugs(UserId::generate(), Vec::new()).unwrap();
        pool.shutdown().await;
        assert_eq!(pool.completed_batches(), 0);
    }
}
