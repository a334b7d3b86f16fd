//! Accrual reconciliation.
//!
//! Every order that is not yet `PROCESSED` or `INVALID` gets one background
//! task that polls the accrual service and writes each observation back to
//! the ledger until a terminal status arrives. The task owns its order number
//! for its whole life, so writes to one order are never interleaved.
//!
//! Upstream failures are retried with exponential backoff. When the retry
//! budget is spent the task stops without touching the order; the next
//! [`Reconciler::bootstrap`] pass picks it up again.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use loyalty_core::{Order, OrderNumber, OrderStatus};
use loyalty_store::{LedgerStore, StoreError};
use tokio::task::JoinHandle;

use crate::accrual::{AccrualClient, AccrualError};
use crate::config::ServiceConfig;

// ============================================================================
// Constants
// ============================================================================

/// Initial backoff after an upstream failure (doubles with each attempt).
const INITIAL_BACKOFF_MS: u64 = 100;

/// Maximum backoff between retries.
const MAX_BACKOFF_MS: u64 = 5000;

/// Consecutive rate-limited replies tolerated before giving up.
const MAX_RATE_LIMITED: u32 = 10;

/// Tuning for the per-order poll loop.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileConfig {
    /// Delay between polls while the order is still pending.
    pub poll_interval: Duration,

    /// Consecutive upstream failures retried before giving up.
    pub max_retries: u32,

    /// Consecutive 429 replies waited out before giving up.
    pub max_rate_limited: u32,

    /// First backoff delay after a failure.
    pub initial_backoff: Duration,

    /// Upper bound on the backoff delay.
    pub max_backoff: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_retries: 3,
            max_rate_limited: MAX_RATE_LIMITED,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl From<&ServiceConfig> for ReconcileConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_retries: config.accrual_max_retries,
            ..Self::default()
        }
    }
}

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The order reached a terminal status and it was stored.
    Terminal(OrderStatus),
    /// The loop stopped early; the order keeps its last stored status.
    Abandoned,
}

/// Schedules and tracks per-order reconciliation tasks.
pub struct Reconciler {
    store: Arc<dyn LedgerStore>,
    client: AccrualClient,
    config: ReconcileConfig,
    in_flight: Arc<Mutex<HashSet<OrderNumber>>>,
}

impl Reconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        client: AccrualClient,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            client,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start polling `order` in the background.
    ///
    /// Returns `None` without spawning if the order is already terminal or
    /// already being polled.
    pub fn schedule(&self, order: &Order) -> Option<JoinHandle<PollOutcome>> {
        if order.is_terminal() {
            tracing::debug!(
                order = %order.number,
                status = %order.status,
                "Order already terminal"
            );
            return None;
        }

        let Some(claim) = InFlight::claim(&self.in_flight, &order.number) else {
            tracing::debug!(order = %order.number, "Order already being reconciled");
            return None;
        };

        let poller = Poller {
            store: Arc::clone(&self.store),
            client: self.client.clone(),
            config: self.config,
            number: order.number.clone(),
        };

        tracing::debug!(
            order = %order.number,
            user_id = %order.user_id,
            "Reconciliation scheduled"
        );

        Some(tokio::spawn(async move {
            let _claim = claim;
            poller.run().await
        }))
    }

    /// Schedule every stored order that has not reached a terminal status.
    ///
    /// Returns the number of tasks started. Orders already in flight are
    /// skipped, so running this twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending orders cannot be listed.
    pub async fn bootstrap(&self) -> Result<usize, StoreError> {
        let pending = self.store.list_non_terminal_orders().await?;
        let total = pending.len();

        let started = pending
            .iter()
            .filter_map(|order| self.schedule(order))
            .count();

        tracing::info!(pending = total, started, "Reconciliation bootstrap complete");
        Ok(started)
    }

    /// Number of orders currently being polled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Membership in the in-flight set, released on drop.
struct InFlight {
    set: Arc<Mutex<HashSet<OrderNumber>>>,
    number: OrderNumber,
}

impl InFlight {
    fn claim(set: &Arc<Mutex<HashSet<OrderNumber>>>, number: &OrderNumber) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(number.clone());

        inserted.then(|| Self {
            set: Arc::clone(set),
            number: number.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.number);
    }
}

/// The poll loop for a single order.
struct Poller {
    store: Arc<dyn LedgerStore>,
    client: AccrualClient,
    config: ReconcileConfig,
    number: OrderNumber,
}

impl Poller {
    async fn run(self) -> PollOutcome {
        let mut failures = 0u32;
        let mut rate_limited = 0u32;
        let mut backoff = self.config.initial_backoff;

        loop {
            match self.client.fetch_status(&self.number).await {
                Ok(snapshot) => {
                    failures = 0;
                    rate_limited = 0;
                    backoff = self.config.initial_backoff;

                    if let Err(e) = self
                        .store
                        .update_order_status(&self.number, snapshot.status, snapshot.accrual)
                        .await
                    {
                        tracing::error!(
                            order = %self.number,
                            error = %e,
                            "Failed to store accrual status"
                        );
                        return PollOutcome::Abandoned;
                    }

                    if snapshot.status.is_terminal() {
                        tracing::info!(
                            order = %self.number,
                            status = %snapshot.status,
                            accrual = %snapshot.accrual,
                            "Order reconciled"
                        );
                        return PollOutcome::Terminal(snapshot.status);
                    }

                    tracing::debug!(
                        order = %self.number,
                        status = %snapshot.status,
                        "Order still pending"
                    );
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(AccrualError::TooManyRequests { retry_after }) => {
                    rate_limited += 1;

                    if rate_limited > self.config.max_rate_limited {
                        tracing::warn!(
                            order = %self.number,
                            attempt = %rate_limited,
                            "Accrual service kept rate limiting, giving up"
                        );
                        return PollOutcome::Abandoned;
                    }

                    // Never retry sooner than the regular poll cadence.
                    let poll = self.config.poll_interval;
                    let wait = retry_after.map_or(poll, |d| d.max(poll));
                    tracing::debug!(
                        order = %self.number,
                        wait_ms = %wait.as_millis(),
                        "Accrual service rate limited, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    failures += 1;

                    if failures > self.config.max_retries {
                        tracing::warn!(
                            order = %self.number,
                            attempt = %failures,
                            error = %e,
                            "Accrual polling failed after max retries"
                        );
                        return PollOutcome::Abandoned;
                    }

                    tracing::debug!(
                        order = %self.number,
                        attempt = %failures,
                        backoff_ms = %backoff.as_millis(),
                        error = %e,
                        "Accrual polling failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;

                    // Exponential backoff with cap
                    backoff = (backoff * 2).min(self.config.max_backoff);
                }
            }
        }
    }
}
