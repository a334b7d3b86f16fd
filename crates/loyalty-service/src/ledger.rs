//! Order submission and withdrawals.
//!
//! These are the synchronous entry points into the ledger. Both take the
//! authenticated user explicitly; neither waits on the accrual service.

use loyalty_core::{Balance, Decimal, LoyaltyError, Order, OrderNumber, UserId, Withdrawal};
use loyalty_store::{LedgerStore, StoreError};

use crate::reconcile::Reconciler;

/// Result of submitting an order number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The order was new; it is stored and queued for reconciliation.
    Accepted(Order),
    /// The caller had already submitted this order.
    AlreadyOwned(Order),
}

/// Parse a raw order number as it arrives from a request body.
///
/// # Errors
///
/// - `LoyaltyError::Format` if the body is not a digit string.
/// - `LoyaltyError::Validation` if the checksum fails.
pub fn parse_order_number(raw: &str) -> Result<OrderNumber, LoyaltyError> {
    Ok(raw.trim().parse::<OrderNumber>()?)
}

/// Register an order for `user` and start reconciling it.
///
/// # Errors
///
/// - `LoyaltyError::Format` / `LoyaltyError::Validation` for a bad number.
/// - `LoyaltyError::Conflict` if another user owns the number.
/// - `LoyaltyError::Storage` if the ledger fails.
pub async fn submit_order(
    store: &dyn LedgerStore,
    reconciler: &Reconciler,
    user: UserId,
    raw: &str,
) -> Result<Submission, LoyaltyError> {
    let number = parse_order_number(raw)?;
    let order = Order::new(number, user);

    match store.insert_order(&order).await {
        Ok(()) => {
            tracing::info!(order = %order.number, user_id = %user, "Order accepted");
            reconciler.schedule(&order);
            Ok(Submission::Accepted(order))
        }
        Err(StoreError::AlreadyExists { owner }) if owner == user => {
            let existing = store.find_order(&order.number).await?;
            Ok(Submission::AlreadyOwned(existing.unwrap_or(order)))
        }
        Err(StoreError::AlreadyExists { .. }) => {
            tracing::debug!(order = %order.number, user_id = %user, "Order owned by another user");
            Err(LoyaltyError::Conflict {
                order: order.number.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Debit `sum` from `user`'s balance against the reference order `raw_order`.
///
/// Returns the balance after the debit.
///
/// # Errors
///
/// - `LoyaltyError::Format` / `LoyaltyError::Validation` for a bad order number.
/// - `LoyaltyError::Validation` if `sum` is not positive.
/// - `LoyaltyError::InsufficientFunds` if `sum` exceeds the balance.
/// - `LoyaltyError::Storage` if the ledger fails; nothing is debited.
pub async fn withdraw(
    store: &dyn LedgerStore,
    user: UserId,
    raw_order: &str,
    sum: Decimal,
) -> Result<Balance, LoyaltyError> {
    let order = parse_order_number(raw_order)?;

    if sum <= Decimal::ZERO {
        return Err(LoyaltyError::Validation(format!(
            "withdrawal sum must be positive, got {sum}"
        )));
    }

    let withdrawal = Withdrawal::new(order, user, sum);
    let balance = store.insert_withdrawal(&withdrawal).await.map_err(|e| {
        if let StoreError::InsufficientFunds { current, requested } = &e {
            tracing::info!(
                user_id = %user,
                current = %current,
                requested = %requested,
                "Withdrawal refused"
            );
        }
        LoyaltyError::from(e)
    })?;

    tracing::info!(
        user_id = %user,
        order = %withdrawal.order,
        sum = %sum,
        current = %balance.current,
        "Withdrawal recorded"
    );

    Ok(balance)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use loyalty_core::OrderStatus;
    use loyalty_store::MemoryStore;

    use crate::accrual::AccrualClient;
    use crate::reconcile::ReconcileConfig;

    fn setup() -> (Arc<MemoryStore>, Reconciler) {
        let store = Arc::new(MemoryStore::new());
        // Nothing listens here; reconciliation attempts simply fail.
        let client = AccrualClient::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap();
        let config = ReconcileConfig {
            max_retries: 0,
            ..ReconcileConfig::default()
        };
        let reconciler = Reconciler::new(store.clone(), client, config);
        (store, reconciler)
    }

    async fn credit(store: &MemoryStore, user: UserId, amount: i64) {
        let order = Order::new("4561261212345467".parse().unwrap(), user);
        store.insert_order(&order).await.unwrap();
        store
            .update_order_status(&order.number, OrderStatus::Processed, Decimal::from(amount))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn new_order_is_accepted_as_new() {
        let (store, reconciler) = setup();
        let user = UserId::generate();

        let submission = submit_order(store.as_ref(), &reconciler, user, " 12345678903\n")
            .await
            .unwrap();
        let Submission::Accepted(order) = submission else {
            panic!("expected a fresh order");
        };
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.number.as_str(), "12345678903");
        assert!(store.find_order(&order.number).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn resubmission_by_owner_is_already_owned() {
        let (store, reconciler) = setup();
        let user = UserId::generate();

        submit_order(store.as_ref(), &reconciler, user, "12345678903").await.unwrap();
        let again = submit_order(store.as_ref(), &reconciler, user, "12345678903")
            .await
            .unwrap();
        assert!(matches!(again, Submission::AlreadyOwned(o) if o.user_id == user));
    }

    #[tokio::test]
    async fn order_owned_by_other_user_conflicts() {
        let (store, reconciler) = setup();
        let alice = UserId::generate();
        let bob = UserId::generate();

        submit_order(store.as_ref(), &reconciler, alice, "12345678903").await.unwrap();
        let err = submit_order(store.as_ref(), &reconciler, bob, "12345678903")
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Conflict { .. }));

        let stored = store.find_order(&"12345678903".parse().unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.user_id, alice);
    }

    #[tokio::test]
    async fn bad_numbers_are_rejected_before_storage() {
        let (store, reconciler) = setup();
        let user = UserId::generate();

        let err = submit_order(store.as_ref(), &reconciler, user, "12ab").await.unwrap_err();
        assert!(matches!(err, LoyaltyError::Format(_)));

        let err = submit_order(store.as_ref(), &reconciler, user, "12345678904")
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Validation(_)));

        assert!(store.list_orders(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn withdraw_debits_balance() {
        let (store, _) = setup();
        let user = UserId::generate();
        credit(&store, user, 500).await;

        let balance = withdraw(store.as_ref(), user, "2377225624", Decimal::from(200))
            .await
            .unwrap();
        assert_eq!(balance.current, Decimal::from(300));
        assert_eq!(balance.withdrawn, Decimal::from(200));
    }

    #[tokio::test]
    async fn overdraw_is_insufficient_funds() {
        let (store, _) = setup();
        let user = UserId::generate();
        credit(&store, user, 500).await;

        let err = withdraw(store.as_ref(), user, "2377225624", Decimal::from(600))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InsufficientFunds { .. }));
        assert_eq!(store.balance(&user).await.unwrap().current, Decimal::from(500));
        assert!(store.list_withdrawals(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn withdraw_validates_input() {
        let (store, _) = setup();
        let user = UserId::generate();
        credit(&store, user, 500).await;

        let err = withdraw(store.as_ref(), user, "2377225625", Decimal::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Validation(_)));

        let err = withdraw(store.as_ref(), user, "2377225624", Decimal::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Validation(_)));

        let err = withdraw(store.as_ref(), user, "2377225624", Decimal::from(-5))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Validation(_)));
    }
}
