//! Refund command handler
//!
//! DELIVERED or CANCELLED → REFUNDED. The refund is recorded as a
//! negative-amount payment row; the money movement itself belongs to the
//! gateway and is out of scope here.

use async_trait::async_trait;

use shared::order::{OrderStatus, PaymentRecord, PaymentStatus};

use crate::orders::money::{money_eq, to_decimal, validate_amount};
use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{ActionOutcome, CommandContext, CommandHandler, OrderError, OrderResult};
use crate::services::notifier::DomainEvent;

/// Refund action
#[derive(Debug, Clone)]
pub struct RefundAction {
    pub order_id: String,
    pub amount: f64,
    pub reason: String,
}

#[async_trait]
impl CommandHandler for RefundAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        validate_amount(self.amount, "refund amount")?;

        // 1. Load and validate: only DELIVERED/CANCELLED orders refund
        let mut order = ctx.load_order(&self.order_id)?;
        assert_transition(&order, OrderStatus::Refunded)?;

        // 2. The refund may not exceed what was charged
        if to_decimal(self.amount) > to_decimal(order.total) && !money_eq(self.amount, order.total)
        {
            return Err(OrderError::InvalidPaymentAmount(format!(
                "refund {} exceeds order total {}",
                self.amount, order.total
            )));
        }

        // 3. Record the negative payment and transition
        order.payments.push(PaymentRecord {
            payment_id: uuid::Uuid::new_v4().to_string(),
            method: "REFUND".to_string(),
            amount: -self.amount,
            currency: "ZAR".to_string(),
            status: PaymentStatus::Refunded,
            txn_id: None,
            failure_reason: None,
            processed_at: Some(ctx.now),
        });
        order.status = OrderStatus::Refunded;
        order.append_note(format!("refunded {}: {}", self.amount, self.reason));
        ctx.store_order(&mut order)?;

        tracing::info!(
            order_id = %order.order_id,
            amount = self.amount,
            reason = %self.reason,
            "Order refunded"
        );

        let event = DomainEvent::OrderRefunded {
            order_id: order.order_id.clone(),
            amount: self.amount,
        };
        Ok(ActionOutcome::with_event(order, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::actions::CancelAction;
    use crate::orders::storage::LedgerStorage;
    use crate::orders::testutil::{seed_order, Stage};
    use shared::order::FulfilmentMethod;

    fn refund(amount: f64) -> RefundAction {
        RefundAction {
            order_id: "order-1".to_string(),
            amount,
            reason: "defective unit".to_string(),
        }
    }

    #[tokio::test]
    async fn test_refund_delivered_order() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_order(&storage, FulfilmentMethod::Delivery, Stage::Delivered).await;

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 10_000);
        let outcome = refund(329.0).execute(&ctx).await.unwrap();
        drop(ctx);
        txn.commit().unwrap();

        let order = outcome.order;
        assert_eq!(order.status, OrderStatus::Refunded);
        let record = order.payments.last().unwrap();
        assert_eq!(record.amount, -329.0);
        assert_eq!(record.status, PaymentStatus::Refunded);
        assert!(order.notes.iter().any(|n| n.contains("defective unit")));
    }

    #[tokio::test]
    async fn test_refund_cancelled_order() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_order(&storage, FulfilmentMethod::Delivery, Stage::Paid).await;

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 2_000);
        CancelAction {
            order_id: "order-1".to_string(),
            reason: "changed mind".to_string(),
        }
        .execute(&ctx)
        .await
        .unwrap();
        let outcome = refund(100.0).execute(&ctx).await.unwrap();
        drop(ctx);
        txn.commit().unwrap();

        assert_eq!(outcome.order.status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_processing_order_fails() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_order(&storage, FulfilmentMethod::Delivery, Stage::Processing).await;

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 5_000);
        assert!(matches!(
            refund(100.0).execute(&ctx).await,
            Err(OrderError::InvalidOrderState(_))
        ));
    }

    #[tokio::test]
    async fn test_refund_exceeding_total_fails() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_order(&storage, FulfilmentMethod::Delivery, Stage::Delivered).await;

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 10_000);
        assert!(matches!(
            refund(10_000.0).execute(&ctx).await,
            Err(OrderError::InvalidPaymentAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_refund_non_positive_amount_fails() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_order(&storage, FulfilmentMethod::Delivery, Stage::Delivered).await;

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 10_000);
        assert!(matches!(
            refund(0.0).execute(&ctx).await,
            Err(OrderError::InvalidPaymentAmount(_))
        ));
    }
}
