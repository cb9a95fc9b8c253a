//! PaymentSuccess command handler
//!
//! Applies a confirmed gateway payment: PENDING → PAID, items → CONFIRMED.
//! The units were reserved when the order was created; payment confirms
//! them. Idempotent on the external transaction id — a replayed payment is
//! a success-no-op, not a second transition.

use async_trait::async_trait;

use shared::order::{ItemStatus, OrderStatus, PaymentRecord, PaymentStatus};

use crate::orders::money::validate_amount;
use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{ActionOutcome, CommandContext, CommandHandler, OrderResult};
use crate::services::notifier::DomainEvent;

/// PaymentSuccess action
#[derive(Debug, Clone)]
pub struct PaymentSuccessAction {
    pub order_id: String,
    /// External transaction id reported by the gateway
    pub txn_id: String,
    pub amount: f64,
    pub method: String,
    pub currency: String,
}

#[async_trait]
impl CommandHandler for PaymentSuccessAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        // 1. Idempotency: a known txn id means the payment was already
        //    applied — success-no-op, no second transition or reservation
        if let Some(existing_order) = ctx
            .storage()
            .payment_txn_order(ctx.txn(), &self.txn_id)?
        {
            tracing::info!(
                txn_id = %self.txn_id,
                order_id = %existing_order,
                "Duplicate payment notification, returning recorded state"
            );
            let order = ctx.load_order(&existing_order)?;
            return Ok(ActionOutcome::new(order));
        }

        validate_amount(self.amount, "payment amount")?;

        // 2. Load and validate the transition
        let mut order = ctx.load_order(&self.order_id)?;
        assert_transition(&order, OrderStatus::Paid)?;

        // 3. Record the payment and transition; the reservation taken at
        //    order creation stands, items just confirm
        order.payments.push(PaymentRecord {
            payment_id: uuid::Uuid::new_v4().to_string(),
            method: self.method.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            status: PaymentStatus::Completed,
            txn_id: Some(self.txn_id.clone()),
            failure_reason: None,
            processed_at: Some(ctx.now),
        });
        order.status = OrderStatus::Paid;
        order.set_item_statuses(ItemStatus::Confirmed);
        order.paid_at = Some(ctx.now);

        ctx.storage()
            .index_payment_txn(ctx.txn(), &self.txn_id, &order.order_id)?;
        ctx.store_order(&mut order)?;

        tracing::info!(
            order_id = %order.order_id,
            txn_id = %self.txn_id,
            amount = self.amount,
            "Payment applied, order paid"
        );

        let event = DomainEvent::OrderPaid {
            order_id: order.order_id.clone(),
            txn_id: self.txn_id.clone(),
        };
        Ok(ActionOutcome::with_event(order, event))
    }
}
