//! Cancel command handler
//!
//! Cancellation is allowed for PENDING orders at any time, and for later
//! states only inside the 24-hour window and never after DELIVERED/REFUNDED.
//! Stock flows back according to how far each item got: CONFIRMED units are
//! un-reserved, FULFILLED units are restocked.

use async_trait::async_trait;

use shared::order::{ItemStatus, OrderStatus, ShipmentStatus};

use crate::orders::state_machine::{assert_transition, can_cancel};
use crate::orders::traits::{ActionOutcome, CommandContext, CommandHandler, OrderError, OrderResult};
use crate::services::notifier::DomainEvent;
use crate::stock;

/// Cancel action
#[derive(Debug, Clone)]
pub struct CancelAction {
    pub order_id: String,
    pub reason: String,
}

#[async_trait]
impl CommandHandler for CancelAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        // 1. Load and validate the cancellation guard and the transition
        let mut order = ctx.load_order(&self.order_id)?;
        if !can_cancel(&order, ctx.now) {
            return Err(OrderError::InvalidOrderState(format!(
                "order {} can no longer be cancelled (status {:?})",
                order.order_number, order.status
            )));
        }
        assert_transition(&order, OrderStatus::Cancelled)?;

        // 2. Release stock per item status
        stock::release_on_cancel(ctx.storage(), ctx.txn(), &order.items, ctx.now)?;

        // 3. Cascade to the shipment and items
        if let Some(shipment) = order.shipment.as_mut() {
            shipment.status = ShipmentStatus::Cancelled;
        }
        order.set_item_statuses(ItemStatus::Cancelled);

        // 4. Transition with audit note
        order.status = OrderStatus::Cancelled;
        order.append_note(format!("cancelled: {}", self.reason));
        ctx.store_order(&mut order)?;

        tracing::info!(
            order_id = %order.order_id,
            reason = %self.reason,
            "Order cancelled"
        );

        let event = DomainEvent::OrderCancelled {
            order_id: order.order_id.clone(),
            reason: self.reason.clone(),
        };
        Ok(ActionOutcome::with_event(order, event))
    }
}
