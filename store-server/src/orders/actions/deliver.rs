//! Deliver command handler
//!
//! SHIPPED (or PROCESSING, for courier-less runs) → DELIVERED. Stamps the
//! shipment with the actual delivery time and optional proof.

use async_trait::async_trait;

use shared::order::{OrderStatus, ShipmentStatus};

use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{ActionOutcome, CommandContext, CommandHandler, OrderResult};
use crate::services::notifier::DomainEvent;

/// Deliver action
#[derive(Debug, Clone)]
pub struct DeliverAction {
    pub order_id: String,
    pub proof_of_delivery: Option<String>,
}

#[async_trait]
impl CommandHandler for DeliverAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        // 1. Load and validate
        let mut order = ctx.load_order(&self.order_id)?;
        assert_transition(&order, OrderStatus::Delivered)?;

        // 2. Stamp the shipment if one exists
        if let Some(shipment) = order.shipment.as_mut() {
            shipment.status = ShipmentStatus::Delivered;
            shipment.delivered_at = Some(ctx.now);
            if self.proof_of_delivery.is_some() {
                shipment.proof_of_delivery = self.proof_of_delivery.clone();
            }
        }

        // 3. Transition
        order.status = OrderStatus::Delivered;
        order.delivered_at = Some(ctx.now);
        ctx.store_order(&mut order)?;

        tracing::info!(order_id = %order.order_id, "Order delivered");

        let event = DomainEvent::OrderDelivered {
            order_id: order.order_id.clone(),
        };
        Ok(ActionOutcome::with_event(order, event))
    }
}
