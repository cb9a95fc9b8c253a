//! Ship command handler
//!
//! PROCESSING → SHIPPED for delivery orders. The shipment moves to
//! IN_TRANSIT with courier and tracking details.

use async_trait::async_trait;

use shared::order::{FulfilmentMethod, ItemStatus, OrderStatus, ShipmentStatus};

use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{ActionOutcome, CommandContext, CommandHandler, OrderError, OrderResult};
use crate::services::notifier::DomainEvent;

/// Ship action
#[derive(Debug, Clone)]
pub struct ShipAction {
    pub order_id: String,
    pub courier: String,
    pub tracking_number: Option<String>,
}

#[async_trait]
impl CommandHandler for ShipAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        // 1. Load and validate
        let mut order = ctx.load_order(&self.order_id)?;
        if order.fulfilment != FulfilmentMethod::Delivery {
            return Err(OrderError::InvalidOrderState(format!(
                "order {} is a pickup order and cannot be shipped",
                order.order_number
            )));
        }
        assert_transition(&order, OrderStatus::Shipped)?;

        // 2. Shipment must have been prepared by StartProcessing
        let shipment = order.shipment.as_mut().ok_or_else(|| {
            OrderError::Internal(format!(
                "order {} has no shipment record",
                self.order_id
            ))
        })?;
        shipment.courier = Some(self.courier.clone());
        shipment.tracking_number = self.tracking_number.clone();
        shipment.status = ShipmentStatus::InTransit;

        // 3. Transition
        order.status = OrderStatus::Shipped;
        order.set_item_statuses(ItemStatus::Fulfilled);
        order.shipped_at = Some(ctx.now);
        ctx.store_order(&mut order)?;

        tracing::info!(
            order_id = %order.order_id,
            courier = %self.courier,
            tracking = ?self.tracking_number,
            "Order shipped"
        );

        let event = DomainEvent::OrderShipped {
            order_id: order.order_id.clone(),
            courier: self.courier.clone(),
        };
        Ok(ActionOutcome::with_event(order, event))
    }
}
