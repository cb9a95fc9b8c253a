//! StartProcessing command handler
//!
//! PAID → PROCESSING. Allocates reserved stock out of on-hand inventory
//! (items become FULFILLED — their units have physically left the shelf)
//! and prepares fulfilment: a PREPARING shipment for delivery orders, an
//! active pickup OTP for pickup orders.

use async_trait::async_trait;
use rand::Rng;

use shared::order::{
    FulfilmentMethod, ItemStatus, OrderStatus, OtpStatus, PickupOtp, Shipment, ShipmentStatus,
};
use shared::util::HOUR_MS;

use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{ActionOutcome, CommandContext, CommandHandler, OrderResult};
use crate::services::notifier::DomainEvent;
use crate::stock;

/// Pickup OTP validity
pub const OTP_VALIDITY_MS: i64 = 72 * HOUR_MS;

/// Mint a 6-digit pickup code
pub fn generate_otp_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// StartProcessing action
#[derive(Debug, Clone)]
pub struct StartProcessingAction {
    pub order_id: String,
}

#[async_trait]
impl CommandHandler for StartProcessingAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        // 1. Load and validate the transition
        let mut order = ctx.load_order(&self.order_id)?;
        assert_transition(&order, OrderStatus::Processing)?;

        // 2. Allocate: on-hand -= qty, reserved -= qty
        let mut events =
            stock::allocate_on_processing(ctx.storage(), ctx.txn(), &order.items, ctx.now)?;

        // 3. Prepare fulfilment
        match order.fulfilment {
            FulfilmentMethod::Delivery => {
                order.shipment = Some(Shipment {
                    courier: None,
                    tracking_number: None,
                    status: ShipmentStatus::Preparing,
                    delivered_at: None,
                    proof_of_delivery: None,
                });
            }
            FulfilmentMethod::Pickup => {
                order.pickup_otp = Some(PickupOtp {
                    code: generate_otp_code(),
                    status: OtpStatus::Active,
                    issued_at: ctx.now,
                    expires_at: ctx.now + OTP_VALIDITY_MS,
                    used_at: None,
                    used_by_staff: None,
                });
                events.push(DomainEvent::PickupOtpIssued {
                    order_id: order.order_id.clone(),
                });
            }
        }

        // 4. Transition
        order.status = OrderStatus::Processing;
        order.set_item_statuses(ItemStatus::Fulfilled);
        ctx.store_order(&mut order)?;

        tracing::info!(order_id = %order.order_id, "Order processing started");

        events.push(DomainEvent::OrderProcessing {
            order_id: order.order_id.clone(),
        });
        Ok(ActionOutcome {
            order,
            events,
        })
    }
}
