//! Pickup OTP command handlers
//!
//! Two operations for PICKUP orders in PROCESSING:
//! - [`GeneratePickupOtpAction`] mints (or idempotently returns) the
//!   6-digit collection code, valid 72 hours.
//! - [`ProcessPickupAction`] validates a presented code at the counter,
//!   marks it USED and drives the order to DELIVERED with an audit note
//!   naming the staff member.

use async_trait::async_trait;

use shared::order::{FulfilmentMethod, OrderStatus, OtpStatus, PickupOtp};

use crate::orders::actions::start_processing::{generate_otp_code, OTP_VALIDITY_MS};
use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{ActionOutcome, CommandContext, CommandHandler, OrderError, OrderResult};
use crate::services::notifier::DomainEvent;

/// GeneratePickupOtp action
#[derive(Debug, Clone)]
pub struct GeneratePickupOtpAction {
    pub order_id: String,
}

#[async_trait]
impl CommandHandler for GeneratePickupOtpAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        // 1. Load and validate: pickup orders awaiting collection only
        let mut order = ctx.load_order(&self.order_id)?;
        if order.fulfilment != FulfilmentMethod::Pickup {
            return Err(OrderError::InvalidOrderState(format!(
                "order {} is not a pickup order",
                order.order_number
            )));
        }
        if order.status != OrderStatus::Processing {
            return Err(OrderError::InvalidOrderState(format!(
                "order {} is not awaiting pickup (status {:?})",
                order.order_number, order.status
            )));
        }

        // 2. An existing unexpired ACTIVE code is returned as-is
        if let Some(otp) = order.pickup_otp.as_ref()
            && otp.status == OtpStatus::Active
            && !otp.is_expired(ctx.now)
        {
            return Ok(ActionOutcome::new(order));
        }

        // 3. Expire the stale code, if any, and mint a fresh one
        if let Some(otp) = order.pickup_otp.as_mut()
            && otp.status == OtpStatus::Active
        {
            otp.status = OtpStatus::Expired;
        }
        order.pickup_otp = Some(PickupOtp {
            code: generate_otp_code(),
            status: OtpStatus::Active,
            issued_at: ctx.now,
            expires_at: ctx.now + OTP_VALIDITY_MS,
            used_at: None,
            used_by_staff: None,
        });
        ctx.store_order(&mut order)?;

        tracing::info!(order_id = %order.order_id, "Pickup OTP issued");

        let event = DomainEvent::PickupOtpIssued {
            order_id: order.order_id.clone(),
        };
        Ok(ActionOutcome::with_event(order, event))
    }
}

/// ProcessPickup action
#[derive(Debug, Clone)]
pub struct ProcessPickupAction {
    pub order_id: String,
    pub otp_code: String,
    pub staff_id: String,
}

#[async_trait]
impl CommandHandler for ProcessPickupAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        // 1. Load and validate the transition up front: the order must be
        //    able to reach DELIVERED before we touch the OTP
        let mut order = ctx.load_order(&self.order_id)?;
        if order.fulfilment != FulfilmentMethod::Pickup {
            return Err(OrderError::InvalidOrderState(format!(
                "order {} is not a pickup order",
                order.order_number
            )));
        }
        assert_transition(&order, OrderStatus::Delivered)?;

        let staff_id = self.staff_id.clone();
        let now = ctx.now;

        // 2. Validate the presented code
        let otp = order.pickup_otp.as_mut().ok_or_else(|| {
            OrderError::InvalidOrderState(format!(
                "order {} has no pickup code issued",
                self.order_id
            ))
        })?;
        if otp.status != OtpStatus::Active {
            return Err(OrderError::InvalidOrderState(format!(
                "pickup code for order {} is not active (status {:?})",
                self.order_id, otp.status
            )));
        }
        if otp.is_expired(now) {
            // Lazy expiry: persist the flip, then reject
            otp.status = OtpStatus::Expired;
            ctx.store_order(&mut order)?;
            return Err(OrderError::InvalidOrderState(format!(
                "pickup code for order {} has expired",
                self.order_id
            )));
        }
        if otp.code != self.otp_code {
            return Err(OrderError::InvalidOrderState(
                "pickup code does not match".to_string(),
            ));
        }

        // 3. Mark USED and hand over
        otp.status = OtpStatus::Used;
        otp.used_at = Some(now);
        otp.used_by_staff = Some(staff_id.clone());

        order.status = OrderStatus::Delivered;
        order.delivered_at = Some(now);
        order.append_note(format!("picked up, verified by staff {}", staff_id));
        ctx.store_order(&mut order)?;

        tracing::info!(
            order_id = %order.order_id,
            staff_id = %staff_id,
            "Pickup completed"
        );

        let event = DomainEvent::OrderDelivered {
            order_id: order.order_id.clone(),
        };
        Ok(ActionOutcome::with_event(order, event))
    }
}
