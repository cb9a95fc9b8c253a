//! Order status state machine
//!
//! The single source of truth for legal status transitions. Every mutation
//! validates against this table before touching the aggregate; an illegal
//! transition fails with `InvalidOrderState` and leaves the order untouched.

use shared::order::{FulfilmentMethod, Order, OrderAction, OrderStatus};
use shared::util::HOUR_MS;

use super::traits::{OrderError, OrderResult};

/// 24-hour cancellation window after order creation
pub const CANCELLATION_WINDOW_MS: i64 = 24 * HOUR_MS;

/// Is `from -> to` a legal transition?
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match from {
        Pending => matches!(to, Paid | Cancelled),
        Paid => matches!(to, Processing | Cancelled),
        Processing => matches!(to, Shipped | Delivered | Cancelled),
        Shipped => matches!(to, Delivered | Cancelled),
        Delivered => matches!(to, Refunded),
        Cancelled => matches!(to, Refunded),
        Refunded => false,
    }
}

/// Validate a transition against the table
pub fn assert_transition(order: &Order, to: OrderStatus) -> OrderResult<()> {
    if can_transition(order.status, to) {
        Ok(())
    } else {
        Err(OrderError::InvalidOrderState(format!(
            "order {} cannot move from {:?} to {:?}",
            order.order_number, order.status, to
        )))
    }
}

/// Cancellation guard: never after DELIVERED/REFUNDED; PENDING orders may
/// always cancel, anything else only within the 24-hour window.
pub fn can_cancel(order: &Order, now: i64) -> bool {
    match order.status {
        OrderStatus::Delivered | OrderStatus::Refunded | OrderStatus::Cancelled => false,
        OrderStatus::Pending => true,
        _ => now - order.created_at <= CANCELLATION_WINDOW_MS,
    }
}

/// The orchestration operations legally callable next for this order.
///
/// Drives UIs without re-deriving the transition table elsewhere.
pub fn available_actions(order: &Order, now: i64) -> Vec<OrderAction> {
    use OrderStatus::*;
    let mut actions = Vec::new();

    match order.status {
        Pending => {}
        Paid => actions.push(OrderAction::StartProcessing),
        Processing => match order.fulfilment {
            FulfilmentMethod::Delivery => {
                actions.push(OrderAction::Ship);
                actions.push(OrderAction::Deliver);
            }
            FulfilmentMethod::Pickup => {
                actions.push(OrderAction::GeneratePickupOtp);
                actions.push(OrderAction::ProcessPickup);
            }
        },
        Shipped => actions.push(OrderAction::Deliver),
        Delivered | Cancelled => actions.push(OrderAction::Refund),
        Refunded => {}
    }

    if can_cancel(order, now) {
        actions.push(OrderAction::Cancel);
    }

    actions
}
