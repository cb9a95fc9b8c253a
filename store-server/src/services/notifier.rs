//! Domain event notification bus
//!
//! Fire-and-forget hooks for the excluded notification layer (email, push,
//! back-office feeds). Events are broadcast after the owning transaction
//! commits; delivery failures are logged and never propagated into the
//! workflow.

use serde::Serialize;
use tokio::sync::broadcast;

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Domain events emitted after committed workflow transitions
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    OrderCreated {
        order_id: String,
        order_number: String,
        user_id: String,
    },
    OrderPaid {
        order_id: String,
        txn_id: String,
    },
    OrderProcessing {
        order_id: String,
    },
    OrderShipped {
        order_id: String,
        courier: String,
    },
    OrderDelivered {
        order_id: String,
    },
    OrderCancelled {
        order_id: String,
        reason: String,
    },
    OrderRefunded {
        order_id: String,
        amount: f64,
    },
    PickupOtpIssued {
        order_id: String,
    },
    CreditIssued {
        code: String,
        user_id: String,
        amount: f64,
    },
    CreditApplied {
        code: String,
        order_id: String,
        amount: f64,
    },
    LowStock {
        sku_id: String,
        available: i64,
    },
}

/// Best-effort event broadcaster
#[derive(Clone)]
pub struct Notifier {
    event_tx: broadcast::Sender<DomainEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { event_tx }
    }

    /// Subscribe to event broadcasts
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    /// Publish one event (best-effort)
    pub fn publish(&self, event: DomainEvent) {
        tracing::debug!(event = ?event, "Publishing domain event");
        if self.event_tx.send(event).is_err() {
            tracing::debug!("Event broadcast skipped: no active receivers");
        }
    }

    /// Publish a batch of events (best-effort)
    pub fn publish_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.publish(DomainEvent::OrderDelivered {
            order_id: "order-1".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            DomainEvent::OrderDelivered {
                order_id: "order-1".to_string()
            }
        );
    }

    #[test]
    fn test_publish_without_receivers_is_noop() {
        let notifier = Notifier::new();
        // Must not panic or error
        notifier.publish(DomainEvent::LowStock {
            sku_id: "sku-1".to_string(),
            available: 0,
        });
    }
}
