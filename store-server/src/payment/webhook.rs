//! Webhook reconciler
//!
//! Validates inbound gateway notifications and applies them to orders as
//! one atomic unit. Authenticity comes from the recomputed signature and
//! the merchant credentials; idempotency from the external transaction id
//! index; and every durable delivery additionally passes through the
//! [`envelope`](super::envelope) so redelivery and retries can never apply
//! an effect twice.

use std::collections::HashMap;

use shared::order::{ItemStatus, OrderStatus, PaymentOutcome, PaymentRecord, PaymentStatus};
use shared::util::now_millis;

use super::envelope::{self, Delivery};
use super::gateway::{verify_signature, GatewayConfig};
use crate::orders::actions::PaymentSuccessAction;
use crate::orders::money::money_eq;
use crate::orders::state_machine::assert_transition;
use crate::orders::storage::LedgerStorage;
use crate::orders::traits::{CommandContext, CommandHandler, OrderError, OrderResult};
use crate::services::notifier::{DomainEvent, Notifier};

/// Typed inbound notification, converted once at the boundary.
///
/// The raw field map is retained only for idempotency/audit storage.
#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub merchant_id: String,
    pub merchant_key: String,
    /// The order number the merchant attached to the payment request
    pub m_payment_id: String,
    /// The gateway's transaction id — globally unique per payment
    pub pf_payment_id: String,
    pub payment_status: PaymentOutcome,
    pub amount_gross: f64,
}

impl PaymentNotification {
    /// Validate required-field presence and types
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, String> {
        fn required<'a>(
            fields: &'a HashMap<String, String>,
            key: &str,
        ) -> Result<&'a str, String> {
            match fields.get(key).map(String::as_str) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(format!("missing required field: {}", key)),
            }
        }

        let payment_status = required(fields, "payment_status")?;
        let payment_status = PaymentOutcome::parse(payment_status)
            .ok_or_else(|| format!("unknown payment_status: {}", payment_status))?;
        let amount_gross = required(fields, "amount_gross")?
            .parse::<f64>()
            .map_err(|_| "amount_gross is not a number".to_string())?;

        Ok(Self {
            merchant_id: required(fields, "merchant_id")?.to_string(),
            merchant_key: required(fields, "merchant_key")?.to_string(),
            m_payment_id: required(fields, "m_payment_id")?.to_string(),
            pf_payment_id: required(fields, "pf_payment_id")?.to_string(),
            payment_status,
            amount_gross,
        })
    }
}

/// Outcome of processing one notification
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    /// The payment was applied and the order transitioned
    Applied { order_id: String, status: OrderStatus },
    /// This transaction id was already recorded — success-no-op
    AlreadyProcessed,
    /// Rejected business outcome (signature, credentials, amount, state)
    Rejected { reason: String },
}

impl NotifyOutcome {
    fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Should the endpoint answer 200?
    pub fn is_accepted(&self) -> bool {
        !matches!(self, NotifyOutcome::Rejected { .. })
    }
}

/// Applies gateway notifications to orders
#[derive(Clone)]
pub struct WebhookReconciler {
    storage: LedgerStorage,
    notifier: Notifier,
    gateway: GatewayConfig,
}

impl WebhookReconciler {
    pub fn new(storage: LedgerStorage, notifier: Notifier, gateway: GatewayConfig) -> Self {
        Self {
            storage,
            notifier,
            gateway,
        }
    }

    /// Process a durable delivery: envelope first, then the reconciliation.
    ///
    /// The envelope is keyed by the gateway transaction id, so redelivered
    /// notifications short-circuit without re-running the effect.
    pub async fn notify(&self, fields: HashMap<String, String>) -> OrderResult<NotifyOutcome> {
        let Some(event_id) = fields.get("pf_payment_id").cloned() else {
            return Ok(NotifyOutcome::rejected("missing required field: pf_payment_id"));
        };
        let raw_payload = serde_json::to_string(&fields).unwrap_or_default();
        let now = now_millis();

        let delivery = envelope::process_delivery(
            &self.storage,
            &event_id,
            "payment.notify",
            "gateway",
            &raw_payload,
            now,
            || self.process_notification(&fields),
        )
        .await?;

        Ok(match delivery {
            Delivery::Fresh(outcome) => outcome,
            Delivery::AlreadyProcessed => NotifyOutcome::AlreadyProcessed,
            Delivery::ConcurrentlyProcessing => {
                NotifyOutcome::rejected("a concurrent delivery of this event is in progress")
            }
            Delivery::RetriesExhausted => {
                NotifyOutcome::rejected("delivery retries exhausted; manual intervention required")
            }
        })
    }

    /// Re-run failed deliveries whose backoff has elapsed (admin sweep)
    pub async fn retry_sweep(&self) -> OrderResult<(usize, usize)> {
        envelope::retry_sweep(&self.storage, now_millis(), |event| async move {
            let fields: HashMap<String, String> =
                serde_json::from_str(&event.raw_payload).map_err(|e| {
                    OrderError::Internal(format!("corrupt webhook payload: {}", e))
                })?;
            self.process_notification(&fields).await
        })
        .await
    }

    /// The reconciliation itself: validation steps 1-7, then the payment
    /// application, all inside one write transaction.
    pub async fn process_notification(
        &self,
        fields: &HashMap<String, String>,
    ) -> OrderResult<NotifyOutcome> {
        // 1. Required-field presence and typed conversion
        let notification = match PaymentNotification::from_fields(fields) {
            Ok(n) => n,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Malformed payment notification");
                return Ok(NotifyOutcome::rejected(reason));
            }
        };

        // 2. Signature — the authenticity boundary against forged callbacks
        if !verify_signature(fields, &self.gateway.passphrase) {
            tracing::warn!(
                txn_id = %notification.pf_payment_id,
                "Payment notification signature mismatch"
            );
            return Ok(NotifyOutcome::rejected("signature mismatch"));
        }

        // 3. Sender credentials
        if notification.merchant_id != self.gateway.merchant_id
            || notification.merchant_key != self.gateway.merchant_key
        {
            tracing::warn!(
                merchant_id = %notification.merchant_id,
                "Payment notification merchant credentials mismatch"
            );
            return Ok(NotifyOutcome::rejected("merchant credentials mismatch"));
        }

        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let ctx = CommandContext::new(&txn, &self.storage, now);

        // 4. Idempotency: a recorded transaction id is a success-no-op
        if self
            .storage
            .payment_txn_order(&txn, &notification.pf_payment_id)?
            .is_some()
        {
            tracing::info!(
                txn_id = %notification.pf_payment_id,
                "Duplicate payment notification ignored"
            );
            return Ok(NotifyOutcome::AlreadyProcessed);
        }

        // 5. Resolve the order by its number
        let mut order = self
            .storage
            .load_order_by_number(&txn, &notification.m_payment_id)?
            .ok_or_else(|| OrderError::OrderNotFound(notification.m_payment_id.clone()))?;

        // 6. Amount must match the order total within tolerance. A mismatch
        //    is a recorded, rejected business outcome — not an exception.
        if !money_eq(notification.amount_gross, order.total) {
            order.payments.push(PaymentRecord {
                payment_id: uuid::Uuid::new_v4().to_string(),
                method: "GATEWAY".to_string(),
                amount: notification.amount_gross,
                currency: "ZAR".to_string(),
                status: PaymentStatus::Failed,
                txn_id: Some(notification.pf_payment_id.clone()),
                failure_reason: Some("amount mismatch".to_string()),
                processed_at: Some(now),
            });
            self.storage
                .index_payment_txn(&txn, &notification.pf_payment_id, &order.order_id)?;
            let order_id = order.order_id.clone();
            ctx.store_order(&mut order)?;
            drop(ctx);
            txn.commit().map_err(crate::orders::StorageError::from)?;

            tracing::warn!(
                order_id = %order_id,
                notified = notification.amount_gross,
                "Payment notification amount mismatch"
            );
            return Ok(NotifyOutcome::rejected("amount mismatch"));
        }

        // 7. Only pre-payment orders accept a payment outcome
        if order.status != OrderStatus::Pending {
            drop(ctx);
            return Ok(NotifyOutcome::rejected(format!(
                "order {} is not awaiting payment (status {:?})",
                order.order_number, order.status
            )));
        }

        // 8. Apply the reported outcome
        let outcome = match notification.payment_status {
            PaymentOutcome::Complete => {
                let outcome = PaymentSuccessAction {
                    order_id: order.order_id.clone(),
                    txn_id: notification.pf_payment_id.clone(),
                    amount: notification.amount_gross,
                    method: "GATEWAY".to_string(),
                    currency: "ZAR".to_string(),
                }
                .execute(&ctx)
                .await?;
                drop(ctx);
                txn.commit().map_err(crate::orders::StorageError::from)?;
                self.notifier.publish_all(outcome.events);
                NotifyOutcome::Applied {
                    order_id: outcome.order.order_id,
                    status: OrderStatus::Paid,
                }
            }
            PaymentOutcome::Failed | PaymentOutcome::Cancelled => {
                let failed = notification.payment_status == PaymentOutcome::Failed;
                assert_transition(&order, OrderStatus::Cancelled)?;
                // Give back the units reserved at order creation
                crate::stock::release_on_cancel(&self.storage, &txn, &order.items, now)?;
                order.payments.push(PaymentRecord {
                    payment_id: uuid::Uuid::new_v4().to_string(),
                    method: "GATEWAY".to_string(),
                    amount: notification.amount_gross,
                    currency: "ZAR".to_string(),
                    status: if failed {
                        PaymentStatus::Failed
                    } else {
                        PaymentStatus::Cancelled
                    },
                    txn_id: Some(notification.pf_payment_id.clone()),
                    failure_reason: failed.then(|| "gateway reported failure".to_string()),
                    processed_at: Some(now),
                });
                order.status = OrderStatus::Cancelled;
                order.set_item_statuses(ItemStatus::Cancelled);
                order.append_note(if failed {
                    "cancelled: payment failed"
                } else {
                    "cancelled: payment cancelled"
                });
                self.storage.index_payment_txn(
                    &txn,
                    &notification.pf_payment_id,
                    &order.order_id,
                )?;
                let order_id = order.order_id.clone();
                ctx.store_order(&mut order)?;
                drop(ctx);
                txn.commit().map_err(crate::orders::StorageError::from)?;
                self.notifier.publish(DomainEvent::OrderCancelled {
                    order_id: order_id.clone(),
                    reason: "payment not completed".to_string(),
                });
                NotifyOutcome::Applied {
                    order_id,
                    status: OrderStatus::Cancelled,
                }
            }
            PaymentOutcome::Pending => {
                order.payments.push(PaymentRecord {
                    payment_id: uuid::Uuid::new_v4().to_string(),
                    method: "GATEWAY".to_string(),
                    amount: notification.amount_gross,
                    currency: "ZAR".to_string(),
                    status: PaymentStatus::Pending,
                    txn_id: Some(notification.pf_payment_id.clone()),
                    failure_reason: None,
                    processed_at: Some(now),
                });
                self.storage.index_payment_txn(
                    &txn,
                    &notification.pf_payment_id,
                    &order.order_id,
                )?;
                let order_id = order.order_id.clone();
                ctx.store_order(&mut order)?;
                drop(ctx);
                txn.commit().map_err(crate::orders::StorageError::from)?;
                NotifyOutcome::Applied {
                    order_id,
                    status: OrderStatus::Pending,
                }
            }
        };

        Ok(outcome)
    }
}
