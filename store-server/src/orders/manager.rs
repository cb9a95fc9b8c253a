//! OrderManager - workflow orchestration over the ledger storage
//!
//! Every operation is one redb write transaction: load, validate against
//! the state machine, mutate, commit, then broadcast domain events. Because
//! callers read the aggregate before deciding to mutate it, each run is
//! guarded by an optimistic version check: the version observed at entry
//! must still be current inside the write transaction, otherwise the
//! operation retries against fresh state (bounded, jittered) before
//! surfacing `ConcurrencyConflict`.
//!
//! # Operation Flow
//!
//! ```text
//! run(order_id, action)
//!     ├─ 1. Snapshot-read the order, remember its version
//!     ├─ 2. Begin write transaction
//!     ├─ 3. Re-load inside the transaction, compare versions
//!     │      └─ mismatch → backoff, retry from 1 (max 3 attempts)
//!     ├─ 4. Execute the action (validate + mutate)
//!     ├─ 5. Commit
//!     └─ 6. Broadcast events
//! ```

use rand::Rng;
use shared::order::{Order, OrderAction};
use shared::util::{now_millis, utc_date_compact};

use super::actions::{
    CancelAction, DeliverAction, GeneratePickupOtpAction, PaymentSuccessAction,
    ProcessPickupAction, RefundAction, ShipAction, StartProcessingAction,
};
use super::state_machine::available_actions;
use super::storage::LedgerStorage;
use super::traits::{CommandContext, CommandHandler, OrderError, OrderResult};
use crate::services::notifier::Notifier;

/// Attempts before a version conflict surfaces as `ConcurrencyConflict`
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base backoff between retry attempts (jittered up to 2x)
const RETRY_BACKOFF_MS: u64 = 10;

/// Workflow orchestrator for order lifecycle operations
#[derive(Clone)]
pub struct OrderManager {
    storage: LedgerStorage,
    notifier: Notifier,
}

impl OrderManager {
    pub fn new(storage: LedgerStorage, notifier: Notifier) -> Self {
        Self { storage, notifier }
    }

    pub fn storage(&self) -> &LedgerStorage {
        &self.storage
    }

    /// Next order number: `ORD<YYYYMMDD><10000+seq>` (crash-safe via redb).
    ///
    /// Allocated from a dedicated counter in its own transaction — call
    /// BEFORE beginning the main write transaction.
    pub fn next_order_number(&self) -> OrderResult<String> {
        let count = self.storage.next_order_count()?;
        Ok(format!("ORD{}{}", utc_date_compact(), 10_000 + count))
    }

    // ========== Workflow Operations ==========

    /// PENDING → PAID; items CONFIRMED; stock reserved. Idempotent on txn id.
    pub async fn process_payment_success(
        &self,
        order_id: &str,
        txn_id: &str,
        amount: f64,
        method: &str,
        currency: &str,
    ) -> OrderResult<Order> {
        self.run(
            Some(order_id),
            &PaymentSuccessAction {
                order_id: order_id.to_string(),
                txn_id: txn_id.to_string(),
                amount,
                method: method.to_string(),
                currency: currency.to_string(),
            },
        )
        .await
    }

    /// PAID → PROCESSING; stock allocated; shipment or pickup OTP prepared.
    pub async fn start_processing(&self, order_id: &str) -> OrderResult<Order> {
        self.run(
            Some(order_id),
            &StartProcessingAction {
                order_id: order_id.to_string(),
            },
        )
        .await
    }

    /// PROCESSING → SHIPPED; shipment IN_TRANSIT.
    pub async fn ship(
        &self,
        order_id: &str,
        courier: &str,
        tracking_number: Option<String>,
    ) -> OrderResult<Order> {
        self.run(
            Some(order_id),
            &ShipAction {
                order_id: order_id.to_string(),
                courier: courier.to_string(),
                tracking_number,
            },
        )
        .await
    }

    /// SHIPPED|PROCESSING → DELIVERED.
    pub async fn deliver(
        &self,
        order_id: &str,
        proof_of_delivery: Option<String>,
    ) -> OrderResult<Order> {
        self.run(
            Some(order_id),
            &DeliverAction {
                order_id: order_id.to_string(),
                proof_of_delivery,
            },
        )
        .await
    }

    /// Cancel with stock release, guarded by the cancellation window.
    pub async fn cancel(&self, order_id: &str, reason: &str) -> OrderResult<Order> {
        self.run(
            Some(order_id),
            &CancelAction {
                order_id: order_id.to_string(),
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// DELIVERED|CANCELLED → REFUNDED with a negative payment record.
    pub async fn refund(&self, order_id: &str, amount: f64, reason: &str) -> OrderResult<Order> {
        self.run(
            Some(order_id),
            &RefundAction {
                order_id: order_id.to_string(),
                amount,
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// Return (or mint) the active pickup OTP for a PROCESSING pickup order.
    pub async fn generate_pickup_otp(&self, order_id: &str) -> OrderResult<Order> {
        self.run(
            Some(order_id),
            &GeneratePickupOtpAction {
                order_id: order_id.to_string(),
            },
        )
        .await
    }

    /// Validate a presented pickup code and hand the order over.
    pub async fn process_pickup(
        &self,
        order_id: &str,
        otp_code: &str,
        staff_id: &str,
    ) -> OrderResult<Order> {
        self.run(
            Some(order_id),
            &ProcessPickupAction {
                order_id: order_id.to_string(),
                otp_code: otp_code.to_string(),
                staff_id: staff_id.to_string(),
            },
        )
        .await
    }

    // ========== Queries ==========

    /// Orchestration operations legally callable next (pure query)
    pub fn available_actions(&self, order_id: &str) -> OrderResult<Vec<OrderAction>> {
        let order = self.get_order(order_id)?;
        Ok(available_actions(&order, now_millis()))
    }

    pub fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
    }

    pub fn get_order_by_number(&self, order_number: &str) -> OrderResult<Order> {
        self.storage
            .get_order_by_number(order_number)?
            .ok_or_else(|| OrderError::OrderNotFound(order_number.to_string()))
    }

    pub fn list_orders(&self, user_id: &str) -> OrderResult<Vec<Order>> {
        Ok(self.storage.list_orders_for_user(user_id)?)
    }

    // ========== Execution ==========

    /// Run one action as one write transaction with optimistic retry.
    ///
    /// `order_id` is the aggregate whose version is checked; pass `None`
    /// for actions that create the aggregate.
    pub(crate) async fn run(
        &self,
        order_id: Option<&str>,
        action: &dyn CommandHandler,
    ) -> OrderResult<Order> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_run(order_id, action).await {
                Err(OrderError::ConcurrencyConflict(id)) if attempt < MAX_RETRY_ATTEMPTS => {
                    let jitter = rand::thread_rng().gen_range(0..=RETRY_BACKOFF_MS);
                    tracing::debug!(
                        order_id = %id,
                        attempt,
                        "Version conflict, retrying against fresh state"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(
                        RETRY_BACKOFF_MS * u64::from(attempt) + jitter,
                    ))
                    .await;
                }
                other => return other,
            }
        }
    }

    async fn try_run(
        &self,
        order_id: Option<&str>,
        action: &dyn CommandHandler,
    ) -> OrderResult<Order> {
        // Version observed before entering the write transaction
        let expected_version = match order_id {
            Some(id) => self.storage.get_order(id)?.map(|o| o.version),
            None => None,
        };

        let txn = self.storage.begin_write()?;
        let ctx = CommandContext::new(&txn, &self.storage, now_millis());

        // A writer that committed between our snapshot read and this
        // transaction invalidates whatever the caller decided; retry on
        // fresh state rather than clobbering.
        if let (Some(id), Some(expected)) = (order_id, expected_version) {
            let current = self.storage.try_load_order(&txn, id)?.map(|o| o.version);
            if current != Some(expected) {
                return Err(OrderError::ConcurrencyConflict(id.to_string()));
            }
        }

        let outcome = action.execute(&ctx).await?;
        drop(ctx);
        txn.commit().map_err(super::storage::StorageError::from)?;

        self.notifier.publish_all(outcome.events);
        Ok(outcome.order)
    }
}
