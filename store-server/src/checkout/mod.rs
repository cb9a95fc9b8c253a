//! Checkout session manager
//!
//! A session is the transactional context for one checkout attempt: it
//! binds the user, soft stock reservations for the cart, and at most one
//! credit-note lock. Sessions live 30 minutes; expiry is evaluated lazily
//! on access and releases everything the session holds.
//!
//! Ordering inside `complete_order` is structural: credit lock acquisition
//! happened at session creation, order creation and credit application run
//! in the same write transaction, and the session only flips to COMPLETED
//! once both succeeded.

use shared::checkout::{CheckoutSession, CreditNoteLock, LockStatus, SessionStatus, StockLock};
use shared::models::{Address, CartItem};
use shared::order::{FulfilmentMethod, Order};
use shared::util::{now_millis, MINUTE_MS};

use redb::WriteTransaction;

use crate::credit;
use crate::orders::actions::CreateOrderAction;
use crate::orders::storage::LedgerStorage;
use crate::orders::traits::{CommandContext, CommandHandler, OrderError, OrderResult};
use crate::services::notifier::{DomainEvent, Notifier};
use crate::stock;

/// Hard session TTL
pub const SESSION_TTL_MS: i64 = 30 * MINUTE_MS;

/// Everything `complete_order` needs besides the session itself.
///
/// Cart rows and the resolved address are collaborator state loaded by the
/// caller; stock and credit are re-validated here regardless.
#[derive(Debug, Clone)]
pub struct CompleteOrderRequest {
    pub fulfilment: FulfilmentMethod,
    pub shipping_address: Option<Address>,
    pub cart: Vec<CartItem>,
    pub note: Option<String>,
}

/// Checkout session orchestration over the ledger storage
#[derive(Clone)]
pub struct CheckoutManager {
    storage: LedgerStorage,
    notifier: Notifier,
}

impl CheckoutManager {
    pub fn new(storage: LedgerStorage, notifier: Notifier) -> Self {
        Self { storage, notifier }
    }

    /// Create a session, optionally locking a credit note.
    ///
    /// Credit validation and lock acquisition run in the same transaction
    /// that persists the session: a lock failure aborts everything, so a
    /// half-created session can never hold a lock.
    pub fn create(
        &self,
        user_id: &str,
        cart: &[CartItem],
        credit_code: Option<&str>,
        credit_amount: Option<f64>,
    ) -> OrderResult<CheckoutSession> {
        let now = now_millis();
        let session_id = uuid::Uuid::new_v4().to_string();
        let expires_at = now + SESSION_TTL_MS;

        let txn = self.storage.begin_write()?;

        // Credit note first: validate, then acquire the exclusive lock
        let (credit_note_code, credit_locked_amount) = match credit_code {
            Some(code) => {
                let requested = credit_amount.ok_or_else(|| {
                    OrderError::CreditNoteInvalid(
                        "credit amount is required when a credit note is supplied".to_string(),
                    )
                })?;
                let (_, applicable) =
                    credit::validate(&self.storage, &txn, code, user_id, requested, now)?;
                self.lock_credit_note(&txn, code, applicable, &session_id, now, expires_at)?;
                (Some(code.to_string()), applicable)
            }
            None => (None, 0.0),
        };

        // Soft stock reservations for the cart content; availability is
        // re-checked per SKU at lock time
        let mut stock_locks = Vec::with_capacity(cart.len());
        for row in cart {
            stock::check_available(&self.storage, &txn, &row.sku_id, i64::from(row.quantity))?;
            stock_locks.push(StockLock {
                lock_id: uuid::Uuid::new_v4().to_string(),
                sku_id: row.sku_id.clone(),
                quantity: row.quantity,
                status: LockStatus::Locked,
                expires_at,
                released_at: None,
            });
        }

        let session = CheckoutSession {
            session_id: session_id.clone(),
            user_id: user_id.to_string(),
            status: SessionStatus::Active,
            created_at: now,
            expires_at,
            credit_note_code,
            credit_locked_amount,
            stock_locks,
        };
        self.storage.store_session(&txn, &session)?;
        txn.commit().map_err(crate::orders::StorageError::from)?;

        tracing::info!(
            session_id = %session_id,
            user_id = %user_id,
            credit = ?session.credit_note_code,
            "Checkout session created"
        );
        Ok(session)
    }

    /// Acquire (or idempotently refresh) the exclusive lock on a credit
    /// note code.
    ///
    /// At most one non-expired LOCKED row exists per code; a held lock
    /// owned by another session rejects the request, a lock owned by the
    /// requesting session is updated in place.
    pub fn lock_credit_note(
        &self,
        txn: &WriteTransaction,
        code: &str,
        amount: f64,
        session_id: &str,
        now: i64,
        expires_at: i64,
    ) -> OrderResult<CreditNoteLock> {
        if let Some(existing) = self.storage.load_credit_lock(txn, code)?
            && existing.is_held(now)
            && existing.session_id != session_id
        {
            return Err(OrderError::CreditNoteInvalid(
                "credit note is locked by another session".to_string(),
            ));
        }

        let lock = CreditNoteLock {
            lock_id: uuid::Uuid::new_v4().to_string(),
            code: code.to_string(),
            session_id: session_id.to_string(),
            amount,
            status: LockStatus::Locked,
            expires_at,
            released_at: None,
        };
        self.storage.store_credit_lock(txn, &lock)?;
        Ok(lock)
    }

    /// Fetch a session, lazily expiring it on access.
    ///
    /// Accessing an ACTIVE session past its TTL flips it to EXPIRED,
    /// releases everything it holds, persists, and fails with
    /// `SessionExpired` — the caller must restart checkout.
    pub fn get(&self, session_id: &str) -> OrderResult<CheckoutSession> {
        let session = self
            .storage
            .get_session(session_id)?
            .ok_or_else(|| OrderError::SessionNotFound(session_id.to_string()))?;

        let now = now_millis();
        if session.status == SessionStatus::Active && session.is_expired(now) {
            let txn = self.storage.begin_write()?;
            if let Some(mut stale) = self.storage.load_session(&txn, session_id)? {
                stale.status = SessionStatus::Expired;
                self.release_locks(&txn, &mut stale, now)?;
                self.storage.store_session(&txn, &stale)?;
            }
            txn.commit().map_err(crate::orders::StorageError::from)?;
            tracing::info!(session_id = %session_id, "Checkout session expired on access");
            return Err(OrderError::SessionExpired(session_id.to_string()));
        }

        Ok(session)
    }

    /// Release all locks a session holds. Idempotent: releasing an
    /// already-released session is a no-op.
    pub fn release(&self, session_id: &str) -> OrderResult<CheckoutSession> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let mut session = self
            .storage
            .load_session(&txn, session_id)?
            .ok_or_else(|| OrderError::SessionNotFound(session_id.to_string()))?;

        self.release_locks(&txn, &mut session, now)?;
        self.storage.store_session(&txn, &session)?;
        txn.commit().map_err(crate::orders::StorageError::from)?;
        Ok(session)
    }

    /// Complete a session: create the order, apply the locked credit note,
    /// mark the session COMPLETED and release its locks — one write
    /// transaction, so an order-creation failure changes nothing.
    pub async fn complete_order(
        &self,
        session_id: &str,
        request: CompleteOrderRequest,
    ) -> OrderResult<Order> {
        let now = now_millis();
        // Counter runs in its own transaction, before the main one
        let order_number = {
            let count = self.storage.next_order_count()?;
            format!("ORD{}{}", shared::util::utc_date_compact(), 10_000 + count)
        };
        let order_id = uuid::Uuid::new_v4().to_string();

        let txn = self.storage.begin_write()?;
        let mut session = self
            .storage
            .load_session(&txn, session_id)?
            .ok_or_else(|| OrderError::SessionNotFound(session_id.to_string()))?;

        match session.status {
            SessionStatus::Active => {}
            SessionStatus::Completed => {
                return Err(OrderError::Duplicate(format!(
                    "session {} already completed",
                    session_id
                )))
            }
            SessionStatus::Expired => {
                return Err(OrderError::SessionExpired(session_id.to_string()))
            }
        }
        if session.is_expired(now) {
            // Persist the lazy expiry, then reject
            session.status = SessionStatus::Expired;
            self.release_locks(&txn, &mut session, now)?;
            self.storage.store_session(&txn, &session)?;
            txn.commit().map_err(crate::orders::StorageError::from)?;
            return Err(OrderError::SessionExpired(session_id.to_string()));
        }

        let ctx = CommandContext::new(&txn, &self.storage, now);
        let mut outcome = CreateOrderAction {
            order_id: order_id.clone(),
            order_number,
            user_id: session.user_id.clone(),
            fulfilment: request.fulfilment,
            shipping_address: request.shipping_address,
            cart: request.cart,
            note: request.note,
            credit_amount: session.credit_locked_amount,
        }
        .execute(&ctx)
        .await?;

        // Apply the locked credit against the new order
        if let Some(code) = session.credit_note_code.clone() {
            let applied = credit::apply(
                &self.storage,
                &txn,
                &code,
                &order_id,
                outcome.order.credit_note_amount,
                now,
            )?;
            outcome.events.push(DomainEvent::CreditApplied {
                code,
                order_id: order_id.clone(),
                amount: applied,
            });
        }

        session.status = SessionStatus::Completed;
        self.release_locks(&txn, &mut session, now)?;
        self.storage.store_session(&txn, &session)?;

        drop(ctx);
        txn.commit().map_err(crate::orders::StorageError::from)?;

        tracing::info!(
            session_id = %session_id,
            order_id = %outcome.order.order_id,
            order_number = %outcome.order.order_number,
            "Checkout completed"
        );

        self.notifier.publish_all(outcome.events);
        Ok(outcome.order)
    }

    /// Validate a credit note for the given user and amount.
    ///
    /// Runs in a write transaction because validation lazily expires
    /// over-due notes.
    pub fn validate_credit_note(
        &self,
        code: &str,
        user_id: &str,
        amount: f64,
    ) -> OrderResult<(shared::credit::CreditNote, f64)> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let result = credit::validate(&self.storage, &txn, code, user_id, amount, now);
        // Commit either way so a lazy expiry flip persists
        txn.commit().map_err(crate::orders::StorageError::from)?;
        result
    }

    /// Mark all stock locks RELEASED and release the credit lock, if this
    /// session still owns it.
    fn release_locks(
        &self,
        txn: &WriteTransaction,
        session: &mut CheckoutSession,
        now: i64,
    ) -> OrderResult<()> {
        for lock in &mut session.stock_locks {
            if lock.status == LockStatus::Locked {
                lock.status = LockStatus::Released;
                lock.released_at = Some(now);
            }
        }

        if let Some(code) = &session.credit_note_code
            && let Some(mut lock) = self.storage.load_credit_lock(txn, code)?
            && lock.session_id == session.session_id
            && lock.status == LockStatus::Locked
        {
            lock.status = LockStatus::Released;
            lock.released_at = Some(now);
            self.storage.store_credit_lock(txn, &lock)?;
        }
        Ok(())
    }
}
