//! redb-based storage layer for the order/checkout core
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order aggregates |
//! | `order_numbers` | `order_number` | `order_id` | Uniqueness index |
//! | `payment_txns` | `txn_id` | `order_id` | Webhook/payment idempotency |
//! | `skus` | `sku_id` | `Sku` | Stock ledger |
//! | `credit_notes` | `code` | `CreditNote` | Credit ledger |
//! | `credit_note_locks` | `code` | `CreditNoteLock` | 一码一锁（互斥） |
//! | `checkout_sessions` | `session_id` | `CheckoutSession` | Session manager |
//! | `webhook_events` | `event_id` | `WebhookEvent` | Delivery envelope |
//! | `counters` | name | `u64` | Order number sequence |
//!
//! # Isolation
//!
//! redb admits a single write transaction at a time; every multi-step
//! mutation in the engine runs inside one such transaction, which makes the
//! read-then-conditionally-write steps (stock check, credit-note lock check,
//! idempotency lookup) atomic with their writes. Reads run on concurrent
//! snapshot read transactions.
//!
//! Write transactions must never nest — anything that needs its own
//! transaction (e.g. order-number pre-generation) happens before the main
//! transaction begins.

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use shared::checkout::{CheckoutSession, CreditNoteLock};
use shared::credit::CreditNote;
use shared::order::Order;
use shared::stock::Sku;
use shared::webhook::WebhookEvent;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Order aggregates: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Order-number uniqueness index: key = order_number, value = order_id
const ORDER_NUMBERS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("order_numbers");

/// External payment transaction index: key = txn_id, value = order_id
const PAYMENT_TXNS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("payment_txns");

/// Stock ledger: key = sku_id, value = JSON-serialized Sku
const SKUS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("skus");

/// Credit ledger: key = code, value = JSON-serialized CreditNote
const CREDIT_NOTES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("credit_notes");

/// Credit-note locks: key = code, value = JSON-serialized CreditNoteLock
/// 表按 code 建键，"每码至多一把锁" 由结构保证
const CREDIT_LOCKS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("credit_note_locks");

/// Checkout sessions: key = session_id, value = JSON-serialized CheckoutSession
const SESSIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("checkout_sessions");

/// Webhook delivery records: key = event_id, value = JSON-serialized WebhookEvent
const WEBHOOK_EVENTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("webhook_events");

/// Counters: key = counter name, value = u64
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const ORDER_COUNT_KEY: &str = "order_count";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("SKU not found: {0}")]
    SkuNotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Core ledger storage backed by redb
#[derive(Clone)]
pub struct LedgerStorage {
    db: Arc<Database>,
}

impl LedgerStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits are durable as soon as `commit()` returns (copy-on-write
    /// with atomic pointer swap), so a crash never leaves the ledger in a
    /// half-written state.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_NUMBERS_TABLE)?;
            let _ = write_txn.open_table(PAYMENT_TXNS_TABLE)?;
            let _ = write_txn.open_table(SKUS_TABLE)?;
            let _ = write_txn.open_table(CREDIT_NOTES_TABLE)?;
            let _ = write_txn.open_table(CREDIT_LOCKS_TABLE)?;
            let _ = write_txn.open_table(SESSIONS_TABLE)?;
            let _ = write_txn.open_table(WEBHOOK_EVENTS_TABLE)?;

            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            if counters.get(ORDER_COUNT_KEY)?.is_none() {
                counters.insert(ORDER_COUNT_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Generic JSON helpers ==========

    fn put_json<T: serde::Serialize>(
        txn: &WriteTransaction,
        table: TableDefinition<&str, &[u8]>,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let mut t = txn.open_table(table)?;
        t.insert(key, bytes.as_slice())?;
        Ok(())
    }

    fn get_json_txn<T: serde::de::DeserializeOwned>(
        txn: &WriteTransaction,
        table: TableDefinition<&str, &[u8]>,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let t = txn.open_table(table)?;
        match t.get(key)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn get_json_read<T: serde::de::DeserializeOwned>(
        &self,
        table: TableDefinition<&str, &[u8]>,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(table)?;
        match t.get(key)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn scan_json_read<T: serde::de::DeserializeOwned>(
        &self,
        table: TableDefinition<&str, &[u8]>,
    ) -> StorageResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(table)?;
        let mut out = Vec::new();
        for entry in t.iter()? {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    // ========== Order Operations ==========

    /// Persist an order and maintain the order-number index
    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        Self::put_json(txn, ORDERS_TABLE, &order.order_id, order)?;
        let mut numbers = txn.open_table(ORDER_NUMBERS_TABLE)?;
        numbers.insert(order.order_number.as_str(), order.order_id.as_str())?;
        Ok(())
    }

    /// Load an order inside a write transaction, failing if absent
    pub fn load_order(&self, txn: &WriteTransaction, order_id: &str) -> StorageResult<Order> {
        Self::get_json_txn(txn, ORDERS_TABLE, order_id)?
            .ok_or_else(|| StorageError::OrderNotFound(order_id.to_string()))
    }

    pub fn try_load_order(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        Self::get_json_txn(txn, ORDERS_TABLE, order_id)
    }

    /// Snapshot read of an order
    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        self.get_json_read(ORDERS_TABLE, order_id)
    }

    pub fn order_number_exists(
        &self,
        txn: &WriteTransaction,
        order_number: &str,
    ) -> StorageResult<bool> {
        let numbers = txn.open_table(ORDER_NUMBERS_TABLE)?;
        Ok(numbers.get(order_number)?.is_some())
    }

    /// Resolve an order by its human-readable number, inside a write txn
    pub fn load_order_by_number(
        &self,
        txn: &WriteTransaction,
        order_number: &str,
    ) -> StorageResult<Option<Order>> {
        let order_id = {
            let numbers = txn.open_table(ORDER_NUMBERS_TABLE)?;
            numbers.get(order_number)?.map(|g| g.value().to_string())
        };
        match order_id {
            Some(id) => Self::get_json_txn(txn, ORDERS_TABLE, &id),
            None => Ok(None),
        }
    }

    /// Snapshot read of an order by number
    pub fn get_order_by_number(&self, order_number: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let numbers = read_txn.open_table(ORDER_NUMBERS_TABLE)?;
        let order_id = match numbers.get(order_number)? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        match orders.get(order_id.as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// All orders belonging to a user, newest first
    pub fn list_orders_for_user(&self, user_id: &str) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .scan_json_read::<Order>(ORDERS_TABLE)?
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        Ok(orders)
    }

    // ========== Payment Transaction Index ==========

    /// Which order (if any) has already recorded this external txn id?
    pub fn payment_txn_order(
        &self,
        txn: &WriteTransaction,
        txn_id: &str,
    ) -> StorageResult<Option<String>> {
        let t = txn.open_table(PAYMENT_TXNS_TABLE)?;
        Ok(t.get(txn_id)?.map(|g| g.value().to_string()))
    }

    pub fn index_payment_txn(
        &self,
        txn: &WriteTransaction,
        txn_id: &str,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut t = txn.open_table(PAYMENT_TXNS_TABLE)?;
        t.insert(txn_id, order_id)?;
        Ok(())
    }

    // ========== SKU Operations ==========

    pub fn store_sku(&self, txn: &WriteTransaction, sku: &Sku) -> StorageResult<()> {
        Self::put_json(txn, SKUS_TABLE, &sku.sku_id, sku)
    }

    /// Load a SKU inside a write transaction, failing if absent
    pub fn load_sku(&self, txn: &WriteTransaction, sku_id: &str) -> StorageResult<Sku> {
        Self::get_json_txn(txn, SKUS_TABLE, sku_id)?
            .ok_or_else(|| StorageError::SkuNotFound(sku_id.to_string()))
    }

    pub fn try_load_sku(
        &self,
        txn: &WriteTransaction,
        sku_id: &str,
    ) -> StorageResult<Option<Sku>> {
        Self::get_json_txn(txn, SKUS_TABLE, sku_id)
    }

    pub fn get_sku(&self, sku_id: &str) -> StorageResult<Option<Sku>> {
        self.get_json_read(SKUS_TABLE, sku_id)
    }

    pub fn list_skus(&self) -> StorageResult<Vec<Sku>> {
        self.scan_json_read(SKUS_TABLE)
    }

    // ========== Credit Note Operations ==========

    pub fn store_credit_note(
        &self,
        txn: &WriteTransaction,
        note: &CreditNote,
    ) -> StorageResult<()> {
        Self::put_json(txn, CREDIT_NOTES_TABLE, &note.code, note)
    }

    pub fn load_credit_note(
        &self,
        txn: &WriteTransaction,
        code: &str,
    ) -> StorageResult<Option<CreditNote>> {
        Self::get_json_txn(txn, CREDIT_NOTES_TABLE, code)
    }

    pub fn get_credit_note(&self, code: &str) -> StorageResult<Option<CreditNote>> {
        self.get_json_read(CREDIT_NOTES_TABLE, code)
    }

    /// All credit notes, inside a write transaction (expiry sweep)
    pub fn all_credit_notes(&self, txn: &WriteTransaction) -> StorageResult<Vec<CreditNote>> {
        let t = txn.open_table(CREDIT_NOTES_TABLE)?;
        let mut out = Vec::new();
        for entry in t.iter()? {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    // ========== Credit Note Lock Operations ==========

    pub fn store_credit_lock(
        &self,
        txn: &WriteTransaction,
        lock: &CreditNoteLock,
    ) -> StorageResult<()> {
        Self::put_json(txn, CREDIT_LOCKS_TABLE, &lock.code, lock)
    }

    pub fn load_credit_lock(
        &self,
        txn: &WriteTransaction,
        code: &str,
    ) -> StorageResult<Option<CreditNoteLock>> {
        Self::get_json_txn(txn, CREDIT_LOCKS_TABLE, code)
    }

    pub fn get_credit_lock(&self, code: &str) -> StorageResult<Option<CreditNoteLock>> {
        self.get_json_read(CREDIT_LOCKS_TABLE, code)
    }

    // ========== Checkout Session Operations ==========

    pub fn store_session(
        &self,
        txn: &WriteTransaction,
        session: &CheckoutSession,
    ) -> StorageResult<()> {
        Self::put_json(txn, SESSIONS_TABLE, &session.session_id, session)
    }

    pub fn load_session(
        &self,
        txn: &WriteTransaction,
        session_id: &str,
    ) -> StorageResult<Option<CheckoutSession>> {
        Self::get_json_txn(txn, SESSIONS_TABLE, session_id)
    }

    pub fn get_session(&self, session_id: &str) -> StorageResult<Option<CheckoutSession>> {
        self.get_json_read(SESSIONS_TABLE, session_id)
    }

    // ========== Webhook Event Operations ==========

    pub fn store_webhook_event(
        &self,
        txn: &WriteTransaction,
        event: &WebhookEvent,
    ) -> StorageResult<()> {
        Self::put_json(txn, WEBHOOK_EVENTS_TABLE, &event.event_id, event)
    }

    pub fn load_webhook_event(
        &self,
        txn: &WriteTransaction,
        event_id: &str,
    ) -> StorageResult<Option<WebhookEvent>> {
        Self::get_json_txn(txn, WEBHOOK_EVENTS_TABLE, event_id)
    }

    pub fn get_webhook_event(&self, event_id: &str) -> StorageResult<Option<WebhookEvent>> {
        self.get_json_read(WEBHOOK_EVENTS_TABLE, event_id)
    }

    /// FAILED deliveries whose backoff has elapsed and retries remain
    pub fn due_webhook_retries(&self, now: i64) -> StorageResult<Vec<WebhookEvent>> {
        Ok(self
            .scan_json_read::<WebhookEvent>(WEBHOOK_EVENTS_TABLE)?
            .into_iter()
            .filter(|e| e.is_retry_due(now))
            .collect())
    }

    // ========== Counter Operations ==========

    /// Increment and return the order counter (own transaction).
    ///
    /// Must be called BEFORE the caller's write transaction — redb does not
    /// allow nested write transactions.
    pub fn next_order_count(&self) -> StorageResult<u64> {
        let write_txn = self.db.begin_write()?;
        let next = {
            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            let current = counters
                .get(ORDER_COUNT_KEY)?
                .map(|g| g.value())
                .unwrap_or(0);
            let next = current + 1;
            counters.insert(ORDER_COUNT_KEY, next)?;
            next
        };
        write_txn.commit()?;
        Ok(next)
    }
}
