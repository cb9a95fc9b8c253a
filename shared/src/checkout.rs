//! Checkout session and lock records
//!
//! A checkout session is a short-lived transactional context binding a user,
//! a cart snapshot, soft stock reservations and at most one credit-note
//! lock. TTL is a hard 30 minutes, evaluated lazily on access.

use serde::{Deserialize, Serialize};

/// 会话状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Expired,
}

/// Lock record status (stock and credit-note locks)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    #[default]
    Locked,
    Released,
}

/// Soft reservation of N units of a SKU for the lifetime of a session.
///
/// Not a hard decrement — the authoritative stock change happens on order
/// creation/allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLock {
    pub lock_id: String,
    pub sku_id: String,
    pub quantity: i32,
    pub status: LockStatus,
    /// Mirrors the owning session's expiry
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<i64>,
}

/// Mutual-exclusion record binding one credit-note code to at most one
/// active session. At most one row with status LOCKED per code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditNoteLock {
    pub lock_id: String,
    pub code: String,
    pub session_id: String,
    pub amount: f64,
    pub status: LockStatus,
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<i64>,
}

impl CreditNoteLock {
    /// A lock only excludes others while LOCKED and unexpired
    pub fn is_held(&self, now: i64) -> bool {
        self.status == LockStatus::Locked && now <= self.expires_at
    }
}

/// Ephemeral checkout session aggregate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub created_at: i64,
    /// created_at + 30 minutes
    pub expires_at: i64,
    /// Credit note applied to this session, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_note_code: Option<String>,
    #[serde(default)]
    pub credit_locked_amount: f64,
    #[serde(default)]
    pub stock_locks: Vec<StockLock>,
}

impl CheckoutSession {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry_boundary() {
        let session = CheckoutSession {
            session_id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            status: SessionStatus::Active,
            created_at: 0,
            expires_at: 1_800_000,
            credit_note_code: None,
            credit_locked_amount: 0.0,
            stock_locks: vec![],
        };

        assert!(!session.is_expired(1_800_000)); // exactly at expiry: still valid
        assert!(session.is_expired(1_800_001));
    }

    #[test]
    fn test_credit_lock_held_only_while_locked_and_unexpired() {
        let mut lock = CreditNoteLock {
            lock_id: "l-1".to_string(),
            code: "CN202608050001".to_string(),
            session_id: "s-1".to_string(),
            amount: 50.0,
            status: LockStatus::Locked,
            expires_at: 1000,
            released_at: None,
        };

        assert!(lock.is_held(999));
        assert!(!lock.is_held(1001)); // expired lock no longer excludes

        lock.status = LockStatus::Released;
        assert!(!lock.is_held(999));
    }
}
