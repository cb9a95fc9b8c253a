//! Store-credit instruments issued by trade-ins

use serde::{Deserialize, Serialize};

/// 抵扣券状态
///
/// Status must stay consistent with the remaining balance: zero remaining
/// implies FULLY_USED; full remaining allows ACTIVE/EXPIRED/CANCELLED only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditNoteStatus {
    #[default]
    Active,
    PartiallyUsed,
    FullyUsed,
    Expired,
    Cancelled,
}

/// Store-credit instrument. Immutable once FULLY_USED/CANCELLED/EXPIRED.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditNote {
    /// Customer-facing code, unique (`CN<YYYYMMDD><4 digits>`)
    pub code: String,
    pub user_id: String,
    /// Original amount
    pub amount: f64,
    /// 0 <= amount_remaining <= amount
    pub amount_remaining: f64,
    pub status: CreditNoteStatus,
    pub issued_at: i64,
    pub expires_at: i64,
    /// Order that (last) consumed this note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_by_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<i64>,
    /// Trade-in reference that produced this note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,
}

impl CreditNote {
    /// Redeemable = ACTIVE or PARTIALLY_USED and unexpired
    pub fn is_redeemable(&self, now: i64) -> bool {
        matches!(
            self.status,
            CreditNoteStatus::Active | CreditNoteStatus::PartiallyUsed
        ) && now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(status: CreditNoteStatus, expires_at: i64) -> CreditNote {
        CreditNote {
            code: "CN202608051234".to_string(),
            user_id: "u-1".to_string(),
            amount: 100.0,
            amount_remaining: 100.0,
            status,
            issued_at: 0,
            expires_at,
            consumed_by_order: None,
            redeemed_at: None,
            source_reference: None,
        }
    }

    #[test]
    fn test_redeemable() {
        assert!(note(CreditNoteStatus::Active, 1000).is_redeemable(999));
        assert!(note(CreditNoteStatus::PartiallyUsed, 1000).is_redeemable(999));
        assert!(!note(CreditNoteStatus::Active, 1000).is_redeemable(1000)); // expiry instant
        assert!(!note(CreditNoteStatus::FullyUsed, 1000).is_redeemable(999));
        assert!(!note(CreditNoteStatus::Cancelled, 1000).is_redeemable(999));
        assert!(!note(CreditNoteStatus::Expired, 1000).is_redeemable(999));
    }
}
