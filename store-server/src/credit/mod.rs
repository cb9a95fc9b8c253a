//! Credit note ledger
//!
//! Balance and lifecycle of store-credit instruments issued by trade-ins.
//! All mutations run inside the caller's write transaction; a note is
//! immutable once FULLY_USED, CANCELLED or EXPIRED.

use rand::Rng;
use redb::WriteTransaction;
use shared::credit::{CreditNote, CreditNoteStatus};
use shared::util::utc_date_compact;

use crate::orders::money::{to_decimal, to_f64, MONEY_TOLERANCE};
use crate::orders::storage::LedgerStorage;
use crate::orders::traits::{OrderError, OrderResult};

/// Attempts at generating an unused code before giving up
const CODE_GENERATION_ATTEMPTS: usize = 10;

fn invalid(message: impl Into<String>) -> OrderError {
    OrderError::CreditNoteInvalid(message.into())
}

/// Validate a credit note for redemption by `user_id`.
///
/// Expiry is evaluated lazily: an over-due ACTIVE/PARTIALLY_USED note is
/// flipped to EXPIRED and persisted before the rejection is returned.
/// Returns the note and the applicable amount (= `requested`, which
/// validation guarantees is covered by the remaining balance).
pub fn validate(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    code: &str,
    user_id: &str,
    requested: f64,
    now: i64,
) -> OrderResult<(CreditNote, f64)> {
    let mut note = storage
        .load_credit_note(txn, code)?
        .ok_or_else(|| invalid(format!("credit note {} not found", code)))?;

    if note.user_id != user_id {
        return Err(invalid("credit note does not belong to this user"));
    }

    // Lazy expiry
    if matches!(
        note.status,
        CreditNoteStatus::Active | CreditNoteStatus::PartiallyUsed
    ) && now >= note.expires_at
    {
        note.status = CreditNoteStatus::Expired;
        storage.store_credit_note(txn, &note)?;
        return Err(invalid(format!("credit note {} has expired", code)));
    }

    match note.status {
        CreditNoteStatus::Active | CreditNoteStatus::PartiallyUsed => {}
        CreditNoteStatus::FullyUsed => {
            return Err(invalid(format!("credit note {} is fully used", code)))
        }
        CreditNoteStatus::Expired => {
            return Err(invalid(format!("credit note {} has expired", code)))
        }
        CreditNoteStatus::Cancelled => {
            return Err(invalid(format!("credit note {} was cancelled", code)))
        }
    }

    if requested <= 0.0 || !requested.is_finite() {
        return Err(invalid("requested amount must be positive"));
    }
    if to_decimal(requested) > to_decimal(note.amount_remaining) + MONEY_TOLERANCE {
        return Err(invalid("requested amount exceeds available balance"));
    }

    Ok((note, requested))
}

/// Apply a credit note against an order.
///
/// Deducts `min(amount, amount_remaining)` — after validation has rejected
/// over-balance requests, a shrunken balance is honoured rather than
/// errored. Updates status per the remaining-balance invariant and records
/// the consuming order. Returns the amount actually deducted.
pub fn apply(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    code: &str,
    order_id: &str,
    amount: f64,
    now: i64,
) -> OrderResult<f64> {
    let mut note = storage
        .load_credit_note(txn, code)?
        .ok_or_else(|| invalid(format!("credit note {} not found", code)))?;

    if !note.is_redeemable(now) {
        return Err(invalid(format!(
            "credit note {} is not redeemable (status {:?})",
            code, note.status
        )));
    }

    let remaining = to_decimal(note.amount_remaining);
    let deducted = to_decimal(amount).max(rust_decimal::Decimal::ZERO).min(remaining);
    let new_remaining = remaining - deducted;

    note.amount_remaining = to_f64(new_remaining);
    note.status = if new_remaining <= MONEY_TOLERANCE {
        note.amount_remaining = 0.0;
        CreditNoteStatus::FullyUsed
    } else {
        CreditNoteStatus::PartiallyUsed
    };
    note.consumed_by_order = Some(order_id.to_string());
    note.redeemed_at = Some(now);
    storage.store_credit_note(txn, &note)?;

    tracing::info!(
        code = %code,
        order_id = %order_id,
        deducted = to_f64(deducted),
        remaining = note.amount_remaining,
        "Credit note applied"
    );

    Ok(to_f64(deducted))
}

/// Cancel a credit note. Fails if already fully used.
pub fn cancel(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    code: &str,
    reason: &str,
) -> OrderResult<CreditNote> {
    let mut note = storage
        .load_credit_note(txn, code)?
        .ok_or_else(|| invalid(format!("credit note {} not found", code)))?;

    if note.status == CreditNoteStatus::FullyUsed {
        return Err(invalid(format!(
            "credit note {} is fully used and cannot be cancelled",
            code
        )));
    }

    note.amount_remaining = 0.0;
    note.status = CreditNoteStatus::Cancelled;
    storage.store_credit_note(txn, &note)?;

    tracing::info!(code = %code, reason = %reason, "Credit note cancelled");
    Ok(note)
}

/// Batch-expire all redeemable notes past their expiry. Returns the count.
pub fn expire_sweep(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    now: i64,
) -> OrderResult<usize> {
    let notes = storage.all_credit_notes(txn)?;
    let mut expired = 0;
    for mut note in notes {
        if matches!(
            note.status,
            CreditNoteStatus::Active | CreditNoteStatus::PartiallyUsed
        ) && now >= note.expires_at
        {
            note.status = CreditNoteStatus::Expired;
            storage.store_credit_note(txn, &note)?;
            expired += 1;
        }
    }
    if expired > 0 {
        tracing::info!(expired, "Credit note expiry sweep completed");
    }
    Ok(expired)
}

/// Issue a new credit note (trade-in acceptance entry point).
///
/// Code format: `CN<YYYYMMDD><4 random digits>`, regenerated on collision.
pub fn issue(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    user_id: &str,
    amount: f64,
    validity_ms: i64,
    source_reference: Option<String>,
    now: i64,
) -> OrderResult<CreditNote> {
    crate::orders::money::validate_amount(amount, "credit amount")?;

    let mut code = generate_code();
    let mut attempts = 1;
    while storage.load_credit_note(txn, &code)?.is_some() {
        if attempts >= CODE_GENERATION_ATTEMPTS {
            return Err(OrderError::Internal(
                "could not generate a unique credit note code".to_string(),
            ));
        }
        code = generate_code();
        attempts += 1;
    }

    let note = CreditNote {
        code,
        user_id: user_id.to_string(),
        amount: to_f64(to_decimal(amount)),
        amount_remaining: to_f64(to_decimal(amount)),
        status: CreditNoteStatus::Active,
        issued_at: now,
        expires_at: now + validity_ms,
        consumed_by_order: None,
        redeemed_at: None,
        source_reference,
    };
    storage.store_credit_note(txn, &note)?;

    tracing::info!(code = %note.code, user_id = %user_id, amount, "Credit note issued");
    Ok(note)
}

fn generate_code() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("CN{}{:04}", utc_date_compact(), suffix)
}
