//! Money calculation utilities using rust_decimal for precision
//!
//! All calculations are done using `Decimal` internally, then converted to
//! `f64` for storage/serialization. Wire amounts are rounded to 2 decimal
//! places, half-up.

use crate::orders::traits::OrderError;
use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// VAT rate, fixed at 15% (observed behaviour; not configurable)
pub const VAT_RATE_PERCENT: i64 = 15;

/// Maximum allowed payment amount (R1,000,000)
const MAX_PAYMENT_AMOUNT: f64 = 1_000_000.0;

/// Maximum allowed quantity per order line
pub const MAX_QUANTITY: i32 = 9999;

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Compare two monetary values for equality (within 0.01 tolerance)
pub fn money_eq(a: f64, b: f64) -> bool {
    let diff = (to_decimal(a) - to_decimal(b)).abs();
    diff < MONEY_TOLERANCE
}

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), OrderError> {
    if !value.is_finite() {
        return Err(OrderError::InvalidPaymentAmount(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// Validate an order-line quantity
pub fn validate_quantity(quantity: i32) -> Result<(), OrderError> {
    if quantity <= 0 {
        return Err(OrderError::InvalidQuantity(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(OrderError::InvalidQuantity(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, quantity
        )));
    }
    Ok(())
}

/// Validate a positive monetary amount (payments, refunds, credit)
pub fn validate_amount(amount: f64, field_name: &str) -> Result<(), OrderError> {
    require_finite(amount, field_name)?;
    if amount <= 0.0 {
        return Err(OrderError::InvalidPaymentAmount(format!(
            "{} must be positive, got {}",
            field_name, amount
        )));
    }
    if amount > MAX_PAYMENT_AMOUNT {
        return Err(OrderError::InvalidPaymentAmount(format!(
            "{} exceeds maximum allowed ({}), got {}",
            field_name, MAX_PAYMENT_AMOUNT, amount
        )));
    }
    Ok(())
}

/// Computed monetary breakdown for a new order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub shipping_fee: f64,
    pub credit_applied: f64,
    pub total: f64,
}

/// Compute the order totals.
///
/// `tax = subtotal * 15%`; `total = max(0, subtotal + tax + shipping -
/// credit)`. The credit actually applied is clamped to the gross amount so
/// the total never goes negative and the breakdown stays additive.
pub fn compute_order_totals(subtotal: Decimal, shipping_fee: Decimal, credit: Decimal) -> OrderTotals {
    let tax = (subtotal * Decimal::from(VAT_RATE_PERCENT) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    let gross = subtotal + tax + shipping_fee;
    let credit_applied = credit.max(Decimal::ZERO).min(gross);
    let total = (gross - credit_applied).max(Decimal::ZERO);

    OrderTotals {
        subtotal: to_f64(subtotal),
        tax: to_f64(tax),
        shipping_fee: to_f64(shipping_fee),
        credit_applied: to_f64(credit_applied),
        total: to_f64(total),
    }
}

/// Line total = unit_price * quantity, rounded
pub fn line_total(unit_price: f64, quantity: i32) -> f64 {
    to_f64(to_decimal(unit_price) * Decimal::from(quantity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_decimal_precision() {
        // Classic floating point problem: 0.1 + 0.2 != 0.3
        let sum_f64 = 0.1_f64 + 0.2_f64;
        assert_ne!(sum_f64, 0.3);

        let sum_dec = to_decimal(0.1) + to_decimal(0.2);
        assert_eq!(to_f64(sum_dec), 0.3);
    }

    #[test]
    fn test_money_eq() {
        assert!(money_eq(100.0, 100.0));
        assert!(money_eq(100.004, 100.006));
        assert!(!money_eq(100.0, 100.02));
    }

    #[test]
    fn test_compute_order_totals_gauteng_scenario() {
        // 2 x 100.00 + 1 x 50.00, GAUTENG delivery fee 99.00, no credit
        let totals = compute_order_totals(to_decimal(250.0), to_decimal(99.0), Decimal::ZERO);
        assert_eq!(totals.subtotal, 250.0);
        assert_eq!(totals.tax, 37.50);
        assert_eq!(totals.shipping_fee, 99.0);
        assert_eq!(totals.total, 386.50);
    }

    #[test]
    fn test_compute_order_totals_with_credit() {
        let totals = compute_order_totals(to_decimal(100.0), Decimal::ZERO, to_decimal(50.0));
        assert_eq!(totals.tax, 15.0);
        assert_eq!(totals.credit_applied, 50.0);
        assert_eq!(totals.total, 65.0);
    }

    #[test]
    fn test_compute_order_totals_credit_exceeding_gross_clamps() {
        let totals = compute_order_totals(to_decimal(10.0), Decimal::ZERO, to_decimal(500.0));
        // gross = 11.50; credit clamped, total floors at zero
        assert_eq!(totals.credit_applied, 11.50);
        assert_eq!(totals.total, 0.0);
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(50.0, "amount").is_ok());
        assert!(validate_amount(0.0, "amount").is_err());
        assert!(validate_amount(-1.0, "amount").is_err());
        assert!(validate_amount(f64::NAN, "amount").is_err());
        assert!(validate_amount(f64::INFINITY, "amount").is_err());
        assert!(validate_amount(MAX_PAYMENT_AMOUNT + 1.0, "amount").is_err());
    }

    #[test]
    fn test_line_total_rounding() {
        assert_eq!(line_total(10.99, 3), 32.97);
        assert_eq!(line_total(0.005, 1), 0.01); // half-up
    }

    #[test]
    fn test_accumulation_precision() {
        let mut total = Decimal::ZERO;
        for _ in 0..1000 {
            total += to_decimal(0.01);
        }
        assert_eq!(to_f64(total), 10.0);
    }
}
