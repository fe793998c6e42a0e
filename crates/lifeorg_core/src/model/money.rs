//! Fixed-point helpers for money and percentages.
//!
//! Money is carried as `Decimal` with two fractional digits and stored as
//! integer cents, so SQL sums stay exact.

use super::{ValidationError, ValidationResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Smallest accepted amount for transactions and budgets.
pub fn min_amount() -> Decimal {
    Decimal::new(1, 2)
}

/// Converts an amount to integer cents, rounding half away from zero.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    (amount.round_dp(2) * Decimal::from(100)).to_i64()
}

/// Converts stored cents back to a two-digit amount.
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Rejects amounts below 0.01 or with more than two fractional digits.
pub fn require_amount(field: &'static str, amount: Decimal) -> ValidationResult {
    if amount < min_amount() {
        return Err(ValidationError::new(
            field,
            "ensure this value is greater than or equal to 0.01",
        ));
    }
    if amount.normalize().scale() > 2 {
        return Err(ValidationError::new(
            field,
            "ensure that there are no more than 2 decimal places",
        ));
    }
    if to_cents(amount).is_none() {
        return Err(ValidationError::new(field, "amount is out of range"));
    }
    Ok(())
}

/// Returns `part / whole * 100`, or `0.0` when `whole` is zero.
pub fn percentage(part: Decimal, whole: Decimal) -> f64 {
    part.checked_div(whole)
        .map(|ratio| ratio * Decimal::from(100))
        .and_then(|value| value.to_f64())
        .unwrap_or(0.0)
}

/// Returns `part / whole * 100` for counts, or `0.0` when `whole` is zero.
pub fn count_percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    f64::from(part) / f64::from(whole) * 100.0
}

/// Rounds to `digits` fractional digits for presentation.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Parses a decimal TEXT column value.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::{
        count_percentage, from_cents, percentage, require_amount, round_to, to_cents,
    };
    use rust_decimal::Decimal;

    #[test]
    fn cents_conversion_keeps_two_digits() {
        assert_eq!(to_cents(Decimal::new(1250, 2)), Some(1250));
        assert_eq!(to_cents(Decimal::new(125, 1)), Some(1250));
        assert_eq!(from_cents(1250).to_string(), "12.50");
    }

    #[test]
    fn amount_rules_enforce_minimum_and_scale() {
        assert!(require_amount("amount", Decimal::new(1, 2)).is_ok());
        assert!(require_amount("amount", Decimal::ZERO).is_err());
        assert!(require_amount("amount", Decimal::new(-500, 2)).is_err());
        assert!(require_amount("amount", Decimal::new(1001, 3)).is_err());
        assert!(require_amount("amount", Decimal::new(1000, 3)).is_ok());
    }

    #[test]
    fn percentage_handles_zero_denominator() {
        assert_eq!(percentage(Decimal::from(5), Decimal::ZERO), 0.0);
        assert_eq!(percentage(Decimal::from(50), Decimal::from(200)), 25.0);
        assert_eq!(count_percentage(1, 0), 0.0);
        assert_eq!(count_percentage(3, 4), 75.0);
    }

    #[test]
    fn round_to_one_digit() {
        assert_eq!(round_to(7.26, 1), 7.3);
        assert_eq!(round_to(66.666, 2), 66.67);
    }
}
