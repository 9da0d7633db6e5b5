//! Fixed-point money helpers
//!
//! Amounts are `Decimal` in the domain and whole cents (`i64`) in storage.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::result::{Error, Result};

/// Number of fractional digits kept for every amount and balance
pub const SCALE: u32 = 2;

/// Validate a caller-supplied amount for a ledger operation
///
/// Rejects zero, negative values and values with more than two significant
/// fractional digits. The returned amount always has scale 2.
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid_amount(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > SCALE {
        return Err(Error::invalid_amount(format!(
            "amount has more than {} decimal places: {}",
            SCALE, amount
        )));
    }
    // Reject anything that would not fit in storage
    to_cents(amount)?;
    Ok(with_scale(amount))
}

/// Convert a decimal with at most two fractional digits into cents
pub fn to_cents(amount: Decimal) -> Result<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .filter(|cents| cents.fract().is_zero())
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| Error::invalid_amount(format!("amount out of range: {}", amount)))
}

/// Convert cents back into a decimal with scale 2
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, SCALE)
}

/// Rescale a decimal to exactly two fractional digits
pub fn with_scale(amount: Decimal) -> Decimal {
    let mut scaled = amount.round_dp(SCALE);
    scaled.rescale(SCALE);
    scaled
}

/// Format a balance for display, always with two decimals
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", with_scale(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        for raw in ["0", "0.00", "-1", "-0.01", "-1000000"] {
            let err = validate_amount(dec(raw)).unwrap_err();
            assert!(matches!(err, Error::InvalidAmount(_)), "{} accepted", raw);
        }
    }

    #[test]
    fn test_rejects_sub_cent_precision() {
        assert!(matches!(
            validate_amount(dec("10.001")),
            Err(Error::InvalidAmount(_))
        ));
        // Trailing zeros are not extra precision
        assert_eq!(validate_amount(dec("10.500")).unwrap(), dec("10.50"));
    }

    #[test]
    fn test_validated_amount_has_scale_two() {
        let amount = validate_amount(dec("7")).unwrap();
        assert_eq!(amount.scale(), 2);
        assert_eq!(amount.to_string(), "7.00");
    }

    #[test]
    fn test_cents_conversion() {
        assert_eq!(to_cents(dec("12.34")).unwrap(), 1234);
        assert_eq!(to_cents(dec("-0.50")).unwrap(), -50);
        assert_eq!(from_cents(6000).to_string(), "60.00");
        assert!(to_cents(dec("0.001")).is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("60")), "60.00");
        assert_eq!(format_amount(dec("0.5")), "0.50");
    }
}
