//! Conversions between major currency units (naira) and minor units (kobo).
//!
//! Payment records store the expected amount in minor units as an integer.
//! Orders, carts and Monnify speak in major units. Every conversion goes
//! through [`Decimal`] so rounding never decides whether a payment matches.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be positive, got {0}")]
    NotPositive(Decimal),
    #[error("amount {0} has more precision than the currency's minor unit")]
    SubMinorPrecision(Decimal),
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
}

/// Convert a major-unit amount to minor units, exactly.
///
/// `2000` becomes `200000`, `19.99` becomes `1999`; `19.999` is rejected
/// rather than rounded.
pub fn to_minor_units(amount: Decimal) -> Result<i64, AmountError> {
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount));
    }
    let minor = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(AmountError::OutOfRange(amount))?;
    if !minor.fract().is_zero() {
        return Err(AmountError::SubMinorPrecision(amount));
    }
    minor.to_i64().ok_or(AmountError::OutOfRange(amount))
}

pub fn to_major_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
