//! Decimal rounding for displayed amounts and negotiation money.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Round `value` to `dp` decimal places, half away from zero.
///
/// Values outside Decimal's range come back unchanged.
pub fn round_to(value: f64, dp: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Convert a configured amount to money, rounded to cents.
pub fn to_money(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(2))
}

/// Money as a plain number for reports.
pub fn money_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
