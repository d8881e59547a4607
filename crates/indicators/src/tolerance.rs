//! Basis-point tolerance bands for level comparisons.
//!
//! Level tests never use exact equality: a configurable band around the
//! level absorbs rounding in the bar data.

use rust_decimal::Decimal;

/// Absolute tolerance around `level` for a band of `bps` basis points.
#[must_use]
pub fn tolerance(level: Decimal, bps: u32) -> Decimal {
    level.abs() * Decimal::from(bps) / Decimal::from(10_000)
}

/// Whether `price` sits within `bps` basis points of `level`.
#[must_use]
pub fn within_bps(level: Decimal, price: Decimal, bps: u32) -> bool {
    (price - level).abs() <= tolerance(level, bps)
}
