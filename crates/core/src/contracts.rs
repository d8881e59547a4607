//! Option contract, chain snapshot, and bracket-order types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Options contract right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// A single-name equity options contract specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub strike: Decimal,
    pub right: OptionRight,
    /// Contract multiplier (100 for standard US equity options).
    pub multiplier: Decimal,
}

impl OptionContract {
    /// Create a standard US equity options contract.
    pub fn new(underlying: &str, expiry: NaiveDate, strike: Decimal, right: OptionRight) -> Self {
        Self {
            underlying: underlying.to_uppercase(),
            expiry,
            strike,
            right,
            multiplier: Decimal::from(100),
        }
    }

    /// OCC-style display symbol (e.g., "NVDA 140C 2026-03-20").
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}{} {}", self.underlying, self.strike, self.right, self.expiry)
    }

    /// Days from `as_of` until expiration.
    #[must_use]
    pub fn days_to_expiry(&self, as_of: NaiveDate) -> i64 {
        (self.expiry - as_of).num_days()
    }
}

/// Option greeks snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionGreeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

/// A quoted contract inside a chain snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub contract: OptionContract,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: u64,
    pub open_interest: u64,
    pub greeks: Option<OptionGreeks>,
}

impl OptionQuote {
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::from(2)
    }

    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// Point-in-time option chain for one underlying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub underlying: String,
    pub underlying_price: Decimal,
    pub as_of: DateTime<Utc>,
    pub quotes: Vec<OptionQuote>,
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Entry leg type for a bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryType {
    Market,
    Limit { price: Decimal },
}

/// Entry + stop-loss + target placed as one logical unit.
///
/// Stop and target are option-premium prices; on a partial entry fill the
/// protective legs must be amended to the filled quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketOrder {
    pub contract: OptionContract,
    pub side: OrderSide,
    pub quantity: u32,
    pub entry: EntryType,
    pub stop_price: Decimal,
    pub target_price: Option<Decimal>,
}

/// Broker acknowledgment of a submitted bracket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn contract() -> OptionContract {
        OptionContract::new(
            "spy",
            NaiveDate::from_ymd_opt(2025, 6, 6).unwrap(),
            dec!(106),
            OptionRight::Call,
        )
    }

    #[test]
    fn display_name_and_dte() {
        let c = contract();
        assert_eq!(c.underlying, "SPY");
        assert_eq!(c.display_name(), "SPY 106C 2025-06-06");
        assert_eq!(
            c.days_to_expiry(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
            4
        );
    }

    #[test]
    fn quote_mid_and_spread() {
        let quote = OptionQuote {
            contract: contract(),
            bid: dec!(4.8),
            ask: dec!(5.0),
            volume: 10,
            open_interest: 100,
            greeks: None,
        };
        assert_eq!(quote.mid(), dec!(4.9));
        assert_eq!(quote.spread(), dec!(0.2));
    }
}
