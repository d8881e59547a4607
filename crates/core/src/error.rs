//! Error taxonomy for the decision loop.
//!
//! Kill-switch trips are not errors; they are forced terminal transitions
//! modeled as [`crate::events::KillReason`] and logged distinctly.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradeError {
    /// Indicator warm-up: recovered locally by waiting for more bars.
    #[error("insufficient data: need {needed} bars, have {have}")]
    InsufficientData { needed: usize, have: usize },

    /// Chain filtering produced nothing. Treated as signal invalidation,
    /// not a fatal error.
    #[error("no eligible contract for {symbol}")]
    NoEligibleContract { symbol: String },

    /// Broker refused the order. The signal is discarded; never retried
    /// automatically.
    #[error("broker rejected order for {symbol}: {reason}")]
    BrokerRejection { symbol: String, reason: String },

    /// A bar was expected and did not arrive. The symbol's state machine
    /// pauses until data resumes; session state is not reset.
    #[error("data gap for {symbol}: expected bar at {expected}")]
    DataGap {
        symbol: String,
        expected: DateTime<Utc>,
    },
}
