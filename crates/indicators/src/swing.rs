//! Swing high/low detection over a rolling symmetric window.

use chrono::{DateTime, Utc};
use orb_trade_core::events::Bar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// A confirmed swing point. Confirmation lags by `lookback` bars because a
/// bar only qualifies once it is the extremum of the full symmetric window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub kind: SwingKind,
    /// Position in the bar stream, counted from the first bar pushed.
    pub index: u64,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Candidate {
    index: u64,
    timestamp: DateTime<Utc>,
    high: Decimal,
    low: Decimal,
}

/// Incremental swing detector: feed bars as they arrive, collect newly
/// confirmed points. Holds only `2 × lookback + 1` bars, so the sequence is
/// restartable from a serialized snapshot without re-scanning history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingDetector {
    lookback: usize,
    window: VecDeque<Candidate>,
    next_index: u64,
}

impl SwingDetector {
    #[must_use]
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            window: VecDeque::with_capacity(2 * lookback + 1),
            next_index: 0,
        }
    }

    /// Consume one bar; returns any swing points confirmed by it.
    pub fn push(&mut self, bar: &Bar) -> Vec<SwingPoint> {
        let candidate = Candidate {
            index: self.next_index,
            timestamp: bar.timestamp,
            high: bar.high,
            low: bar.low,
        };
        self.next_index += 1;

        self.window.push_back(candidate);
        let span = 2 * self.lookback + 1;
        if self.window.len() > span {
            self.window.pop_front();
        }
        if self.window.len() < span {
            return vec![];
        }

        let center = self.window[self.lookback];
        let mut points = Vec::new();
        if self
            .window
            .iter()
            .all(|c| c.index == center.index || c.high < center.high)
        {
            points.push(SwingPoint {
                kind: SwingKind::High,
                index: center.index,
                price: center.high,
                timestamp: center.timestamp,
            });
        }
        if self
            .window
            .iter()
            .all(|c| c.index == center.index || c.low > center.low)
        {
            points.push(SwingPoint {
                kind: SwingKind::Low,
                index: center.index,
                price: center.low,
                timestamp: center.timestamp,
            });
        }
        points
    }
}
