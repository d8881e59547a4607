//! Incremental MACD (exponential moving average difference + signal line).

use orb_trade_core::error::TradeError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One MACD observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub macd: Decimal,
    pub signal: Decimal,
    pub histogram: Decimal,
}

/// Incremental MACD state, updated once per bar close.
///
/// EMAs seed on the first observed value; the state reports `None` until
/// `slow_period + signal_period` closes have been consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    fast_ema: Option<Decimal>,
    slow_ema: Option<Decimal>,
    signal_ema: Option<Decimal>,
    bars_seen: usize,
}

impl Macd {
    #[must_use]
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
            signal_period,
            fast_ema: None,
            slow_ema: None,
            signal_ema: None,
            bars_seen: 0,
        }
    }

    /// Bars needed before the state is reportable.
    #[must_use]
    pub fn warmup_bars(&self) -> usize {
        self.slow_period + self.signal_period
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.bars_seen >= self.warmup_bars()
    }

    /// Consume one close. Returns the current point once warmed up.
    pub fn update(&mut self, close: Decimal) -> Option<MacdPoint> {
        self.bars_seen += 1;
        self.fast_ema = Some(ema_step(self.fast_ema, close, self.fast_period));
        self.slow_ema = Some(ema_step(self.slow_ema, close, self.slow_period));

        let macd = self.fast_ema.unwrap_or(close) - self.slow_ema.unwrap_or(close);
        self.signal_ema = Some(ema_step(self.signal_ema, macd, self.signal_period));

        self.point()
    }

    /// Current point, or `None` during warm-up.
    #[must_use]
    pub fn point(&self) -> Option<MacdPoint> {
        if !self.is_ready() {
            return None;
        }
        let (Some(fast), Some(slow), Some(signal)) =
            (self.fast_ema, self.slow_ema, self.signal_ema)
        else {
            return None;
        };
        let macd = fast - slow;
        Some(MacdPoint {
            macd,
            signal,
            histogram: macd - signal,
        })
    }
}

fn ema_step(prev: Option<Decimal>, value: Decimal, period: usize) -> Decimal {
    match prev {
        None => value,
        Some(prev) => {
            let alpha = Decimal::from(2) / Decimal::from(period as u64 + 1);
            (value - prev) * alpha + prev
        }
    }
}

/// Batch MACD over a full close sequence.
///
/// # Errors
///
/// Fails with [`TradeError::InsufficientData`] when fewer than
/// `slow_period + signal_period` closes are supplied.
pub fn compute_macd(
    closes: &[Decimal],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Result<Vec<MacdPoint>, TradeError> {
    let needed = slow_period + signal_period;
    if closes.len() < needed {
        return Err(TradeError::InsufficientData {
            needed,
            have: closes.len(),
        });
    }

    let mut state = Macd::new(fast_period, slow_period, signal_period);
    Ok(closes
        .iter()
        .filter_map(|close| state.update(*close))
        .collect())
}
