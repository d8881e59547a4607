//! Per-symbol, per-day session state.
//!
//! Exactly one `SessionState` exists per (symbol, trading day). It is reset
//! at session start and mutated only by the owning engine instance. The
//! whole struct serializes, so a session can be snapshotted mid-day and
//! replayed to the same terminal state.

use chrono::{DateTime, NaiveDate, Utc};
use orb_trade_indicators::{Macd, SwingDetector};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orb_trade_core::config::MacdConfig;
use orb_trade_core::events::{Direction, KillReason, Signal};

use crate::fib::FibLevels;

/// Session phases. Several are pass-through on the same bar
/// (`RangeLocked`, `BreakoutConfirmed`, `PullbackAtLevel`); they are still
/// distinct states so a snapshot names where the machine stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    AwaitingRange,
    RangeBuilding,
    RangeLocked,
    AwaitingBreakout,
    BreakoutPendingConfirm,
    BreakoutConfirmed,
    AwaitingPullback,
    PullbackAtLevel,
    AwaitingMacdConfirm,
    SignalEmitted,
    PositionActive,
    Flat,
}

/// The opening range box. Fixed once the window closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningRange {
    pub symbol: String,
    pub session_date: NaiveDate,
    pub window_minutes: u32,
    pub high: Decimal,
    pub low: Decimal,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A confirmed breakout: the bar closed strictly beyond the range
/// boundary. Wick-only violations never produce one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutEvent {
    pub direction: Direction,
    pub confirm_close: Decimal,
    /// Extreme of the confirming bar (high for up, low for down);
    /// anchor B of the fib leg.
    pub confirm_extreme: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub symbol: String,
    pub session_date: NaiveDate,
    pub phase: Phase,

    // Opening range accumulation, then the locked box.
    pub range_start: Option<DateTime<Utc>>,
    pub range_high: Option<Decimal>,
    pub range_low: Option<Decimal>,
    pub opening_range: Option<OpeningRange>,

    // Active breakout leg.
    pub breakout: Option<BreakoutEvent>,
    pub fib: Option<FibLevels>,
    pub pullback_ratio: Option<Decimal>,
    pub pullback_price: Option<Decimal>,
    pub bars_awaiting_pullback: u32,
    pub bars_awaiting_curl: u32,

    // Indicator state.
    pub macd: Macd,
    pub hist_prev: Option<Decimal>,
    pub slope_prev: Option<Decimal>,
    pub swings: SwingDetector,
    pub last_swing_high: Option<Decimal>,
    pub last_swing_low: Option<Decimal>,

    // Signal lifecycle.
    pub pending_signal: Option<Signal>,
    pub trades_today: u32,
    pub realized_pnl: Decimal,

    // Halt and data-continuity flags.
    pub kill_switch: bool,
    pub kill_reason: Option<KillReason>,
    pub gap_paused: bool,
    pub last_bar_ts: Option<DateTime<Utc>>,
}

impl SessionState {
    #[must_use]
    pub fn new(
        symbol: String,
        session_date: NaiveDate,
        macd: &MacdConfig,
        swing_lookback: usize,
    ) -> Self {
        Self {
            symbol,
            session_date,
            phase: Phase::AwaitingRange,
            range_start: None,
            range_high: None,
            range_low: None,
            opening_range: None,
            breakout: None,
            fib: None,
            pullback_ratio: None,
            pullback_price: None,
            bars_awaiting_pullback: 0,
            bars_awaiting_curl: 0,
            macd: Macd::new(macd.fast_period, macd.slow_period, macd.signal_period),
            hist_prev: None,
            slope_prev: None,
            swings: SwingDetector::new(swing_lookback),
            last_swing_high: None,
            last_swing_low: None,
            pending_signal: None,
            trades_today: 0,
            realized_pnl: Decimal::ZERO,
            kill_switch: false,
            kill_reason: None,
            gap_paused: false,
            last_bar_ts: None,
        }
    }

    /// Discard the active breakout leg (fib levels, pullback progress).
    /// Range and indicator state survive.
    pub fn clear_leg(&mut self) {
        self.breakout = None;
        self.fib = None;
        self.pullback_ratio = None;
        self.pullback_price = None;
        self.bars_awaiting_pullback = 0;
        self.bars_awaiting_curl = 0;
    }
}
