//! The ORB+Fib state machine.
//!
//! `on_bar` is synchronous and non-blocking; order placement and fill
//! confirmation are asynchronous relative to bar processing and arrive via
//! `on_entry_filled` / `on_rejection` / `on_exit_filled`. The engine never
//! re-emits a signal while one is in flight.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use orb_trade_core::config::{AppConfig, MacdConfig};
use orb_trade_core::error::TradeError;
use orb_trade_core::events::{Bar, Direction, KillReason, Signal};
use orb_trade_core::limits::DailyLimits;
use orb_trade_indicators::{tolerance, SwingKind};

use crate::fib::FibLevels;
use crate::session::{BreakoutEvent, OpeningRange, Phase, SessionState};

/// Engine tunables, extracted from the application config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub orb_minutes: u32,
    pub bar_interval_minutes: u32,
    pub fib_tolerance_bps: u32,
    pub macd_confirm_bars: u32,
    pub pullback_timeout_bars: u32,
    pub allow_multiple_signals: bool,
    pub swing_lookback: usize,
    pub macd: MacdConfig,
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            orb_minutes: config.engine.orb_minutes,
            bar_interval_minutes: config.session.bar_interval_minutes,
            fib_tolerance_bps: config.engine.fib_tolerance_bps,
            macd_confirm_bars: config.engine.macd_confirm_bars,
            pullback_timeout_bars: config.engine.pullback_timeout_bars,
            allow_multiple_signals: config.engine.allow_multiple_signals,
            swing_lookback: config.engine.swing_lookback,
            macd: config.macd.clone(),
        }
    }
}

/// MACD histogram slope sign change on the current bar.
#[derive(Debug, Clone, Copy, Default)]
struct Curl {
    up: bool,
    down: bool,
}

pub struct OrbFibEngine {
    settings: EngineSettings,
    limits: Arc<DailyLimits>,
    state: SessionState,
}

impl OrbFibEngine {
    #[must_use]
    pub fn new(
        symbol: String,
        session_date: NaiveDate,
        settings: EngineSettings,
        limits: Arc<DailyLimits>,
    ) -> Self {
        let state = SessionState::new(
            symbol,
            session_date,
            &settings.macd,
            settings.swing_lookback,
        );
        Self {
            settings,
            limits,
            state,
        }
    }

    /// Rebuild an engine from a serialized session snapshot. Replaying the
    /// remaining bars reproduces the uninterrupted terminal state.
    #[must_use]
    pub fn restore(settings: EngineSettings, limits: Arc<DailyLimits>, state: SessionState) -> Self {
        Self {
            settings,
            limits,
            state,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn pending_signal(&self) -> Option<&Signal> {
        self.state.pending_signal.as_ref()
    }

    /// Process one bar tick.
    ///
    /// # Errors
    ///
    /// Returns [`TradeError::DataGap`] when the bar arrives later than one
    /// interval after its predecessor. Session state is preserved; the
    /// machine pauses until a contiguous bar resumes the stream.
    pub fn on_bar(&mut self, bar: &Bar) -> Result<Option<Signal>, TradeError> {
        if let Some(last) = self.state.last_bar_ts {
            let expected = last + Duration::minutes(i64::from(self.settings.bar_interval_minutes));
            if bar.timestamp > expected {
                self.state.gap_paused = true;
                self.state.last_bar_ts = Some(bar.timestamp);
                // The late bar's prices are still real: indicators and the
                // still-open range absorb it even though transitions pause.
                self.update_indicators(bar);
                self.absorb_range_bar(bar);
                warn!(
                    symbol = self.state.symbol,
                    expected = %expected,
                    received = %bar.timestamp,
                    "Bar gap; pausing state machine until data resumes"
                );
                return Err(TradeError::DataGap {
                    symbol: self.state.symbol.clone(),
                    expected,
                });
            }
        }
        if self.state.gap_paused {
            debug!(symbol = self.state.symbol, "Bar stream resumed");
            self.state.gap_paused = false;
        }
        self.state.last_bar_ts = Some(bar.timestamp);

        if self.state.kill_switch || self.limits.is_tripped() {
            self.state.phase = Phase::Flat;
            return Ok(None);
        }

        // Indicators consume every bar regardless of phase.
        let curl = self.update_indicators(bar);

        Ok(self.step(bar, curl))
    }

    /// Entry fill confirmed by the broker, possibly several bars after the
    /// signal was emitted.
    pub fn on_entry_filled(&mut self) {
        if self.state.phase == Phase::SignalEmitted {
            self.state.trades_today += 1;
            self.state.phase = Phase::PositionActive;
        }
    }

    /// Broker rejected the order. The signal is discarded; no auto-retry.
    pub fn on_rejection(&mut self, reason: &str) {
        warn!(symbol = self.state.symbol, reason, "Order rejected; discarding signal");
        self.abandon_signal();
    }

    /// Selector or sizer declined the signal (no contract, zero size).
    pub fn invalidate_signal(&mut self, reason: &str) {
        debug!(symbol = self.state.symbol, reason, "Signal invalidated");
        self.abandon_signal();
    }

    /// Exit fill reported by the watcher.
    pub fn on_exit_filled(&mut self, pnl: Decimal) {
        self.state.realized_pnl += pnl;
        self.state.pending_signal = None;
        self.state.clear_leg();
        self.state.phase = Phase::Flat;
        if self.settings.allow_multiple_signals
            && !self.state.kill_switch
            && !self.limits.is_tripped()
        {
            self.state.phase = Phase::AwaitingBreakout;
        }
    }

    /// Forced terminal transition from any state. Halts signal emission for
    /// the remainder of the session.
    pub fn trip_kill_switch(&mut self, reason: KillReason) {
        if !self.state.kill_switch {
            warn!(
                symbol = self.state.symbol,
                reason = %reason,
                "Kill switch: halting session"
            );
        }
        self.state.kill_switch = true;
        self.state.kill_reason = Some(reason);
        self.state.pending_signal = None;
        self.state.clear_leg();
        self.state.phase = Phase::Flat;
    }

    fn abandon_signal(&mut self) {
        self.state.pending_signal = None;
        self.state.clear_leg();
        self.state.phase = if self.state.kill_switch || self.limits.is_tripped() {
            Phase::Flat
        } else {
            Phase::AwaitingBreakout
        };
    }

    fn update_indicators(&mut self, bar: &Bar) -> Curl {
        for point in self.state.swings.push(bar) {
            match point.kind {
                SwingKind::High => self.state.last_swing_high = Some(point.price),
                SwingKind::Low => self.state.last_swing_low = Some(point.price),
            }
        }

        let mut curl = Curl::default();
        if let Some(point) = self.state.macd.update(bar.close) {
            let slope = self.state.hist_prev.map(|prev| point.histogram - prev);
            if let (Some(slope), Some(prev_slope)) = (slope, self.state.slope_prev) {
                curl.up = slope > Decimal::ZERO && prev_slope <= Decimal::ZERO;
                curl.down = slope < Decimal::ZERO && prev_slope >= Decimal::ZERO;
            }
            self.state.slope_prev = slope;
            self.state.hist_prev = Some(point.histogram);
        }
        curl
    }

    /// Extend the opening-range extremes while the window is still open.
    fn absorb_range_bar(&mut self, bar: &Bar) {
        if self.state.opening_range.is_some() {
            return;
        }
        let Some(start) = self.state.range_start else {
            return;
        };
        let end = start + Duration::minutes(i64::from(self.settings.orb_minutes));
        if bar.timestamp >= end {
            return;
        }
        self.state.range_high = Some(self.state.range_high.map_or(bar.high, |h| h.max(bar.high)));
        self.state.range_low = Some(self.state.range_low.map_or(bar.low, |l| l.min(bar.low)));
    }

    /// Walk the state machine. One bar may drive several transitions
    /// (range lock + breakout check, tag + curl check, ...).
    #[allow(clippy::too_many_lines)]
    fn step(&mut self, bar: &Bar, curl: Curl) -> Option<Signal> {
        loop {
            match self.state.phase {
                Phase::AwaitingRange => {
                    self.state.range_start = Some(bar.timestamp);
                    self.state.range_high = Some(bar.high);
                    self.state.range_low = Some(bar.low);
                    self.state.phase = Phase::RangeBuilding;
                    return None;
                }

                Phase::RangeBuilding => {
                    let Some(start) = self.state.range_start else {
                        return None;
                    };
                    let end = start + Duration::minutes(i64::from(self.settings.orb_minutes));
                    if bar.timestamp < end {
                        self.absorb_range_bar(bar);
                        return None;
                    }
                    // Window elapsed: lock from bars strictly within it. The
                    // current bar is outside and still gets a breakout look.
                    let (Some(high), Some(low)) = (self.state.range_high, self.state.range_low)
                    else {
                        return None;
                    };
                    info!(
                        symbol = self.state.symbol,
                        high = %high,
                        low = %low,
                        window_minutes = self.settings.orb_minutes,
                        "Opening range locked"
                    );
                    self.state.opening_range = Some(OpeningRange {
                        symbol: self.state.symbol.clone(),
                        session_date: self.state.session_date,
                        window_minutes: self.settings.orb_minutes,
                        high,
                        low,
                        start,
                        end,
                    });
                    self.state.phase = Phase::RangeLocked;
                }

                Phase::RangeLocked => {
                    self.state.phase = Phase::AwaitingBreakout;
                }

                Phase::AwaitingBreakout => {
                    let Some(or) = &self.state.opening_range else {
                        return None;
                    };
                    // Wick touches alone do not transition.
                    if bar.close <= or.high && bar.close >= or.low {
                        return None;
                    }
                    self.state.phase = Phase::BreakoutPendingConfirm;
                }

                Phase::BreakoutPendingConfirm => {
                    let Some(or) = self.state.opening_range.clone() else {
                        return None;
                    };
                    // Close-only confirmation policy: the bar close must sit
                    // strictly beyond the boundary; intrabar wicks on the
                    // confirming bar do not disqualify it.
                    let direction = if bar.close > or.high {
                        Direction::Long
                    } else if bar.close < or.low {
                        Direction::Short
                    } else {
                        self.state.phase = Phase::AwaitingBreakout;
                        return None;
                    };
                    let (anchor_a, extreme) = match direction {
                        Direction::Long => (or.low, bar.high),
                        Direction::Short => (or.high, bar.low),
                    };
                    self.state.breakout = Some(BreakoutEvent {
                        direction,
                        confirm_close: bar.close,
                        confirm_extreme: extreme,
                        timestamp: bar.timestamp,
                    });
                    self.state.fib = Some(FibLevels::from_leg(direction, anchor_a, extreme));
                    info!(
                        symbol = self.state.symbol,
                        direction = %direction,
                        anchor_a = %anchor_a,
                        anchor_b = %extreme,
                        "Breakout confirmed; fib leg computed"
                    );
                    self.state.phase = Phase::BreakoutConfirmed;
                }

                Phase::BreakoutConfirmed => {
                    // The confirming bar's extreme is anchor B; pullback
                    // scanning starts on the next bar.
                    self.state.phase = Phase::AwaitingPullback;
                    return None;
                }

                Phase::AwaitingPullback | Phase::AwaitingMacdConfirm => {
                    let Some(fib) = self.state.fib.clone() else {
                        return None;
                    };
                    let bps = self.settings.fib_tolerance_bps;

                    // A confirmed close through the opposite boundary
                    // invalidates the leg and restarts the breakout scan on
                    // this same bar.
                    if let Some(or) = &self.state.opening_range {
                        let flipped = match fib.direction {
                            Direction::Long => bar.close < or.low,
                            Direction::Short => bar.close > or.high,
                        };
                        if flipped {
                            info!(
                                symbol = self.state.symbol,
                                "Opposite-direction breakout; discarding fib leg"
                            );
                            self.state.clear_leg();
                            self.state.phase = Phase::AwaitingBreakout;
                            continue;
                        }
                    }

                    // Close beyond the 0.786 retracement kills the leg.
                    let invalidated = match fib.direction {
                        Direction::Long => {
                            bar.close < fib.retrace_786 - tolerance(fib.retrace_786, bps)
                        }
                        Direction::Short => {
                            bar.close > fib.retrace_786 + tolerance(fib.retrace_786, bps)
                        }
                    };
                    if invalidated {
                        info!(
                            symbol = self.state.symbol,
                            close = %bar.close,
                            "Retracement beyond 0.786; discarding fib leg"
                        );
                        self.state.clear_leg();
                        self.state.phase = Phase::AwaitingBreakout;
                        return None;
                    }

                    if self.state.phase == Phase::AwaitingPullback {
                        if let Some((ratio, price)) = tag_pullback(&fib, bar, bps) {
                            debug!(
                                symbol = self.state.symbol,
                                ratio = %ratio,
                                level = %price,
                                "Pullback tagged"
                            );
                            self.state.pullback_ratio = Some(ratio);
                            self.state.pullback_price = Some(price);
                            self.state.bars_awaiting_curl = 0;
                            self.state.phase = Phase::PullbackAtLevel;
                            continue;
                        }
                        self.state.bars_awaiting_pullback += 1;
                        if self.state.bars_awaiting_pullback >= self.settings.pullback_timeout_bars
                        {
                            info!(
                                symbol = self.state.symbol,
                                bars = self.state.bars_awaiting_pullback,
                                "No pullback tag; discarding fib leg"
                            );
                            self.state.clear_leg();
                            self.state.phase = Phase::AwaitingBreakout;
                        }
                        return None;
                    }

                    // AwaitingMacdConfirm: curl within N bars or invalidate.
                    let confirmed = match fib.direction {
                        Direction::Long => curl.up,
                        Direction::Short => curl.down,
                    };
                    if confirmed {
                        return self.emit_signal(bar, &fib);
                    }
                    self.state.bars_awaiting_curl += 1;
                    if self.state.bars_awaiting_curl >= self.settings.macd_confirm_bars {
                        info!(
                            symbol = self.state.symbol,
                            bars = self.state.bars_awaiting_curl,
                            "No MACD curl; discarding fib leg"
                        );
                        self.state.clear_leg();
                        self.state.phase = Phase::AwaitingBreakout;
                    }
                    return None;
                }

                Phase::PullbackAtLevel => {
                    self.state.phase = Phase::AwaitingMacdConfirm;
                }

                // In-flight or terminal: repeated bar delivery emits nothing.
                Phase::SignalEmitted | Phase::PositionActive | Phase::Flat => return None,
            }
        }
    }

    fn emit_signal(&mut self, bar: &Bar, fib: &FibLevels) -> Option<Signal> {
        let ratio = self.state.pullback_ratio?;
        let entry = self.state.pullback_price?;

        // Stop: the more conservative of the 0.786 level and the latest
        // opposing swing (anchor A before any swing confirms).
        let swing_guard = match fib.direction {
            Direction::Long => self.state.last_swing_low,
            Direction::Short => self.state.last_swing_high,
        }
        .unwrap_or(fib.anchor_a);
        let stop = match fib.direction {
            Direction::Long => fib.retrace_786.min(swing_guard),
            Direction::Short => fib.retrace_786.max(swing_guard),
        };

        let signal = Signal {
            symbol: self.state.symbol.clone(),
            direction: fib.direction,
            entry,
            stop,
            targets: vec![fib.anchor_b, fib.ext_1272, fib.ext_1618],
            fib_level: ratio,
            macd_confirmed: true,
            timestamp: bar.timestamp,
        };
        info!(
            symbol = self.state.symbol,
            direction = %signal.direction,
            entry = %signal.entry,
            stop = %signal.stop,
            fib_level = %ratio,
            "Signal emitted"
        );
        self.state.pending_signal = Some(signal.clone());
        self.state.phase = Phase::SignalEmitted;
        Some(signal)
    }
}

/// Level tag inside the 0.5–0.618 band. Touching both levels in one bar
/// prefers the nearer 0.5; blowing through the whole band falls back to the
/// deeper, more conservative 0.618.
fn tag_pullback(fib: &FibLevels, bar: &Bar, bps: u32) -> Option<(Decimal, Decimal)> {
    let ratio_50 = Decimal::new(5, 1);
    let ratio_618 = Decimal::new(618, 3);
    let tol_50 = tolerance(fib.retrace_50, bps);
    let tol_618 = tolerance(fib.retrace_618, bps);

    match fib.direction {
        Direction::Long => {
            let touched_50 = bar.low <= fib.retrace_50 + tol_50;
            let blew_band = bar.low < fib.retrace_618 - tol_618;
            if blew_band {
                Some((ratio_618, fib.retrace_618))
            } else if touched_50 {
                Some((ratio_50, fib.retrace_50))
            } else {
                None
            }
        }
        Direction::Short => {
            let touched_50 = bar.high >= fib.retrace_50 - tol_50;
            let blew_band = bar.high > fib.retrace_618 + tol_618;
            if blew_band {
                Some((ratio_618, fib.retrace_618))
            } else if touched_50 {
                Some((ratio_50, fib.retrace_50))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use orb_trade_core::config::LimitsConfig;
    use rust_decimal_macros::dec;

    fn settings() -> EngineSettings {
        EngineSettings {
            orb_minutes: 30,
            bar_interval_minutes: 5,
            fib_tolerance_bps: 10,
            macd_confirm_bars: 3,
            pullback_timeout_bars: 12,
            allow_multiple_signals: false,
            swing_lookback: 2,
            macd: MacdConfig {
                fast_period: 3,
                slow_period: 5,
                signal_period: 2,
            },
        }
    }

    fn limits() -> Arc<DailyLimits> {
        Arc::new(DailyLimits::new(
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            &LimitsConfig {
                daily_loss_limit: dec!(1000),
                max_trades_per_day: 10,
            },
        ))
    }

    fn engine_with(limits: Arc<DailyLimits>) -> OrbFibEngine {
        OrbFibEngine::new(
            "SPY".to_string(),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            settings(),
            limits,
        )
    }

    fn engine() -> OrbFibEngine {
        engine_with(limits())
    }

    /// 5-minute bar `n` (1-based) starting at 13:30 UTC.
    fn bar(n: u32, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            symbol: "SPY".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 13, 30, 0).unwrap()
                + Duration::minutes(i64::from((n - 1) * 5)),
            open,
            high,
            low,
            close,
            volume: dec!(10000),
        }
    }

    /// Range 100–104 over six bars, up breakout to 110 on bar 7, pullback
    /// tag of the 0.5 level on bar 8, histogram curl up on bar 10.
    fn long_session() -> Vec<Bar> {
        vec![
            bar(1, dec!(102.8), dec!(104), dec!(102), dec!(103)),
            bar(2, dec!(103), dec!(103.5), dec!(101.5), dec!(102.5)),
            bar(3, dec!(102.5), dec!(103), dec!(101), dec!(102)),
            bar(4, dec!(102), dec!(102.5), dec!(100.5), dec!(101.5)),
            bar(5, dec!(101.5), dec!(102), dec!(100), dec!(101)),
            bar(6, dec!(101), dec!(101.5), dec!(100.3), dec!(100.5)),
            bar(7, dec!(101), dec!(110), dec!(100.9), dec!(105)),
            bar(8, dec!(105.1), dec!(105.2), dec!(104.9), dec!(104.95)),
            bar(9, dec!(104.9), dec!(105), dec!(104.2), dec!(104.5)),
            bar(10, dec!(104.6), dec!(106.2), dec!(104.4), dec!(106)),
        ]
    }

    fn feed(engine: &mut OrbFibEngine, bars: &[Bar]) -> Vec<Signal> {
        let mut signals = Vec::new();
        for b in bars {
            if let Some(s) = engine.on_bar(b).unwrap() {
                signals.push(s);
            }
        }
        signals
    }

    #[test]
    fn opening_range_locks_window_extremes_and_stays_immutable() {
        let mut eng = engine();
        let bars = long_session();
        feed(&mut eng, &bars[..7]);

        let or = eng.state().opening_range.clone().expect("locked");
        assert_eq!(or.high, dec!(104));
        assert_eq!(or.low, dec!(100));

        feed(&mut eng, &bars[7..]);
        let after = eng.state().opening_range.clone().unwrap();
        assert_eq!(after, or);
    }

    #[test]
    fn wick_only_excursion_never_confirms_breakout() {
        let mut eng = engine();
        let bars = long_session();
        feed(&mut eng, &bars[..6]);

        // High pokes 110 but the close stays inside the range.
        let wick = bar(7, dec!(101), dec!(110), dec!(100.9), dec!(103));
        assert!(eng.on_bar(&wick).unwrap().is_none());
        assert_eq!(eng.state().phase, Phase::AwaitingBreakout);
        assert!(eng.state().breakout.is_none());
        assert!(eng.state().fib.is_none());
    }

    #[test]
    fn fib_levels_derive_from_breakout_leg() {
        let mut eng = engine();
        feed(&mut eng, &long_session()[..7]);

        let fib = eng.state().fib.clone().expect("breakout confirmed");
        assert_eq!(fib.anchor_a, dec!(100));
        assert_eq!(fib.anchor_b, dec!(110));
        assert_eq!(fib.retrace_50, dec!(105.0));
        assert_eq!(fib.retrace_618, dec!(103.820));
        assert_eq!(eng.state().phase, Phase::AwaitingPullback);
    }

    #[test]
    fn full_long_flow_emits_one_signal_on_curl() {
        let mut eng = engine();
        let signals = feed(&mut eng, &long_session());

        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.direction, Direction::Long);
        assert_eq!(s.entry, dec!(105.0));
        assert_eq!(s.fib_level, dec!(0.5));
        // Swing low at 100 is deeper than the 0.786 level.
        assert_eq!(s.stop, dec!(100));
        assert_eq!(s.targets, vec![dec!(110), dec!(112.720), dec!(116.180)]);
        assert!(s.macd_confirmed);
        assert_eq!(eng.state().phase, Phase::SignalEmitted);
    }

    #[test]
    fn no_second_signal_while_one_is_in_flight() {
        let mut eng = engine();
        feed(&mut eng, &long_session());
        assert_eq!(eng.state().phase, Phase::SignalEmitted);

        // More favorable bars while the order is working.
        let b11 = bar(11, dec!(106), dec!(107.5), dec!(105.8), dec!(107));
        assert!(eng.on_bar(&b11).unwrap().is_none());

        eng.on_entry_filled();
        assert_eq!(eng.state().phase, Phase::PositionActive);
        assert_eq!(eng.state().trades_today, 1);

        let b12 = bar(12, dec!(107), dec!(108.5), dec!(106.8), dec!(108));
        assert!(eng.on_bar(&b12).unwrap().is_none());
        assert_eq!(eng.state().phase, Phase::PositionActive);
    }

    #[test]
    fn tripped_limits_block_further_signals() {
        let shared = limits();
        let mut eng = engine_with(Arc::clone(&shared));
        let bars = long_session();
        feed(&mut eng, &bars[..7]);

        // Another symbol breaches the aggregate daily loss.
        assert!(shared.record_pnl(dec!(-1500)).is_some());

        let signals = feed(&mut eng, &bars[7..]);
        assert!(signals.is_empty());
        assert_eq!(eng.state().phase, Phase::Flat);
    }

    #[test]
    fn manual_kill_switch_halts_from_any_state() {
        let mut eng = engine();
        let bars = long_session();
        feed(&mut eng, &bars[..4]);

        eng.trip_kill_switch(KillReason::Manual);
        assert_eq!(eng.state().phase, Phase::Flat);

        let signals = feed(&mut eng, &bars[4..]);
        assert!(signals.is_empty());
        assert_eq!(eng.state().kill_reason, Some(KillReason::Manual));
    }

    #[test]
    fn curl_timeout_discards_fib_leg() {
        let mut eng = engine();
        let bars = long_session();
        feed(&mut eng, &bars[..8]);
        assert_eq!(eng.state().phase, Phase::AwaitingMacdConfirm);

        // Slow drift lower: histogram keeps falling, no curl.
        let b9 = bar(9, dec!(104.9), dec!(105), dec!(104.2), dec!(104.5));
        let b10 = bar(10, dec!(104.4), dec!(104.6), dec!(104.0), dec!(104.2));
        assert!(eng.on_bar(&b9).unwrap().is_none());
        assert!(eng.on_bar(&b10).unwrap().is_none());

        assert_eq!(eng.state().phase, Phase::AwaitingBreakout);
        assert!(eng.state().fib.is_none());
        assert!(eng.state().pullback_ratio.is_none());
    }

    #[test]
    fn pullback_timeout_discards_fib_leg() {
        let mut custom = settings();
        custom.pullback_timeout_bars = 2;
        let mut eng = OrbFibEngine::new(
            "SPY".to_string(),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            custom,
            limits(),
        );
        let bars = long_session();
        feed(&mut eng, &bars[..7]);
        assert_eq!(eng.state().phase, Phase::AwaitingPullback);

        // Price runs away from the retracement band; no tag ever prints.
        let b8 = bar(8, dec!(106), dec!(107), dec!(105.5), dec!(106.5));
        assert!(eng.on_bar(&b8).unwrap().is_none());
        assert_eq!(eng.state().phase, Phase::AwaitingPullback);

        let b9 = bar(9, dec!(106.5), dec!(107.5), dec!(105.8), dec!(107));
        assert!(eng.on_bar(&b9).unwrap().is_none());
        assert_eq!(eng.state().phase, Phase::AwaitingBreakout);
        assert!(eng.state().fib.is_none());
        assert!(eng.state().breakout.is_none());
    }

    #[test]
    fn opposite_breakout_invalidates_and_restarts() {
        let mut eng = engine();
        let bars = long_session();
        feed(&mut eng, &bars[..7]);

        // Close below the range low before any pullback completes.
        let reversal = bar(8, dec!(104), dec!(105), dec!(99), dec!(99.5));
        assert!(eng.on_bar(&reversal).unwrap().is_none());

        let fib = eng.state().fib.clone().expect("new leg");
        assert_eq!(fib.direction, Direction::Short);
        assert_eq!(fib.anchor_a, dec!(104));
        assert_eq!(fib.anchor_b, dec!(99));
        assert_eq!(eng.state().phase, Phase::AwaitingPullback);
    }

    #[test]
    fn blow_through_band_tags_deeper_level() {
        let mut eng = engine();
        let bars = long_session();
        feed(&mut eng, &bars[..7]);

        // Low punches through 103.82 minus tolerance; close holds above 0.786.
        let deep = bar(8, dec!(104.8), dec!(104.8), dec!(103.5), dec!(104.3));
        assert!(eng.on_bar(&deep).unwrap().is_none());
        assert_eq!(eng.state().phase, Phase::AwaitingMacdConfirm);
        assert_eq!(eng.state().pullback_ratio, Some(dec!(0.618)));
        assert_eq!(eng.state().pullback_price, Some(dec!(103.820)));
    }

    #[test]
    fn data_gap_pauses_but_absorbs_the_late_bar() {
        let mut eng = engine();
        let bars = long_session();
        assert!(eng.on_bar(&bars[0]).unwrap().is_none());

        // bars[2] skips one interval: transitions pause, but its extremes
        // still widen the open range.
        let err = eng.on_bar(&bars[2]).unwrap_err();
        assert!(matches!(err, TradeError::DataGap { .. }));
        assert!(eng.state().gap_paused);
        assert_eq!(eng.state().range_low, Some(dec!(101)));
        assert_eq!(eng.state().range_high, Some(dec!(104)));

        // Contiguous follow-up resumes where the session left off.
        assert!(eng.on_bar(&bars[3]).unwrap().is_none());
        assert!(!eng.state().gap_paused);
        assert_eq!(eng.state().phase, Phase::RangeBuilding);
        assert_eq!(eng.state().range_low, Some(dec!(100.5)));
    }

    #[test]
    fn rejection_discards_signal_without_retry() {
        let mut eng = engine();
        feed(&mut eng, &long_session());
        assert!(eng.pending_signal().is_some());

        eng.on_rejection("insufficient buying power");
        assert!(eng.pending_signal().is_none());
        assert_eq!(eng.state().phase, Phase::AwaitingBreakout);
        assert!(eng.state().fib.is_none());
    }

    #[test]
    fn exit_rearms_only_when_multiple_signals_allowed() {
        let mut eng = engine();
        feed(&mut eng, &long_session());
        eng.on_entry_filled();

        eng.on_exit_filled(dec!(250));
        assert_eq!(eng.state().phase, Phase::Flat);
        assert_eq!(eng.state().realized_pnl, dec!(250));

        let mut multi = settings();
        multi.allow_multiple_signals = true;
        let mut eng2 = OrbFibEngine::new(
            "SPY".to_string(),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            multi,
            limits(),
        );
        feed(&mut eng2, &long_session());
        eng2.on_entry_filled();
        eng2.on_exit_filled(dec!(-100));
        assert_eq!(eng2.state().phase, Phase::AwaitingBreakout);
    }

    #[test]
    fn snapshot_round_trip_replays_to_same_terminal_state() {
        let bars = long_session();

        let mut uninterrupted = engine();
        let direct = feed(&mut uninterrupted, &bars);

        let mut first_half = engine();
        feed(&mut first_half, &bars[..8]);
        assert_eq!(first_half.state().phase, Phase::AwaitingMacdConfirm);

        let json = serde_json::to_string(first_half.state()).unwrap();
        let restored_state: SessionState = serde_json::from_str(&json).unwrap();
        let mut resumed = OrbFibEngine::restore(settings(), limits(), restored_state);
        let replayed = feed(&mut resumed, &bars[8..]);

        assert_eq!(direct, replayed);
        assert_eq!(uninterrupted.state(), resumed.state());
    }
}
