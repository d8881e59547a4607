use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub engine: EngineConfig,
    pub macd: MacdConfig,
    pub options: OptionsConfig,
    pub risk: RiskConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bar interval the engine consumes.
    pub bar_interval_minutes: u32,
    /// Watcher / worker polling cadence.
    pub poll_interval_secs: u64,
    /// No new entries after this many minutes into the session.
    pub latest_entry_minutes: Option<u32>,
    pub symbols: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bar_interval_minutes: 5,
            poll_interval_secs: 5,
            latest_entry_minutes: Some(300),
            symbols: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Opening range window duration (e.g., 15/30/60).
    pub orb_minutes: u32,
    /// Tolerance band in basis points for "at/near a fib level" tests.
    pub fib_tolerance_bps: u32,
    /// Bars allowed for the MACD curl after the pullback tag.
    pub macd_confirm_bars: u32,
    /// Bars allowed for the pullback tag after breakout confirmation.
    pub pullback_timeout_bars: u32,
    /// Whether a symbol may re-arm after going flat.
    pub allow_multiple_signals: bool,
    /// Bars on each side of a candidate for swing confirmation.
    pub swing_lookback: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            orb_minutes: 30,
            fib_tolerance_bps: 10,
            macd_confirm_bars: 6,
            pullback_timeout_bars: 12,
            allow_multiple_signals: false,
            swing_lookback: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    pub target_delta: f64,
    pub delta_min: f64,
    pub delta_max: f64,
    pub min_open_interest: u64,
    pub min_volume: u64,
    /// Accepted days-to-expiry window.
    pub dte_min: i64,
    pub dte_max: i64,
    /// Fall back to the at-the-money strike when no quote carries greeks.
    pub atm_fallback: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            target_delta: 0.35,
            delta_min: 0.30,
            delta_max: 0.45,
            min_open_interest: 100,
            min_volume: 10,
            dte_min: 0,
            dte_max: 7,
            atm_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub account_equity: Decimal,
    /// Fraction of equity risked per trade (0.01 = 1%).
    pub risk_pct_per_trade: Decimal,
    pub max_contracts: u32,
    /// Bracket stop on the option premium: stop = premium × (1 − pct).
    pub option_hard_stop_pct: Decimal,
    /// Optional R-multiple exit target (e.g., 2 = 2R).
    pub r_multiple_target: Option<Decimal>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_equity: Decimal::from(100_000),
            risk_pct_per_trade: Decimal::new(1, 2),
            max_contracts: 10,
            option_hard_stop_pct: Decimal::new(5, 1),
            r_multiple_target: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Aggregate realized loss that halts the day.
    pub daily_loss_limit: Decimal,
    pub max_trades_per_day: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: Decimal::from(1_000),
            max_trades_per_day: 3,
        }
    }
}
