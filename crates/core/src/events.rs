use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV bar. Bars for a symbol form an append-only sequence
/// within a session, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Trade direction on the underlying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Entry intent emitted by the engine. At most one per active breakout
/// until consumed or invalidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    /// Underlying reference price at the tagged fib level.
    pub entry: Decimal,
    /// Underlying stop reference (0.786 level or opposing swing).
    pub stop: Decimal,
    /// Underlying target ladder, nearest first.
    pub targets: Vec<Decimal>,
    /// Retracement ratio that triggered the entry (0.5 or 0.618).
    pub fib_level: Decimal,
    pub macd_confirmed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Asynchronous confirmations from the broker, delivered on a channel
/// decoupled from bar processing. Fills may arrive several bars after
/// the signal that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
    EntryFilled {
        order_id: String,
        symbol: String,
        quantity: u32,
        price: Decimal,
        timestamp: DateTime<Utc>,
    },
    /// Entry filled for fewer contracts than requested. Protective legs
    /// must be resized to the filled quantity.
    EntryPartiallyFilled {
        order_id: String,
        symbol: String,
        requested: u32,
        filled: u32,
        price: Decimal,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        order_id: String,
        symbol: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    ExitFilled {
        order_id: String,
        symbol: String,
        quantity: u32,
        price: Decimal,
        pnl: Decimal,
        reason: ExitReason,
        timestamp: DateTime<Utc>,
    },
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    HardStop,
    BoundaryRetest,
    FibExtension,
    RMultiple,
    FlatAll,
    KillSwitch,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HardStop => write!(f, "hard_stop"),
            Self::BoundaryRetest => write!(f, "boundary_retest"),
            Self::FibExtension => write!(f, "fib_extension"),
            Self::RMultiple => write!(f, "r_multiple"),
            Self::FlatAll => write!(f, "flat_all"),
            Self::KillSwitch => write!(f, "kill_switch"),
        }
    }
}

/// Why the kill switch tripped. Logged distinctly from normal exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillReason {
    DailyLossLimit,
    MaxTradesPerDay,
    Manual,
}

impl std::fmt::Display for KillReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyLossLimit => write!(f, "daily_loss_limit"),
            Self::MaxTradesPerDay => write!(f, "max_trades_per_day"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Trade lifecycle events fanned out to the journal and notifier
/// collaborators. Failures recording these never block trading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
    SignalEmitted {
        signal: Signal,
    },
    OrderPlaced {
        symbol: String,
        order_id: String,
        option_symbol: String,
        quantity: u32,
        timestamp: DateTime<Utc>,
    },
    OrderRejected {
        symbol: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    SignalInvalidated {
        symbol: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    EntryFilled {
        symbol: String,
        order_id: String,
        quantity: u32,
        price: Decimal,
        timestamp: DateTime<Utc>,
    },
    ExitFilled {
        symbol: String,
        order_id: String,
        quantity: u32,
        price: Decimal,
        pnl: Decimal,
        reason: ExitReason,
        timestamp: DateTime<Utc>,
    },
    KillSwitch {
        symbol: Option<String>,
        reason: KillReason,
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    /// Short tag for journal rows and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignalEmitted { .. } => "signal_emitted",
            Self::OrderPlaced { .. } => "order_placed",
            Self::OrderRejected { .. } => "order_rejected",
            Self::SignalInvalidated { .. } => "signal_invalidated",
            Self::EntryFilled { .. } => "entry_filled",
            Self::ExitFilled { .. } => "exit_filled",
            Self::KillSwitch { .. } => "kill_switch",
        }
    }

    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::SignalEmitted { signal } => Some(&signal.symbol),
            Self::OrderPlaced { symbol, .. }
            | Self::OrderRejected { symbol, .. }
            | Self::SignalInvalidated { symbol, .. }
            | Self::EntryFilled { symbol, .. }
            | Self::ExitFilled { symbol, .. } => Some(symbol),
            Self::KillSwitch { symbol, .. } => symbol.as_deref(),
        }
    }
}
