//! Process-wide daily kill-switch counters.
//!
//! One instance per trading day, created at session start and shared across
//! all symbol workers. Multiple workers may report exits concurrently, so
//! updates go through atomics and a mutex rather than ambient globals.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::config::LimitsConfig;
use crate::events::KillReason;

#[derive(Debug)]
pub struct DailyLimits {
    session_date: NaiveDate,
    max_trades_per_day: u32,
    daily_loss_limit: Decimal,
    trades: AtomicU32,
    realized_pnl: Mutex<Decimal>,
    tripped: AtomicBool,
}

impl DailyLimits {
    #[must_use]
    pub fn new(session_date: NaiveDate, config: &LimitsConfig) -> Self {
        Self {
            session_date,
            max_trades_per_day: config.max_trades_per_day,
            daily_loss_limit: config.daily_loss_limit,
            trades: AtomicU32::new(0),
            realized_pnl: Mutex::new(Decimal::ZERO),
            tripped: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn session_date(&self) -> NaiveDate {
        self.session_date
    }

    /// Count a filled entry. Returns the kill reason if this trade reaches
    /// the daily cap.
    pub fn record_trade(&self) -> Option<KillReason> {
        let taken = self.trades.fetch_add(1, Ordering::SeqCst) + 1;
        if taken >= self.max_trades_per_day {
            self.trip(KillReason::MaxTradesPerDay);
            return Some(KillReason::MaxTradesPerDay);
        }
        None
    }

    /// Fold a realized P&L into the aggregate. Returns the kill reason if
    /// the aggregate loss breaches the daily limit.
    pub fn record_pnl(&self, pnl: Decimal) -> Option<KillReason> {
        let mut total = self
            .realized_pnl
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *total += pnl;
        if *total <= -self.daily_loss_limit {
            drop(total);
            self.trip(KillReason::DailyLossLimit);
            return Some(KillReason::DailyLossLimit);
        }
        None
    }

    pub fn trip(&self, reason: KillReason) {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                session_date = %self.session_date,
                reason = %reason,
                "Kill switch tripped; halting signal emission for the day"
            );
        }
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn trades_taken(&self) -> u32 {
        self.trades.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn realized_pnl(&self) -> Decimal {
        *self
            .realized_pnl
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
