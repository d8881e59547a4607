//! Open-position supervision on the underlying.
//!
//! The premium hard stop lives at the broker as a bracket leg; everything
//! else is decided here from polled underlying prices. Rules are checked in
//! priority order so one poll produces at most one exit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use orb_trade_core::contracts::OptionContract;
use orb_trade_core::events::{Direction, ExitReason, Signal};
use orb_trade_core::traits::{Broker, MarketData};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{info, warn};

/// Underlying-price exit rules for one open position. All rules are
/// profit-side; the loss side is the premium stop leg already resting at
/// the broker.
///
/// Priority: retest of the breakout leg's extreme (anchor B, the nearest
/// target), then the fib extensions, then the optional R-multiple.
#[derive(Debug, Clone)]
pub struct ExitRules {
    pub direction: Direction,
    /// Anchor B of the breakout leg (session high for longs, low for
    /// shorts); the nearest profit target.
    pub retest: Decimal,
    pub ext_1272: Decimal,
    pub ext_1618: Decimal,
    pub entry: Decimal,
    pub stop: Decimal,
    pub r_multiple: Option<Decimal>,
}

impl ExitRules {
    /// Derive rules from an emitted signal. The signal's target ladder is
    /// `[anchor B retest, 1.272 ext, 1.618 ext]`, nearest first.
    #[must_use]
    pub fn for_signal(signal: &Signal, r_multiple: Option<Decimal>) -> Self {
        let mut targets = signal.targets.iter().copied();
        let retest = targets.next().unwrap_or(signal.entry);
        let ext_1272 = targets.next().unwrap_or(retest);
        let ext_1618 = targets.next().unwrap_or(ext_1272);
        Self {
            direction: signal.direction,
            retest,
            ext_1272,
            ext_1618,
            entry: signal.entry,
            stop: signal.stop,
            r_multiple,
        }
    }

    /// First rule the price triggers, if any.
    #[must_use]
    pub fn check_exit(&self, price: Decimal) -> Option<ExitReason> {
        match self.direction {
            Direction::Long => {
                if price >= self.retest {
                    return Some(ExitReason::BoundaryRetest);
                }
                if price >= self.ext_1272 {
                    return Some(ExitReason::FibExtension);
                }
                if let Some(r) = self.r_multiple {
                    if price >= self.entry + (self.entry - self.stop) * r {
                        return Some(ExitReason::RMultiple);
                    }
                }
            }
            Direction::Short => {
                if price <= self.retest {
                    return Some(ExitReason::BoundaryRetest);
                }
                if price <= self.ext_1272 {
                    return Some(ExitReason::FibExtension);
                }
                if let Some(r) = self.r_multiple {
                    if price <= self.entry - (self.stop - self.entry) * r {
                        return Some(ExitReason::RMultiple);
                    }
                }
            }
        }
        None
    }
}

/// Polls the underlying while a position is open and market-closes it on
/// the first triggered exit rule or a flat-all broadcast.
pub struct Watcher {
    market: Arc<dyn MarketData>,
    broker: Arc<dyn Broker>,
    contract: OptionContract,
    quantity: u32,
    rules: ExitRules,
    poll_interval: Duration,
}

impl Watcher {
    #[must_use]
    pub fn new(
        market: Arc<dyn MarketData>,
        broker: Arc<dyn Broker>,
        contract: OptionContract,
        quantity: u32,
        rules: ExitRules,
        poll_interval: Duration,
    ) -> Self {
        Self {
            market,
            broker,
            contract,
            quantity,
            rules,
            poll_interval,
        }
    }

    /// Supervise until the position closes. Resolves with the exit reason.
    ///
    /// A `true` on `flat_all` closes immediately with
    /// [`ExitReason::FlatAll`]; a dropped sender just disables that branch.
    /// Price-poll failures are logged and retried on the next tick.
    ///
    /// # Errors
    ///
    /// Only the broker close itself can fail; a position that cannot be
    /// closed is a fatal condition for the worker.
    pub async fn run(self, mut flat_all: watch::Receiver<bool>) -> Result<ExitReason> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut flat_all_open = true;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let price = match self.market.latest_price(&self.contract.underlying).await {
                        Ok(price) => price,
                        Err(error) => {
                            warn!(
                                symbol = self.contract.underlying,
                                %error,
                                "Price poll failed; retrying next tick"
                            );
                            continue;
                        }
                    };
                    if let Some(reason) = self.rules.check_exit(price) {
                        info!(
                            symbol = self.contract.underlying,
                            price = %price,
                            reason = %reason,
                            "Exit rule triggered; closing position"
                        );
                        self.broker
                            .close_position(&self.contract, self.quantity, reason)
                            .await?;
                        return Ok(reason);
                    }
                }
                changed = flat_all.changed(), if flat_all_open => {
                    match changed {
                        Ok(()) if *flat_all.borrow() => {
                            info!(
                                symbol = self.contract.underlying,
                                "Flat-all received; closing position"
                            );
                            self.broker
                                .close_position(&self.contract, self.quantity, ExitReason::FlatAll)
                                .await?;
                            return Ok(ExitReason::FlatAll);
                        }
                        Ok(()) => {}
                        Err(_) => flat_all_open = false,
                    }
                }
            }
        }
    }
}
