//! Per-symbol worker task.
//!
//! One worker owns one engine and runs as an independent tokio task. Bars
//! are polled from the market-data collaborator; broker confirmations
//! arrive on an mpsc channel decoupled from bar processing; the shared
//! `DailyLimits` is the only cross-symbol state.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use orb_trade_core::config::AppConfig;
use orb_trade_core::contracts::OptionContract;
use orb_trade_core::events::{ExecutionEvent, KillReason, LifecycleEvent, Signal};
use orb_trade_core::limits::DailyLimits;
use orb_trade_core::traits::{Broker, Journal, MarketData, Notifier};
use orb_trade_engine::{EngineSettings, OrbFibEngine};
use orb_trade_execution::{ExitRules, Executor, Watcher};
use orb_trade_options::{contracts_for_risk, select_contract, SelectorInput};
use rust_decimal::Decimal;

/// External collaborators shared by every worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub market: Arc<dyn MarketData>,
    pub broker: Arc<dyn Broker>,
    pub journal: Arc<dyn Journal>,
    pub notifier: Arc<dyn Notifier>,
    pub limits: Arc<DailyLimits>,
}

/// A submitted entry bracket awaiting its fill confirmation.
struct InFlightOrder {
    order_id: String,
    contract: OptionContract,
    signal: Signal,
}

pub struct SymbolWorker {
    symbol: String,
    config: AppConfig,
    ctx: WorkerContext,
    engine: OrbFibEngine,
    executor: Executor,
    exec_rx: mpsc::Receiver<ExecutionEvent>,
    flat_all: watch::Receiver<bool>,
    /// Next bar-query start; advances past each consumed bar.
    cursor: DateTime<Utc>,
    latest_entry: Option<DateTime<Utc>>,
    in_flight: Option<InFlightOrder>,
}

impl SymbolWorker {
    #[must_use]
    pub fn new(
        symbol: String,
        config: &AppConfig,
        ctx: WorkerContext,
        exec_rx: mpsc::Receiver<ExecutionEvent>,
        flat_all: watch::Receiver<bool>,
        session_start: DateTime<Utc>,
    ) -> Self {
        let engine = OrbFibEngine::new(
            symbol.clone(),
            session_start.date_naive(),
            EngineSettings::from_config(config),
            Arc::clone(&ctx.limits),
        );
        let executor = Executor::new(Arc::clone(&ctx.broker));
        let latest_entry = config
            .session
            .latest_entry_minutes
            .map(|m| session_start + Duration::minutes(i64::from(m)));
        Self {
            symbol,
            config: config.clone(),
            ctx,
            engine,
            executor,
            exec_rx,
            flat_all,
            cursor: session_start,
            latest_entry,
            in_flight: None,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &OrbFibEngine {
        &self.engine
    }

    /// Drive the worker until shutdown. Execution events preempt the bar
    /// poll so fills are applied before the next bar.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let poll = StdDuration::from_secs(self.config.session.poll_interval_secs);
        let mut ticker = tokio::time::interval(poll);
        info!(symbol = self.symbol, "Symbol worker started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.on_tick(Utc::now()).await;
                }
                event = self.exec_rx.recv() => {
                    match event {
                        Some(event) => self.handle_execution_event(event).await,
                        None => break,
                    }
                }
                changed = self.flat_all.changed() => {
                    if changed.is_ok() && *self.flat_all.borrow() {
                        self.engine.trip_kill_switch(KillReason::Manual);
                        self.fanout(LifecycleEvent::KillSwitch {
                            symbol: Some(self.symbol.clone()),
                            reason: KillReason::Manual,
                            timestamp: Utc::now(),
                        })
                        .await;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!(symbol = self.symbol, "Symbol worker stopped");
    }

    /// One poll cycle: fetch new bars and feed them through the engine.
    pub async fn on_tick(&mut self, now: DateTime<Utc>) {
        let bars = match self
            .ctx
            .market
            .bars(
                &self.symbol,
                self.config.session.bar_interval_minutes,
                self.cursor,
                now,
            )
            .await
        {
            Ok(bars) => bars,
            Err(error) => {
                warn!(symbol = self.symbol, %error, "Bar poll failed; retrying next tick");
                return;
            }
        };
        for bar in bars {
            if bar.timestamp < self.cursor {
                continue;
            }
            self.cursor = bar.timestamp
                + Duration::minutes(i64::from(self.config.session.bar_interval_minutes));
            match self.engine.on_bar(&bar) {
                Ok(Some(signal)) => self.act_on_signal(signal).await,
                Ok(None) => {}
                Err(error) => {
                    warn!(symbol = self.symbol, %error, "Bar stream interrupted");
                }
            }
        }
    }

    /// Select, size, and submit an entry bracket for an emitted signal.
    async fn act_on_signal(&mut self, signal: Signal) {
        if let Some(cutoff) = self.latest_entry {
            if signal.timestamp > cutoff {
                self.invalidate(&signal, "past latest entry time").await;
                return;
            }
        }
        self.fanout(LifecycleEvent::SignalEmitted {
            signal: signal.clone(),
        })
        .await;

        let chain = match self.ctx.market.option_chain(&self.symbol).await {
            Ok(chain) => chain,
            Err(error) => {
                warn!(symbol = self.symbol, %error, "Option chain unavailable");
                self.invalidate(&signal, "option chain unavailable").await;
                return;
            }
        };
        let quote = match select_contract(&SelectorInput {
            chain: &chain,
            direction: signal.direction,
            config: &self.config.options,
        }) {
            Ok(quote) => quote,
            Err(error) => {
                self.invalidate(&signal, &error.to_string()).await;
                return;
            }
        };
        let quantity =
            contracts_for_risk(&self.config.risk, quote.ask, quote.contract.multiplier);
        if quantity == 0 {
            self.invalidate(&signal, "position sizes to zero").await;
            return;
        }

        match self
            .executor
            .place_entry(&signal, &quote, quantity, &self.config.risk)
            .await
        {
            Ok(ack) => {
                self.fanout(LifecycleEvent::OrderPlaced {
                    symbol: self.symbol.clone(),
                    order_id: ack.order_id.clone(),
                    option_symbol: quote.contract.display_name(),
                    quantity,
                    timestamp: ack.submitted_at,
                })
                .await;
                self.in_flight = Some(InFlightOrder {
                    order_id: ack.order_id,
                    contract: quote.contract,
                    signal,
                });
            }
            Err(error) => {
                self.engine.on_rejection(&error.to_string());
                self.fanout(LifecycleEvent::OrderRejected {
                    symbol: self.symbol.clone(),
                    reason: error.to_string(),
                    timestamp: Utc::now(),
                })
                .await;
            }
        }
    }

    /// Apply an asynchronous broker confirmation.
    pub async fn handle_execution_event(&mut self, event: ExecutionEvent) {
        match event {
            ExecutionEvent::EntryFilled {
                order_id,
                quantity,
                price,
                timestamp,
                ..
            } => {
                self.entry_filled(&order_id, quantity, price, timestamp).await;
            }
            ExecutionEvent::EntryPartiallyFilled {
                order_id,
                requested,
                filled,
                price,
                timestamp,
                ..
            } => {
                if let Err(error) = self
                    .executor
                    .resize_after_partial_fill(&self.symbol, &order_id, requested, filled)
                    .await
                {
                    error!(symbol = self.symbol, %error, "Failed to resize protective legs");
                }
                self.entry_filled(&order_id, filled, price, timestamp).await;
            }
            ExecutionEvent::Rejected { reason, .. } => {
                self.in_flight = None;
                self.engine.on_rejection(&reason);
                self.fanout(LifecycleEvent::OrderRejected {
                    symbol: self.symbol.clone(),
                    reason,
                    timestamp: Utc::now(),
                })
                .await;
            }
            ExecutionEvent::ExitFilled {
                order_id,
                quantity,
                price,
                pnl,
                reason,
                timestamp,
                ..
            } => {
                self.engine.on_exit_filled(pnl);
                self.fanout(LifecycleEvent::ExitFilled {
                    symbol: self.symbol.clone(),
                    order_id,
                    quantity,
                    price,
                    pnl,
                    reason,
                    timestamp,
                })
                .await;
                if let Some(kill) = self.ctx.limits.record_pnl(pnl) {
                    self.engine.trip_kill_switch(kill);
                    self.fanout(LifecycleEvent::KillSwitch {
                        symbol: None,
                        reason: kill,
                        timestamp: Utc::now(),
                    })
                    .await;
                }
            }
        }
    }

    async fn entry_filled(
        &mut self,
        order_id: &str,
        quantity: u32,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) {
        self.engine.on_entry_filled();
        self.fanout(LifecycleEvent::EntryFilled {
            symbol: self.symbol.clone(),
            order_id: order_id.to_string(),
            quantity,
            price,
            timestamp,
        })
        .await;
        self.spawn_watcher(quantity);
        if let Some(kill) = self.ctx.limits.record_trade() {
            self.engine.trip_kill_switch(kill);
            self.fanout(LifecycleEvent::KillSwitch {
                symbol: None,
                reason: kill,
                timestamp,
            })
            .await;
        }
    }

    /// Detach a watcher task over the filled position. The broker reports
    /// the eventual close back on the execution-event channel.
    fn spawn_watcher(&mut self, quantity: u32) {
        let Some(order) = self.in_flight.take() else {
            warn!(symbol = self.symbol, "Entry fill without a tracked order");
            return;
        };
        let rules = ExitRules::for_signal(&order.signal, self.config.risk.r_multiple_target);
        let watcher = Watcher::new(
            Arc::clone(&self.ctx.market),
            Arc::clone(&self.ctx.broker),
            order.contract,
            quantity,
            rules,
            StdDuration::from_secs(self.config.session.poll_interval_secs),
        );
        let flat_all = self.flat_all.clone();
        let symbol = self.symbol.clone();
        let order_id = order.order_id;
        tokio::spawn(async move {
            if let Err(error) = watcher.run(flat_all).await {
                error!(symbol, order_id, %error, "Watcher failed to close position");
            }
        });
    }

    async fn invalidate(&mut self, signal: &Signal, reason: &str) {
        self.engine.invalidate_signal(reason);
        self.fanout(LifecycleEvent::SignalInvalidated {
            symbol: self.symbol.clone(),
            reason: reason.to_string(),
            timestamp: signal.timestamp,
        })
        .await;
    }

    /// Journal and notify. Failures in either collaborator are logged and
    /// swallowed; they never block trading.
    async fn fanout(&self, event: LifecycleEvent) {
        if let Err(error) = self.ctx.journal.record(&event).await {
            warn!(symbol = self.symbol, %error, "Journal write failed");
        }
        if let Err(error) = self.ctx.notifier.notify(&event).await {
            warn!(symbol = self.symbol, %error, "Notifier failed");
        }
    }
}
