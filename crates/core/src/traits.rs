//! Capability contracts for the external collaborators. A mock and a real
//! adapter are interchangeable without touching engine logic.

use crate::contracts::{BracketOrder, OptionChain, OptionContract, OrderAck};
use crate::events::{Bar, ExitReason, LifecycleEvent};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Bar and option-chain supplier (historical backfill + live polling).
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn bars(
        &self,
        symbol: &str,
        interval_minutes: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>>;

    async fn option_chain(&self, symbol: &str) -> Result<OptionChain>;

    async fn latest_price(&self, symbol: &str) -> Result<Decimal>;
}

/// Bracket-order placement. Fills, rejections, and cancellations are
/// reported asynchronously on the broker's execution-event channel.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn place_bracket(&self, order: &BracketOrder) -> Result<OrderAck>;

    /// Resize the protective legs after a partial entry fill.
    async fn amend_bracket_quantity(&self, order_id: &str, quantity: u32) -> Result<()>;

    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    /// Market-close an open position.
    async fn close_position(
        &self,
        contract: &OptionContract,
        quantity: u32,
        reason: ExitReason,
    ) -> Result<()>;
}

/// Durable trade-lifecycle storage. Write failures are non-fatal: callers
/// log and continue.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn record(&self, event: &LifecycleEvent) -> Result<()>;
}

/// Optional alerting. Failures here must never block trading logic.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &LifecycleEvent) -> Result<()>;
}
