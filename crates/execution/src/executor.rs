//! Bracket construction and broker submission.

use std::sync::Arc;

use orb_trade_core::config::RiskConfig;
use orb_trade_core::contracts::{BracketOrder, EntryType, OptionQuote, OrderAck, OrderSide};
use orb_trade_core::error::TradeError;
use orb_trade_core::events::Signal;
use orb_trade_core::traits::Broker;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Thin submission layer over the broker. Every order is a long-premium
/// bracket (buy calls for long signals, buy puts for short), so the hard
/// stop and optional target are premium prices on the same contract.
pub struct Executor {
    broker: Arc<dyn Broker>,
}

impl Executor {
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Build the premium bracket for a sized signal.
    ///
    /// Entry is a limit at the ask. The stop leg sits at
    /// `premium × (1 − option_hard_stop_pct)`; the target leg exists only
    /// when an R-multiple target is configured and mirrors the stop
    /// distance scaled by R.
    #[must_use]
    pub fn build_bracket(quote: &OptionQuote, quantity: u32, risk: &RiskConfig) -> BracketOrder {
        let premium = quote.ask;
        let stop_distance = premium * risk.option_hard_stop_pct;
        let stop_price = premium - stop_distance;
        let target_price = risk
            .r_multiple_target
            .map(|r| premium + stop_distance * r);
        BracketOrder {
            contract: quote.contract.clone(),
            side: OrderSide::Buy,
            quantity,
            entry: EntryType::Limit { price: premium },
            stop_price,
            target_price,
        }
    }

    /// Submit the entry bracket.
    ///
    /// # Errors
    ///
    /// Broker failures surface as [`TradeError::BrokerRejection`]. The
    /// caller discards the signal; rejected orders are never retried.
    pub async fn place_entry(
        &self,
        signal: &Signal,
        quote: &OptionQuote,
        quantity: u32,
        risk: &RiskConfig,
    ) -> Result<OrderAck, TradeError> {
        let order = Self::build_bracket(quote, quantity, risk);
        info!(
            symbol = signal.symbol,
            contract = order.contract.display_name(),
            quantity,
            stop = %order.stop_price,
            "Placing entry bracket"
        );
        self.broker
            .place_bracket(&order)
            .await
            .map_err(|e| TradeError::BrokerRejection {
                symbol: signal.symbol.clone(),
                reason: e.to_string(),
            })
    }

    /// Shrink the protective legs to the filled quantity after a partial
    /// entry fill.
    ///
    /// # Errors
    ///
    /// Returns [`TradeError::BrokerRejection`] when the amendment fails;
    /// the position is then left for the watcher to flatten.
    pub async fn resize_after_partial_fill(
        &self,
        symbol: &str,
        order_id: &str,
        requested: u32,
        filled: u32,
    ) -> Result<(), TradeError> {
        warn!(
            symbol,
            order_id, requested, filled, "Partial entry fill; resizing protective legs"
        );
        self.broker
            .amend_bracket_quantity(order_id, filled)
            .await
            .map_err(|e| TradeError::BrokerRejection {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })
    }

    /// Cancel a working entry that was invalidated before filling.
    ///
    /// # Errors
    ///
    /// Returns [`TradeError::BrokerRejection`] when the cancel fails.
    pub async fn cancel_entry(&self, symbol: &str, order_id: &str) -> Result<(), TradeError> {
        self.broker
            .cancel_order(order_id)
            .await
            .map_err(|e| TradeError::BrokerRejection {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use orb_trade_core::contracts::{OptionContract, OptionRight};
    use orb_trade_core::events::{Direction, ExitReason};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct MockBroker {
        placed: Mutex<Vec<BracketOrder>>,
        amended: Mutex<Vec<(String, u32)>>,
        reject: bool,
    }

    impl MockBroker {
        fn new(reject: bool) -> Self {
            Self {
                placed: Mutex::new(vec![]),
                amended: Mutex::new(vec![]),
                reject,
            }
        }
    }

    #[async_trait]
    impl Broker for MockBroker {
        async fn place_bracket(&self, order: &BracketOrder) -> Result<OrderAck> {
            if self.reject {
                bail!("insufficient buying power");
            }
            self.placed.lock().unwrap().push(order.clone());
            Ok(OrderAck {
                order_id: "ord-1".to_string(),
                submitted_at: Utc::now(),
            })
        }

        async fn amend_bracket_quantity(&self, order_id: &str, quantity: u32) -> Result<()> {
            self.amended
                .lock()
                .unwrap()
                .push((order_id.to_string(), quantity));
            Ok(())
        }

        async fn cancel_order(&self, _order_id: &str) -> Result<()> {
            Ok(())
        }

        async fn close_position(
            &self,
            _contract: &OptionContract,
            _quantity: u32,
            _reason: ExitReason,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn quote() -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new(
                "SPY",
                NaiveDate::from_ymd_opt(2025, 6, 6).unwrap(),
                dec!(106),
                OptionRight::Call,
            ),
            bid: dec!(4.8),
            ask: dec!(5.0),
            volume: 50,
            open_interest: 500,
            greeks: None,
        }
    }

    fn signal() -> Signal {
        Signal {
            symbol: "SPY".to_string(),
            direction: Direction::Long,
            entry: dec!(105),
            stop: dec!(100),
            targets: vec![dec!(110), dec!(112.72), dec!(116.18)],
            fib_level: dec!(0.5),
            macd_confirmed: true,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 14, 15, 0).unwrap(),
        }
    }

    #[test]
    fn bracket_stop_from_hard_stop_pct() {
        let risk = RiskConfig {
            option_hard_stop_pct: dec!(0.5),
            r_multiple_target: Some(dec!(2)),
            ..RiskConfig::default()
        };
        let order = Executor::build_bracket(&quote(), 2, &risk);
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.quantity, 2);
        assert_eq!(order.entry, EntryType::Limit { price: dec!(5.0) });
        assert_eq!(order.stop_price, dec!(2.5));
        // Stop distance 2.5 × 2R above the 5.0 entry.
        assert_eq!(order.target_price, Some(dec!(10.0)));
    }

    #[test]
    fn no_target_leg_without_r_multiple() {
        let risk = RiskConfig {
            r_multiple_target: None,
            ..RiskConfig::default()
        };
        let order = Executor::build_bracket(&quote(), 1, &risk);
        assert_eq!(order.target_price, None);
    }

    #[tokio::test]
    async fn placement_reaches_broker() {
        let broker = Arc::new(MockBroker::new(false));
        let exec = Executor::new(Arc::clone(&broker) as Arc<dyn Broker>);
        let ack = exec
            .place_entry(&signal(), &quote(), 2, &RiskConfig::default())
            .await
            .unwrap();
        assert_eq!(ack.order_id, "ord-1");
        let placed = broker.placed.lock().unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].quantity, 2);
    }

    #[tokio::test]
    async fn rejection_maps_to_trade_error() {
        let broker = Arc::new(MockBroker::new(true));
        let exec = Executor::new(broker as Arc<dyn Broker>);
        let err = exec
            .place_entry(&signal(), &quote(), 2, &RiskConfig::default())
            .await
            .unwrap_err();
        match err {
            TradeError::BrokerRejection { symbol, reason } => {
                assert_eq!(symbol, "SPY");
                assert!(reason.contains("insufficient buying power"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn partial_fill_amends_to_filled_quantity() {
        let broker = Arc::new(MockBroker::new(false));
        let exec = Executor::new(Arc::clone(&broker) as Arc<dyn Broker>);
        exec.resize_after_partial_fill("SPY", "ord-1", 5, 3)
            .await
            .unwrap();
        let amended = broker.amended.lock().unwrap();
        assert_eq!(amended.as_slice(), &[("ord-1".to_string(), 3)]);
    }
}
