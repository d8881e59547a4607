//! Delta-band contract selection with an at-the-money fallback.

use orb_trade_core::config::OptionsConfig;
use orb_trade_core::contracts::{OptionChain, OptionQuote, OptionRight};
use orb_trade_core::error::TradeError;
use orb_trade_core::events::Direction;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Everything the selector needs for one signal.
pub struct SelectorInput<'a> {
    pub chain: &'a OptionChain,
    pub direction: Direction,
    pub config: &'a OptionsConfig,
}

/// Pick the contract to trade for a signal.
///
/// Calls for long signals, puts for short. Candidates must pass the
/// liquidity gates (open interest, volume, a two-sided quote) and expire
/// inside the configured DTE window. Among candidates whose |delta| sits in
/// the configured band, the one nearest the target delta wins; ties go to
/// the tighter bid/ask spread. When no quote carries greeks and the ATM
/// fallback is enabled, the liquidity-passing strike nearest the underlying
/// price is used instead.
///
/// # Errors
///
/// Returns [`TradeError::NoEligibleContract`] when the chain has no
/// candidate at all.
pub fn select_contract(input: &SelectorInput<'_>) -> Result<OptionQuote, TradeError> {
    let SelectorInput {
        chain,
        direction,
        config,
    } = input;

    let right = match direction {
        Direction::Long => OptionRight::Call,
        Direction::Short => OptionRight::Put,
    };
    let as_of = chain.as_of.date_naive();

    let liquid: Vec<&OptionQuote> = chain
        .quotes
        .iter()
        .filter(|q| q.contract.right == right)
        .filter(|q| {
            let dte = q.contract.days_to_expiry(as_of);
            dte >= config.dte_min && dte <= config.dte_max
        })
        .filter(|q| q.open_interest >= config.min_open_interest && q.volume >= config.min_volume)
        .filter(|q| q.bid > Decimal::ZERO && q.ask > q.bid)
        .collect();

    let in_band = |delta: f64| {
        let d = delta.abs();
        d >= config.delta_min && d <= config.delta_max
    };

    let best = liquid
        .iter()
        .filter_map(|q| {
            let greeks = q.greeks?;
            in_band(greeks.delta).then(|| {
                let distance = (greeks.delta.abs() - config.target_delta).abs();
                (distance, *q)
            })
        })
        .min_by(|(da, qa), (db, qb)| {
            da.partial_cmp(db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| qa.spread().cmp(&qb.spread()))
        })
        .map(|(_, q)| q);

    if let Some(quote) = best {
        debug!(
            underlying = chain.underlying,
            contract = quote.contract.display_name(),
            "Selected contract in delta band"
        );
        return Ok(quote.clone());
    }

    let any_greeks = liquid.iter().any(|q| q.greeks.is_some());
    if config.atm_fallback && !any_greeks {
        let atm = liquid
            .iter()
            .min_by(|a, b| {
                let da = (a.contract.strike - chain.underlying_price).abs();
                let db = (b.contract.strike - chain.underlying_price).abs();
                da.cmp(&db).then_with(|| a.spread().cmp(&b.spread()))
            })
            .map(|q| (*q).clone());
        if let Some(quote) = atm {
            warn!(
                underlying = chain.underlying,
                contract = quote.contract.display_name(),
                "No greeks in chain; falling back to ATM strike"
            );
            return Ok(quote);
        }
    }

    Err(TradeError::NoEligibleContract {
        symbol: chain.underlying.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use orb_trade_core::contracts::{OptionContract, OptionGreeks};
    use rust_decimal_macros::dec;

    fn quote(
        strike: Decimal,
        right: OptionRight,
        delta: Option<f64>,
        bid: Decimal,
        ask: Decimal,
        oi: u64,
        vol: u64,
    ) -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new(
                "SPY",
                NaiveDate::from_ymd_opt(2025, 6, 6).unwrap(),
                strike,
                right,
            ),
            bid,
            ask,
            volume: vol,
            open_interest: oi,
            greeks: delta.map(|delta| OptionGreeks {
                delta,
                ..OptionGreeks::default()
            }),
        }
    }

    fn chain(quotes: Vec<OptionQuote>) -> OptionChain {
        OptionChain {
            underlying: "SPY".to_string(),
            underlying_price: dec!(105),
            as_of: Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0).unwrap(),
            quotes,
        }
    }

    fn config() -> OptionsConfig {
        OptionsConfig::default()
    }

    #[test]
    fn picks_nearest_to_target_delta() {
        let c = chain(vec![
            quote(dec!(104), OptionRight::Call, Some(0.44), dec!(3.0), dec!(3.2), 500, 50),
            quote(dec!(106), OptionRight::Call, Some(0.36), dec!(2.0), dec!(2.2), 500, 50),
            quote(dec!(108), OptionRight::Call, Some(0.31), dec!(1.2), dec!(1.4), 500, 50),
        ]);
        let picked = select_contract(&SelectorInput {
            chain: &c,
            direction: Direction::Long,
            config: &config(),
        })
        .unwrap();
        assert_eq!(picked.contract.strike, dec!(106));
    }

    #[test]
    fn short_signal_selects_puts() {
        let c = chain(vec![
            quote(dec!(106), OptionRight::Call, Some(0.36), dec!(2.0), dec!(2.2), 500, 50),
            quote(dec!(104), OptionRight::Put, Some(-0.36), dec!(2.0), dec!(2.2), 500, 50),
        ]);
        let picked = select_contract(&SelectorInput {
            chain: &c,
            direction: Direction::Short,
            config: &config(),
        })
        .unwrap();
        assert_eq!(picked.contract.right, OptionRight::Put);
    }

    #[test]
    fn tie_breaks_on_spread() {
        let c = chain(vec![
            quote(dec!(104), OptionRight::Call, Some(0.40), dec!(2.9), dec!(3.3), 500, 50),
            quote(dec!(106), OptionRight::Call, Some(0.30), dec!(2.0), dec!(2.1), 500, 50),
        ]);
        // Both are 0.05 from target; 106 has the tighter spread.
        let picked = select_contract(&SelectorInput {
            chain: &c,
            direction: Direction::Long,
            config: &config(),
        })
        .unwrap();
        assert_eq!(picked.contract.strike, dec!(106));
    }

    #[test]
    fn illiquid_quotes_are_excluded() {
        let c = chain(vec![
            quote(dec!(105), OptionRight::Call, Some(0.35), dec!(2.5), dec!(2.7), 10, 50),
            quote(dec!(107), OptionRight::Call, Some(0.33), dec!(1.8), dec!(2.0), 500, 2),
            quote(dec!(106), OptionRight::Call, Some(0.32), dec!(2.0), dec!(2.2), 500, 50),
        ]);
        let picked = select_contract(&SelectorInput {
            chain: &c,
            direction: Direction::Long,
            config: &config(),
        })
        .unwrap();
        assert_eq!(picked.contract.strike, dec!(106));
    }

    #[test]
    fn atm_fallback_when_chain_has_no_greeks() {
        let c = chain(vec![
            quote(dec!(103), OptionRight::Call, None, dec!(3.5), dec!(3.7), 500, 50),
            quote(dec!(105), OptionRight::Call, None, dec!(2.5), dec!(2.7), 500, 50),
            quote(dec!(108), OptionRight::Call, None, dec!(1.2), dec!(1.4), 500, 50),
        ]);
        let picked = select_contract(&SelectorInput {
            chain: &c,
            direction: Direction::Long,
            config: &config(),
        })
        .unwrap();
        assert_eq!(picked.contract.strike, dec!(105));
    }

    #[test]
    fn no_fallback_when_greeks_exist_but_none_in_band() {
        // Greeks are present, just out of band: fail rather than guess.
        let c = chain(vec![quote(
            dec!(102),
            OptionRight::Call,
            Some(0.70),
            dec!(4.0),
            dec!(4.2),
            500,
            50,
        )]);
        let err = select_contract(&SelectorInput {
            chain: &c,
            direction: Direction::Long,
            config: &config(),
        })
        .unwrap_err();
        assert!(matches!(err, TradeError::NoEligibleContract { .. }));
    }

    #[test]
    fn expired_and_far_dated_contracts_are_excluded() {
        let far = OptionQuote {
            contract: OptionContract::new(
                "SPY",
                NaiveDate::from_ymd_opt(2025, 7, 18).unwrap(),
                dec!(106),
                OptionRight::Call,
            ),
            bid: dec!(2.0),
            ask: dec!(2.2),
            volume: 50,
            open_interest: 500,
            greeks: Some(OptionGreeks {
                delta: 0.35,
                ..OptionGreeks::default()
            }),
        };
        let c = chain(vec![far]);
        let err = select_contract(&SelectorInput {
            chain: &c,
            direction: Direction::Long,
            config: &config(),
        })
        .unwrap_err();
        assert!(matches!(err, TradeError::NoEligibleContract { .. }));
    }
}
