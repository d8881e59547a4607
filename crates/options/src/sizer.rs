//! Risk-based contract sizing.

use orb_trade_core::config::RiskConfig;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

/// Number of contracts for one trade.
///
/// Risk budget is `account_equity × risk_pct_per_trade`; one contract costs
/// `premium × multiplier`. The count is the floor of budget over cost,
/// clamped to `[0, max_contracts]`. Degenerate inputs (non-positive premium,
/// multiplier, or equity) size to zero, which the caller treats as an
/// invalidated signal rather than an error.
#[must_use]
pub fn contracts_for_risk(config: &RiskConfig, premium: Decimal, multiplier: Decimal) -> u32 {
    if premium <= Decimal::ZERO
        || multiplier <= Decimal::ZERO
        || config.account_equity <= Decimal::ZERO
    {
        return 0;
    }

    let budget = config.account_equity * config.risk_pct_per_trade;
    let cost = premium * multiplier;
    let raw = (budget / cost).floor();
    let clamped = raw
        .min(Decimal::from(config.max_contracts))
        .max(Decimal::ZERO);
    let count = clamped.to_u32().unwrap_or(0);
    debug!(
        budget = %budget,
        cost = %cost,
        contracts = count,
        "Sized position"
    );
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn risk(equity: Decimal, pct: Decimal, cap: u32) -> RiskConfig {
        RiskConfig {
            account_equity: equity,
            risk_pct_per_trade: pct,
            max_contracts: cap,
            ..RiskConfig::default()
        }
    }

    #[test]
    fn floors_budget_over_cost() {
        // 100k × 1% = 1000 budget; 5.00 premium × 100 = 500 per contract.
        let cfg = risk(dec!(100000), dec!(0.01), 10);
        assert_eq!(contracts_for_risk(&cfg, dec!(5), dec!(100)), 2);
    }

    #[test]
    fn too_expensive_sizes_to_zero() {
        let cfg = risk(dec!(100000), dec!(0.01), 10);
        assert_eq!(contracts_for_risk(&cfg, dec!(2000), dec!(100)), 0);
    }

    #[test]
    fn clamps_to_max_contracts() {
        let cfg = risk(dec!(100000), dec!(0.01), 3);
        assert_eq!(contracts_for_risk(&cfg, dec!(0.50), dec!(100)), 3);
    }

    #[test]
    fn degenerate_inputs_size_to_zero() {
        let cfg = risk(dec!(100000), dec!(0.01), 10);
        assert_eq!(contracts_for_risk(&cfg, dec!(0), dec!(100)), 0);
        assert_eq!(contracts_for_risk(&cfg, dec!(-1), dec!(100)), 0);
        assert_eq!(contracts_for_risk(&cfg, dec!(5), dec!(0)), 0);
        let broke = risk(dec!(0), dec!(0.01), 10);
        assert_eq!(contracts_for_risk(&broke, dec!(5), dec!(100)), 0);
    }
}
