//! Fibonacci retracement and extension grid for a breakout leg.

use orb_trade_core::events::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Levels derived from the breakout leg: anchor A is the opening-range
/// extreme opposite the breakout, anchor B the breakout confirmation
/// extreme. Computed once per breakout and immutable until a new breakout
/// invalidates the leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibLevels {
    pub direction: Direction,
    pub anchor_a: Decimal,
    pub anchor_b: Decimal,
    pub retrace_50: Decimal,
    pub retrace_618: Decimal,
    pub retrace_786: Decimal,
    pub ext_1272: Decimal,
    pub ext_1618: Decimal,
}

impl FibLevels {
    #[must_use]
    pub fn from_leg(direction: Direction, anchor_a: Decimal, anchor_b: Decimal) -> Self {
        let diff = anchor_b - anchor_a;
        let retrace = |ratio: Decimal| anchor_b - diff * ratio;
        let extend = |ratio: Decimal| anchor_b + diff * ratio;
        Self {
            direction,
            anchor_a,
            anchor_b,
            retrace_50: retrace(Decimal::new(5, 1)),
            retrace_618: retrace(Decimal::new(618, 3)),
            retrace_786: retrace(Decimal::new(786, 3)),
            ext_1272: extend(Decimal::new(272, 3)),
            ext_1618: extend(Decimal::new(618, 3)),
        }
    }
}
