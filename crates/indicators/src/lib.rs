//! Pure indicator computations over bar sequences.
//!
//! All price arithmetic uses `rust_decimal::Decimal`; "at/near a level"
//! comparisons go through the basis-point tolerance in [`tolerance`].

pub mod macd;
pub mod swing;
pub mod tolerance;

pub use macd::{compute_macd, Macd, MacdPoint};
pub use swing::{SwingDetector, SwingKind, SwingPoint};
pub use tolerance::{tolerance, within_bps};
