//! The ORB+Fib decision core.
//!
//! Per-symbol, per-day session state machine: opening range → breakout
//! confirmation → Fibonacci pullback → MACD curl → signal. All transitions
//! are synchronous; fills and exits arrive later through explicit methods.

pub mod engine;
pub mod fib;
pub mod session;

pub use engine::{EngineSettings, OrbFibEngine};
pub use fib::FibLevels;
pub use session::{BreakoutEvent, OpeningRange, Phase, SessionState};
