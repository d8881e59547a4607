//! Order placement and open-position supervision.
//!
//! [`Executor`] turns a sized signal into a premium bracket order and owns
//! the broker error mapping; [`Watcher`] polls the underlying while a
//! position is open and closes it on the first exit rule that fires.

pub mod executor;
pub mod watcher;

pub use executor::Executor;
pub use watcher::{ExitRules, Watcher};
