//! Option contract selection and position sizing.
//!
//! The engine emits underlying-price signals; this crate maps them onto a
//! tradeable contract (delta-band selection with an ATM fallback) and a
//! contract count bounded by per-trade risk.

pub mod selector;
pub mod sizer;

pub use selector::{select_contract, SelectorInput};
pub use sizer::contracts_for_risk;
