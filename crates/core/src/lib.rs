pub mod config;
pub mod config_loader;
pub mod contracts;
pub mod error;
pub mod events;
pub mod limits;
pub mod traits;

pub use config::{
    AppConfig, EngineConfig, LimitsConfig, MacdConfig, OptionsConfig, RiskConfig, SessionConfig,
};
pub use config_loader::ConfigLoader;
pub use contracts::{
    BracketOrder, EntryType, OptionChain, OptionContract, OptionGreeks, OptionQuote, OptionRight,
    OrderAck, OrderSide,
};
pub use error::TradeError;
pub use events::{
    Bar, Direction, ExecutionEvent, ExitReason, KillReason, LifecycleEvent, Signal,
};
pub use limits::DailyLimits;
pub use traits::{Broker, Journal, MarketData, Notifier};
