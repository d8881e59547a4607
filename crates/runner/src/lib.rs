//! Per-symbol worker orchestration and the journal/notifier
//! implementations.

pub mod journal;
pub mod notify;
pub mod worker;

pub use journal::CsvJournal;
pub use notify::LogNotifier;
pub use worker::{SymbolWorker, WorkerContext};
