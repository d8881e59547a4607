//! CSV trade-lifecycle journal.

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::Writer;
use orb_trade_core::events::LifecycleEvent;
use orb_trade_core::traits::Journal;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

/// Appends one row per lifecycle event and flushes per write, so rows
/// survive a crash mid-session. Callers treat write failures as non-fatal.
pub struct CsvJournal {
    writer: Mutex<Writer<File>>,
}

impl CsvJournal {
    /// Open (or create) the journal file. A header row is written only when
    /// the file is new.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or the header write
    /// fails.
    pub fn open(path: &Path) -> Result<Self> {
        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open journal file: {}", path.display()))?;
        let mut writer = Writer::from_writer(file);
        if is_new {
            writer.write_record([
                "timestamp", "kind", "symbol", "order_id", "quantity", "price", "pnl", "detail",
            ])?;
            writer.flush()?;
        }
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    fn row(event: &LifecycleEvent) -> [String; 8] {
        let kind = event.kind().to_string();
        let symbol = event.symbol().unwrap_or("").to_string();
        match event {
            LifecycleEvent::SignalEmitted { signal } => [
                signal.timestamp.to_rfc3339(),
                kind,
                symbol,
                String::new(),
                String::new(),
                signal.entry.to_string(),
                String::new(),
                format!(
                    "{} fib={} stop={}",
                    signal.direction, signal.fib_level, signal.stop
                ),
            ],
            LifecycleEvent::OrderPlaced {
                order_id,
                option_symbol,
                quantity,
                timestamp,
                ..
            } => [
                timestamp.to_rfc3339(),
                kind,
                symbol,
                order_id.clone(),
                quantity.to_string(),
                String::new(),
                String::new(),
                option_symbol.clone(),
            ],
            LifecycleEvent::OrderRejected {
                reason, timestamp, ..
            }
            | LifecycleEvent::SignalInvalidated {
                reason, timestamp, ..
            } => [
                timestamp.to_rfc3339(),
                kind,
                symbol,
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                reason.clone(),
            ],
            LifecycleEvent::EntryFilled {
                order_id,
                quantity,
                price,
                timestamp,
                ..
            } => [
                timestamp.to_rfc3339(),
                kind,
                symbol,
                order_id.clone(),
                quantity.to_string(),
                price.to_string(),
                String::new(),
                String::new(),
            ],
            LifecycleEvent::ExitFilled {
                order_id,
                quantity,
                price,
                pnl,
                reason,
                timestamp,
                ..
            } => [
                timestamp.to_rfc3339(),
                kind,
                symbol,
                order_id.clone(),
                quantity.to_string(),
                price.to_string(),
                pnl.to_string(),
                reason.to_string(),
            ],
            LifecycleEvent::KillSwitch {
                reason, timestamp, ..
            } => [
                timestamp.to_rfc3339(),
                kind,
                symbol,
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                reason.to_string(),
            ],
        }
    }
}

#[async_trait]
impl Journal for CsvJournal {
    async fn record(&self, event: &LifecycleEvent) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writer.write_record(Self::row(event))?;
        writer.flush()?;
        Ok(())
    }
}
