//! Notifier that writes lifecycle events to the log stream.
//!
//! Stands behind the `Notifier` seam so a Slack or email transport can
//! replace it without touching the worker.

use anyhow::Result;
use async_trait::async_trait;
use orb_trade_core::events::LifecycleEvent;
use orb_trade_core::traits::Notifier;
use tracing::{info, warn};

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &LifecycleEvent) -> Result<()> {
        let symbol = event.symbol().unwrap_or("-");
        match event {
            LifecycleEvent::OrderRejected { reason, .. } => {
                warn!(symbol, kind = event.kind(), reason = reason.as_str(), "Trade alert");
            }
            LifecycleEvent::KillSwitch { reason, .. } => {
                warn!(symbol, kind = event.kind(), reason = %reason, "Trade alert");
            }
            _ => {
                info!(symbol, kind = event.kind(), "Trade alert");
            }
        }
        Ok(())
    }
}
