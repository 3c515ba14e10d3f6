//! USB hot-plug tracking by periodic bus snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use posprobe_common::config::Config;
use posprobe_common::printer::DiscoveredPrinter;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::discovery::DiscoveryEvent;
use crate::scanner::usb::enumerate_printers;
use crate::usb::UsbHost;

type Snapshot = BTreeMap<String, DiscoveredPrinter>;

pub struct UsbWatcher {
    host: Arc<dyn UsbHost>,
    interval: Duration,
}

impl UsbWatcher {
    pub fn new(host: Arc<dyn UsbHost>, config: &Config) -> Self {
        Self {
            host,
            interval: config.usb_watch_interval,
        }
    }

    /// Takes the baseline snapshot, then reports `PrinterAttached` and
    /// `PrinterDetached` for every later change until `cancel` fires.
    /// Printers present at start are not reported.
    pub async fn start(self: Arc<Self>, cancel: CancellationToken) -> mpsc::UnboundedReceiver<DiscoveryEvent> {
        let (tx, rx) = mpsc::unbounded_channel::<DiscoveryEvent>();
        let baseline: Snapshot = self.snapshot().await.unwrap_or_else(|e| {
            debug!(error = %e, "no USB baseline");
            Snapshot::new()
        });
        debug!(printers = baseline.len(), "USB watch baseline");

        tokio::spawn(async move {
            self.watch(baseline, tx, cancel).await;
        });
        rx
    }

    async fn watch(&self, mut known: Snapshot, events: mpsc::UnboundedSender<DiscoveryEvent>, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let current: Snapshot = match self.snapshot().await {
                Ok(current) => current,
                Err(e) => {
                    debug!(error = %e, "USB snapshot failed");
                    continue;
                }
            };

            for change in diff(&known, &current) {
                if let DiscoveryEvent::PrinterAttached(printer) = &change {
                    info!(id = %printer.id, "USB printer attached");
                }
                if let DiscoveryEvent::PrinterDetached(id) = &change {
                    info!(%id, "USB printer detached");
                }
                if events.send(change).is_err() {
                    return;
                }
            }
            known = current;
        }
        debug!("USB watch stopped");
    }

    async fn snapshot(&self) -> anyhow::Result<Snapshot> {
        let host: Arc<dyn UsbHost> = self.host.clone();
        let printers: Vec<DiscoveredPrinter> = tokio::task::spawn_blocking(move || enumerate_printers(host.as_ref()))
            .await
            .context("USB snapshot task failed")??;
        Ok(printers.into_iter().map(|printer| (printer.id.clone(), printer)).collect())
    }
}

/// Attachments first, then detachments, each in id order.
fn diff(before: &Snapshot, after: &Snapshot) -> Vec<DiscoveryEvent> {
    let attached = after
        .iter()
        .filter(|(id, _)| !before.contains_key(*id))
        .map(|(_, printer)| DiscoveryEvent::PrinterAttached(printer.clone()));
    let detached = before
        .keys()
        .filter(|id| !after.contains_key(*id))
        .map(|id| DiscoveryEvent::PrinterDetached(id.clone()));
    attached.chain(detached).collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
