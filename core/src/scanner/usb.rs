//! USB phase: every attached device with a printer-class interface.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use posprobe_common::printer::{DiscoveredPrinter, UsbParams};
use tracing::{debug, info, trace, warn};

use crate::scanner::{DiscoveryPhase, PhaseContext, PhaseKind, ScanListener};
use crate::usb::{self, UsbDevice, UsbHost};

/// Blocking enumeration. A device whose interfaces cannot be read is skipped.
pub fn enumerate_printers(host: &dyn UsbHost) -> anyhow::Result<Vec<DiscoveredPrinter>> {
    let devices: Vec<UsbDevice> = host.devices()?;
    debug!(devices = devices.len(), "enumerated USB bus");

    let mut printers: Vec<DiscoveredPrinter> = Vec::new();
    for device in devices {
        match usb::is_printer(host, &device) {
            Ok(true) => {}
            Ok(false) => {
                trace!(path = %device.path, "not a printer");
                continue;
            }
            Err(e) => {
                warn!(path = %device.path, error = %e, "could not read USB interfaces, skipping device");
                continue;
            }
        }

        let serial_number: Option<String> = if host.has_permission(&device) {
            host.serial_number(&device)
        } else {
            None
        };

        printers.push(DiscoveredPrinter::usb(UsbParams {
            vendor_id: device.vendor_id,
            product_id: device.product_id,
            serial_number,
            manufacturer: device.manufacturer,
            product_name: device.product_name,
        }));
    }

    Ok(printers)
}

pub struct UsbPrinterScanner {
    host: Arc<dyn UsbHost>,
}

impl UsbPrinterScanner {
    pub fn new(host: Arc<dyn UsbHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl DiscoveryPhase for UsbPrinterScanner {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Usb
    }

    async fn run(&self, context: &PhaseContext, listener: Arc<dyn ScanListener>) -> anyhow::Result<()> {
        let host: Arc<dyn UsbHost> = self.host.clone();
        let enumerated: anyhow::Result<Vec<DiscoveredPrinter>> =
            tokio::task::spawn_blocking(move || enumerate_printers(host.as_ref()))
                .await
                .context("USB enumeration task failed")
                .and_then(|printers| printers);

        let printers: Vec<DiscoveredPrinter> = match enumerated {
            Ok(printers) => printers,
            Err(e) => {
                listener.on_finish();
                return Err(e);
            }
        };

        info!(count = printers.len(), "USB printers found");
        for printer in printers {
            listener.on_found(context.decorate(printer).await);
        }

        listener.on_finish();
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
