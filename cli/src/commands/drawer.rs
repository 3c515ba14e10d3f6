use anyhow::Context;
use posprobe_common::printer::DeviceIdentity;
use posprobe_core::service::PrinterService;
use tracing::info;

use crate::terminal::spinner;

pub async fn drawer(service: &PrinterService, target: DeviceIdentity, pulses: u32) -> anyhow::Result<()> {
    let _spinner = spinner::start(&format!("Pulsing the drawer on {target}..."));
    service
        .open_cash_drawer(&target)
        .await
        .with_context(|| format!("opening cash drawer on {target}"))?;

    info!(printer = %target, pulses, "cash drawer pulsed");
    Ok(())
}
