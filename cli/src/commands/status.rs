use anyhow::Context;
use colored::*;
use posprobe_common::printer::DeviceIdentity;
use posprobe_core::service::PrinterService;
use posprobe_protocols::status::PrinterStatus;

use crate::terminal::{colors, print, spinner};

pub async fn status(service: &PrinterService, target: DeviceIdentity, zpl: bool) -> anyhow::Result<()> {
    let _spinner = spinner::start(&format!("Asking {target} for its status..."));

    print::aligned_line("Printer", target.to_string().normal());

    if zpl {
        let reachable: bool = service
            .get_zpl_status(&target)
            .await
            .with_context(|| format!("querying ZPL status of {target}"))?;
        let value: ColoredString = match reachable {
            true => "answering".color(colors::STATUS_OK),
            false => "silent".color(colors::STATUS_BAD),
        };
        print::aligned_line("ZPL host", value);
        return Ok(());
    }

    let status: PrinterStatus = service
        .get_status(&target)
        .await
        .with_context(|| format!("querying status of {target}"))?;
    let color: Color = if status.kind.is_ok() {
        colors::STATUS_OK
    } else {
        colors::STATUS_BAD
    };
    print::aligned_line("Status", status.message().color(color));
    print::aligned_line("Code", status.code().to_string().normal());
    if let Some(raw) = status.raw {
        print::aligned_line("Raw", format!("0x{raw:02X}").normal());
    }
    Ok(())
}

pub async fn serial(service: &PrinterService, target: DeviceIdentity) -> anyhow::Result<()> {
    let serial: String = {
        let _spinner = spinner::start(&format!("Reading serial number of {target}..."));
        service
            .get_serial_number(&target)
            .await
            .with_context(|| format!("reading serial number of {target}"))?
    };

    print::aligned_line("Printer", target.to_string().normal());
    print::aligned_line("Serial", serial.color(colors::ACCENT));
    Ok(())
}
