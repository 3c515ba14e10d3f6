use colored::*;
use posprobe_common::printer::{DeviceIdentity, PrinterLanguage};
use posprobe_core::service::PrinterService;
use tracing::warn;

use crate::terminal::{colors, print, spinner};

pub async fn detect(service: &PrinterService, target: DeviceIdentity) -> anyhow::Result<()> {
    let language: PrinterLanguage = {
        let _spinner = spinner::start(&format!("Probing {target}..."));
        service.detect_language(&target).await
    };

    if language == PrinterLanguage::Unknown {
        warn!(printer = %target, "no identification probe was answered");
    }

    print::aligned_line("Printer", target.to_string().normal());
    print::aligned_line("Language", language.to_string().color(colors::LANGUAGE));
    Ok(())
}
