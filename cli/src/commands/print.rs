use anyhow::Context;
use posprobe_core::service::PrinterService;
use tracing::info;

use crate::commands::PrintArgs;
use crate::terminal::spinner;

pub async fn print(service: &PrinterService, args: PrintArgs) -> anyhow::Result<()> {
    let job: Vec<u8> = match (&args.file, &args.text) {
        (Some(path), _) => tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        (None, Some(text)) => format!("{text}\n").into_bytes(),
        (None, None) => anyhow::bail!("nothing to print"),
    };
    let bytes: usize = job.len();

    let _spinner = spinner::start(&format!("Sending {bytes} bytes to {}...", args.target));
    match args.label {
        Some(language) => service
            .print_label_raw(&args.target, language, &job)
            .await
            .with_context(|| format!("printing {language} label on {}", args.target))?,
        None => service
            .print_raw(&args.target, &job)
            .await
            .with_context(|| format!("printing on {}", args.target))?,
    }

    info!(printer = %args.target, bytes, "print job delivered");
    Ok(())
}
