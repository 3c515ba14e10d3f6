use std::time::{Duration, Instant};

use colored::*;
use posprobe_common::printer::{DiscoveredPrinter, DiscoveryFilter};
use posprobe_core::service::{DiscoveryReport, PrinterService};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::commands::DiscoverArgs;
use crate::terminal::{colors, format, print, spinner};

pub async fn discover(service: &PrinterService, args: DiscoverArgs) -> anyhow::Result<()> {
    let filter: DiscoveryFilter = filter_from(&args);
    if !filter.usb && !filter.port_probe {
        warn!("every discovery phase is disabled");
    }

    let start_time: Instant = Instant::now();
    let report: DiscoveryReport = {
        let _spinner = spinner::start("Looking for printers...");
        let handle = service.start_discovery(filter);

        let cancel: CancellationToken = handle.cancellation();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let mut found: usize = 0;
        let report = handle
            .finish(|_| {
                found += 1;
                spinner::report_discovery_progress(found);
            })
            .await;
        ctrl_c.abort();
        report
    };

    if let Some(reason) = &report.error {
        error!("discovery did not complete cleanly: {reason}");
    }

    discovery_ends(report.printers, start_time.elapsed());
    Ok(())
}

fn filter_from(args: &DiscoverArgs) -> DiscoveryFilter {
    let filter = DiscoveryFilter {
        usb: !args.no_usb,
        broadcast: true,
        port_probe: !args.no_sweep,
        languages: None,
        detect_language: args.detect,
    };

    if args.language.is_empty() {
        filter
    } else {
        filter.with_languages(args.language.iter().copied())
    }
}

fn discovery_ends(mut printers: Vec<DiscoveredPrinter>, total_time: Duration) {
    if printers.is_empty() {
        print::header("zero printers detected");
        print::no_results();
        return;
    }

    print::header("printer discovery");
    printers.sort_by(|a, b| a.id.cmp(&b.id));

    for (idx, printer) in printers.iter().enumerate() {
        print::tree_head(idx, &format::display_name(printer));
        print::as_tree_one_level(format::printer_to_details(printer));
        if idx + 1 != printers.len() {
            print::blank();
        }
    }

    let count: ColoredString = format!("{} printers", printers.len()).bold().green();
    let elapsed: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let summary: String = format!("Discovery Complete: {count} identified in {elapsed}")
        .color(colors::TEXT_DEFAULT)
        .to_string();

    print::fat_separator();
    print::centerln(&summary);
    info!(count = printers.len(), "discovery finished");
}
