//! # Broadcast Phase
//!
//! Drives the vendor UDP search. Replies stream in through a callback while
//! the search runs; the phase ends when the vendor reports it stopped
//! searching or when the window closes, whichever comes first. Language
//! detection for replies still running at the deadline is aborted and those
//! printers are not reported.

use std::collections::HashSet;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use posprobe_common::config::Config;
use posprobe_common::printer::{DiscoveredPrinter, NetworkParams};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, interval_at, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::scanner::{DiscoveryPhase, PhaseContext, PhaseKind, ScanListener};
use crate::sdk::{NetReply, NetSearch, ReplyCallback};

pub struct BroadcastPrinterScanner {
    search: Arc<dyn NetSearch>,
    window: Duration,
    poll_interval: Duration,
}

impl BroadcastPrinterScanner {
    pub fn new(search: Arc<dyn NetSearch>, config: &Config) -> Self {
        Self {
            search,
            window: config.broadcast_window,
            poll_interval: config.broadcast_poll_interval,
        }
    }
}

/// Replies without a usable address are dropped.
pub fn reply_to_printer(reply: NetReply) -> Option<DiscoveredPrinter> {
    let ip_address: Ipv4Addr = reply.ip_address.filter(|ip| !ip.is_unspecified())?;
    Some(DiscoveredPrinter::network(NetworkParams {
        ip_address,
        mac_address: reply.mac_address,
        mask: reply.mask,
        gateway: reply.gateway,
        dhcp: Some(reply.dhcp),
    }))
}

fn is_network_unreachable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NetworkUnreachable)
    })
}

/// Mutable state of one search.
struct Collector<'a> {
    context: &'a PhaseContext,
    listener: &'a Arc<dyn ScanListener>,
    found_ips: HashSet<Ipv4Addr>,
    pending: JoinSet<DiscoveredPrinter>,
    reported: usize,
}

impl Collector<'_> {
    fn accept(&mut self, reply: NetReply) {
        let Some(printer) = reply_to_printer(reply) else {
            trace!("dropping broadcast reply without address");
            return;
        };
        let Some(ip) = printer.ip_address() else {
            return;
        };
        if !self.found_ips.insert(ip) {
            trace!(%ip, "duplicate broadcast reply");
            return;
        }

        match &self.context.detection {
            Some(detection) => {
                let detection = detection.clone();
                self.pending.spawn(async move { detection.decorate(printer).await });
            }
            None => self.report(printer),
        }
    }

    fn settle(&mut self, done: Result<DiscoveredPrinter, JoinError>) {
        match done {
            Ok(printer) => self.report(printer),
            Err(e) => warn!(error = %e, "broadcast detection task failed"),
        }
    }

    fn report(&mut self, printer: DiscoveredPrinter) {
        debug!(id = %printer.id, "broadcast reply");
        self.reported += 1;
        self.listener.on_found(printer);
    }
}

#[async_trait]
impl DiscoveryPhase for BroadcastPrinterScanner {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Broadcast
    }

    async fn run(&self, context: &PhaseContext, listener: Arc<dyn ScanListener>) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<NetReply>();
        let on_reply: ReplyCallback = Arc::new(move |reply: NetReply| {
            let _ = tx.send(reply);
        });

        if let Err(e) = self.search.search_net_device(on_reply) {
            listener.on_finish();
            if is_network_unreachable(&e) {
                warn!(error = %e, "network unreachable, no broadcast results");
                return Ok(());
            }
            return Err(e.context("starting broadcast search"));
        }

        let started: Instant = Instant::now();
        let deadline = sleep_until(started + self.window);
        tokio::pin!(deadline);
        let mut poll = interval_at(started + self.poll_interval, self.poll_interval);

        let mut collector = Collector {
            context,
            listener: &listener,
            found_ips: HashSet::new(),
            pending: JoinSet::new(),
            reported: 0,
        };

        let mut timed_out: bool = false;
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    timed_out = true;
                    break;
                }
                Some(reply) = rx.recv() => collector.accept(reply),
                Some(done) = collector.pending.join_next(), if !collector.pending.is_empty() => {
                    collector.settle(done);
                }
                _ = poll.tick() => {
                    if !self.search.is_searching() {
                        debug!(elapsed = ?started.elapsed(), "broadcast search stopped");
                        break;
                    }
                }
            }
        }

        if !timed_out {
            while let Ok(reply) = rx.try_recv() {
                collector.accept(reply);
            }
            while !collector.pending.is_empty() {
                tokio::select! {
                    _ = &mut deadline => break,
                    Some(done) = collector.pending.join_next() => collector.settle(done),
                }
            }
        }

        if !collector.pending.is_empty() {
            debug!(outstanding = collector.pending.len(), "aborting detections at the deadline");
            collector.pending.abort_all();
        }

        info!(count = collector.reported, "broadcast search complete");
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
