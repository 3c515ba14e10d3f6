//! # Printer Discovery Service
//!
//! Implements the "find printers" use case.
//!
//! The [`DiscoveryOrchestrator`] runs the configured phases one after another
//! (USB, then the vendor broadcast, then the port sweep) and streams
//! [`DiscoveryEvent`]s as printers turn up. It is responsible for:
//! 1. skipping phases the [`DiscoveryFilter`] disables,
//! 2. deduplicating printers by id across and within phases,
//! 3. applying the language filter,
//! 4. isolating phase failures and reporting the first one,
//! 5. always sending `DiscoveryComplete`, also after cancellation.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use posprobe_common::printer::{DiscoveredPrinter, DiscoveryFilter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::lock;
use crate::scanner::{Detection, DiscoveryPhase, PhaseContext, PhaseKind, ScanListener};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    PrinterFound(DiscoveredPrinter),
    PrinterAttached(DiscoveredPrinter),
    /// Carries the id of the printer that went away.
    PrinterDetached(String),
    DiscoveryComplete {
        success: bool,
        error: Option<String>,
    },
}

pub struct DiscoveryOrchestrator {
    phases: Vec<Arc<dyn DiscoveryPhase>>,
    detection: Option<Detection>,
}

impl DiscoveryOrchestrator {
    /// Phases are put in run order regardless of the order given.
    pub fn new(mut phases: Vec<Arc<dyn DiscoveryPhase>>) -> Self {
        phases.sort_by_key(|phase| phase.kind());
        Self {
            phases,
            detection: None,
        }
    }

    /// Enables language detection for filters that ask for it.
    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detection = Some(detection);
        self
    }

    pub fn phase_kinds(&self) -> Vec<PhaseKind> {
        self.phases.iter().map(|phase| phase.kind()).collect()
    }

    /// Spawns a run and returns its event stream.
    pub fn start(
        self: &Arc<Self>,
        filter: DiscoveryFilter,
        cancel: CancellationToken,
    ) -> mpsc::UnboundedReceiver<DiscoveryEvent> {
        let (tx, rx) = mpsc::unbounded_channel::<DiscoveryEvent>();
        let orchestrator: Arc<Self> = self.clone();
        tokio::spawn(async move {
            orchestrator.run(&filter, &cancel, &tx).await;
        });
        rx
    }

    pub async fn run(
        &self,
        filter: &DiscoveryFilter,
        cancel: &CancellationToken,
        events: &mpsc::UnboundedSender<DiscoveryEvent>,
    ) {
        let detection: Option<Detection> = if filter.needs_detection() {
            if self.detection.is_none() {
                warn!("language detection requested but not available");
            }
            self.detection.clone()
        } else {
            None
        };

        let sink = Arc::new(EventSink::new(filter.clone(), events.clone()));
        let mut context = PhaseContext {
            detection,
            excluded_ips: HashSet::new(),
        };

        let mut first_error: Option<String> = None;
        let mut cancelled: bool = false;

        for phase in &self.phases {
            let kind: PhaseKind = phase.kind();
            if !kind.enabled_by(filter) {
                debug!(phase = %kind, "phase disabled");
                continue;
            }

            context.excluded_ips = sink.network_ips();
            info!(phase = %kind, "phase started");

            let outcome: Option<anyhow::Result<()>> = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = phase.run(&context, sink.clone()) => Some(result),
            };

            match outcome {
                None => {
                    info!(phase = %kind, "discovery cancelled");
                    cancelled = true;
                    break;
                }
                Some(Ok(())) => debug!(phase = %kind, "phase finished"),
                Some(Err(e)) => {
                    let message: String = format!("{kind} phase failed: {e:#}");
                    warn!("{message}");
                    first_error.get_or_insert(message);
                }
            }
        }

        let success: bool = first_error.is_none() && !cancelled;
        let error: Option<String> = first_error.or_else(|| cancelled.then(|| "discovery cancelled".to_string()));
        info!(success, found = sink.reported(), "discovery complete");
        let _ = events.send(DiscoveryEvent::DiscoveryComplete { success, error });
    }
}

/// Turns phase findings into `PrinterFound` events.
struct EventSink {
    filter: DiscoveryFilter,
    events: mpsc::UnboundedSender<DiscoveryEvent>,
    seen: Mutex<HashSet<String>>,
    network_ips: Mutex<HashSet<Ipv4Addr>>,
    reported: AtomicUsize,
}

impl EventSink {
    fn new(filter: DiscoveryFilter, events: mpsc::UnboundedSender<DiscoveryEvent>) -> Self {
        Self {
            filter,
            events,
            seen: Mutex::new(HashSet::new()),
            network_ips: Mutex::new(HashSet::new()),
            reported: AtomicUsize::new(0),
        }
    }

    /// Every network address seen so far, filtered or not.
    fn network_ips(&self) -> HashSet<Ipv4Addr> {
        lock(&self.network_ips).clone()
    }

    fn reported(&self) -> usize {
        self.reported.load(Ordering::Relaxed)
    }
}

impl ScanListener for EventSink {
    fn on_found(&self, printer: DiscoveredPrinter) {
        if let Some(ip) = printer.ip_address() {
            lock(&self.network_ips).insert(ip);
        }

        if !lock(&self.seen).insert(printer.id.clone()) {
            trace!(id = %printer.id, "already reported");
            return;
        }

        if !self.filter.accepts(&printer) {
            debug!(id = %printer.id, language = ?printer.language, "filtered out by language");
            return;
        }

        info!(id = %printer.id, transport = %printer.transport(), "printer found");
        self.reported.fetch_add(1, Ordering::Relaxed);
        let _ = self.events.send(DiscoveryEvent::PrinterFound(printer));
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
