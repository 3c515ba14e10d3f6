//! The central **abstraction** for discovery phases.
//!
//! Every way of finding printers (USB enumeration, the vendor UDP broadcast,
//! the TCP port sweep) implements [`DiscoveryPhase`]. A phase reports each
//! printer through a [`ScanListener`] as soon as it is known and signals the
//! end of its work with `on_finish`. The orchestrator in
//! [`crate::discovery`] only ever sees this trait.
//!
//! Language detection is optional per run. When enabled, phases pass every
//! printer through [`Detection::decorate`] before reporting it.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use posprobe_common::printer::{DiscoveredPrinter, DiscoveryFilter};
use tokio::sync::mpsc;

use crate::connection::ConnectionManager;
use crate::detector::LanguageDetector;

pub mod broadcast;
pub mod probe;
pub mod usb;

/// Receives printers from a running phase.
pub trait ScanListener: Send + Sync {
    fn on_found(&self, printer: DiscoveredPrinter);

    /// Called exactly once per phase run, also when nothing was found.
    fn on_finish(&self) {}
}

impl ScanListener for mpsc::UnboundedSender<DiscoveredPrinter> {
    fn on_found(&self, printer: DiscoveredPrinter) {
        let _ = self.send(printer);
    }
}

/// Everything a phase needs to tag printers with their language.
#[derive(Clone)]
pub struct Detection {
    pub detector: Arc<LanguageDetector>,
    pub manager: Arc<ConnectionManager>,
}

impl Detection {
    pub async fn decorate(&self, printer: DiscoveredPrinter) -> DiscoveredPrinter {
        let language = self.detector.detect_identity(&self.manager, &printer.identity()).await;
        printer.with_language(language)
    }
}

/// Declaration order is the order phases run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PhaseKind {
    Usb,
    Broadcast,
    PortProbe,
}

impl PhaseKind {
    pub fn enabled_by(&self, filter: &DiscoveryFilter) -> bool {
        match self {
            PhaseKind::Usb => filter.usb,
            PhaseKind::Broadcast => filter.broadcast,
            PhaseKind::PortProbe => filter.port_probe,
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Usb => write!(f, "usb"),
            PhaseKind::Broadcast => write!(f, "broadcast"),
            PhaseKind::PortProbe => write!(f, "port-probe"),
        }
    }
}

/// Per-run inputs shared by all phases.
#[derive(Clone, Default)]
pub struct PhaseContext {
    pub detection: Option<Detection>,
    /// Addresses already reported by an earlier phase; the port sweep skips them.
    pub excluded_ips: HashSet<Ipv4Addr>,
}

impl PhaseContext {
    pub(crate) async fn decorate(&self, printer: DiscoveredPrinter) -> DiscoveredPrinter {
        match &self.detection {
            Some(detection) => detection.decorate(printer).await,
            None => printer,
        }
    }
}

#[async_trait]
pub trait DiscoveryPhase: Send + Sync {
    fn kind(&self) -> PhaseKind;

    /// Runs the phase to completion. Dropping the future cancels it.
    async fn run(&self, context: &PhaseContext, listener: Arc<dyn ScanListener>) -> anyhow::Result<()>;
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
