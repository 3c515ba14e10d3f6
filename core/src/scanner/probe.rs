//! # Port Probe Phase
//!
//! Sweeps every host of every viable local subnet for an open raw-print port.
//! Probes run as tasks in a [`JoinSet`], gated by a semaphore so that at most
//! `max_concurrent` connects are in flight. Dropping the phase aborts them.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use posprobe_common::config::Config;
use posprobe_common::network::interface::{NetworkInfo, local_networks};
use posprobe_common::network::range::{Ipv4Range, host_range_of};
use posprobe_common::printer::{DiscoveredPrinter, NetworkParams};
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::lock;
use crate::scanner::{DiscoveryPhase, PhaseContext, PhaseKind, ScanListener};

#[async_trait]
pub trait PortProber: Send + Sync {
    /// `true` only if something accepted the connection within `wait`.
    async fn probe(&self, addr: SocketAddr, wait: Duration) -> bool;
}

/// Plain TCP connect probe.
pub struct TcpProber;

#[async_trait]
impl PortProber for TcpProber {
    async fn probe(&self, addr: SocketAddr, wait: Duration) -> bool {
        match timeout(wait, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                trace!(%addr, error = %e, "probe refused");
                false
            }
            Err(_elapsed) => {
                trace!(%addr, "probe timed out");
                false
            }
        }
    }
}

pub struct PortProbeScanner {
    prober: Arc<dyn PortProber>,
    networks: Option<Vec<NetworkInfo>>,
    port: u16,
    probe_timeout: Duration,
    max_concurrent: usize,
}

impl PortProbeScanner {
    pub fn new(prober: Arc<dyn PortProber>, config: &Config) -> Self {
        Self {
            prober,
            networks: None,
            port: config.probe_port,
            probe_timeout: config.probe_timeout,
            max_concurrent: config.max_concurrent_probes,
        }
    }

    /// Sweeps these networks instead of the host's interfaces.
    pub fn with_networks(mut self, networks: Vec<NetworkInfo>) -> Self {
        self.networks = Some(networks);
        self
    }

    /// Probes every candidate address and returns those that accepted, in
    /// ascending order. Own addresses and `excluded` are never probed.
    pub async fn sweep(&self, excluded: &HashSet<Ipv4Addr>) -> anyhow::Result<Vec<Ipv4Addr>> {
        let networks: Vec<NetworkInfo> = match &self.networks {
            Some(networks) => networks.clone(),
            None => tokio::task::spawn_blocking(local_networks)
                .await
                .context("interface enumeration task failed")?,
        };
        if networks.is_empty() {
            warn!("no viable IPv4 interface to sweep");
        }

        let own: HashSet<Ipv4Addr> = networks.iter().map(|net| net.address).collect();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let hits: Arc<Mutex<Vec<Ipv4Addr>>> = Arc::new(Mutex::new(Vec::new()));
        let mut probes: JoinSet<()> = JoinSet::new();
        let mut seen: HashSet<Ipv4Addr> = HashSet::new();

        for network in &networks {
            let range: Ipv4Range = match host_range_of(network.address, network.prefix_length) {
                Ok(range) => range,
                Err(e) => {
                    warn!(interface = %network.name, error = %e, "skipping interface");
                    continue;
                }
            };
            debug!(interface = %network.name, hosts = range.len(), port = self.port, "sweeping");

            for ip in range.iter() {
                if own.contains(&ip) || excluded.contains(&ip) || !seen.insert(ip) {
                    continue;
                }

                let permit: OwnedSemaphorePermit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .context("probe semaphore closed")?;
                let prober: Arc<dyn PortProber> = self.prober.clone();
                let hits: Arc<Mutex<Vec<Ipv4Addr>>> = hits.clone();
                let addr = SocketAddr::new(IpAddr::V4(ip), self.port);
                let wait: Duration = self.probe_timeout;

                probes.spawn(async move {
                    let _permit = permit;
                    if prober.probe(addr, wait).await {
                        debug!(%addr, "port open");
                        lock(&hits).push(ip);
                    }
                });

                while let Some(done) = probes.try_join_next() {
                    log_probe_failure(done);
                }
            }
        }

        while let Some(done) = probes.join_next().await {
            log_probe_failure(done);
        }

        let mut found: Vec<Ipv4Addr> = std::mem::take(&mut *lock(&hits));
        found.sort();
        Ok(found)
    }
}

fn log_probe_failure(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        warn!(error = %e, "probe task failed");
    }
}

#[async_trait]
impl DiscoveryPhase for PortProbeScanner {
    fn kind(&self) -> PhaseKind {
        PhaseKind::PortProbe
    }

    async fn run(&self, context: &PhaseContext, listener: Arc<dyn ScanListener>) -> anyhow::Result<()> {
        let hits: Vec<Ipv4Addr> = match self.sweep(&context.excluded_ips).await {
            Ok(hits) => hits,
            Err(e) => {
                listener.on_finish();
                return Err(e);
            }
        };
        info!(count = hits.len(), port = self.port, "port sweep complete");

        let printers = hits
            .into_iter()
            .map(|ip| DiscoveredPrinter::network(NetworkParams::from_ip(ip)));

        match &context.detection {
            None => printers.for_each(|printer| listener.on_found(printer)),
            Some(detection) => {
                let mut detections: JoinSet<DiscoveredPrinter> = JoinSet::new();
                for printer in printers {
                    let detection = detection.clone();
                    detections.spawn(async move { detection.decorate(printer).await });
                }
                while let Some(done) = detections.join_next().await {
                    match done {
                        Ok(printer) => listener.on_found(printer),
                        Err(e) => warn!(error = %e, "detection task failed"),
                    }
                }
            }
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
