//! # Printer Service
//!
//! The public facade of the printer subsystem. Every operation that talks to
//! a device goes through [`ConnectionManager::execute_with_connection`], so a
//! connection lives exactly as long as one logical operation.
//!
//! Collaborators are injected through [`PrinterServiceBuilder`]; anything not
//! provided (USB host, broadcast search, renderer) turns the operations that
//! need it into `Unsupported` errors and removes the matching discovery phase.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use posprobe_common::config::Config;
use posprobe_common::error::{PrinterError, PrinterResult};
use posprobe_common::network::address;
use posprobe_common::network::interface::NetworkInfo;
use posprobe_common::printer::{DeviceIdentity, DiscoveredPrinter, DiscoveryFilter, PrinterLanguage};
use posprobe_common::validation::{self, NetworkSettings};
use posprobe_protocols::serial::decode_serial_number;
use posprobe_protocols::status::{PrinterStatus, StatusKind, ZPL_HOST_STATUS_QUERY, decode_offline_status};
use posprobe_protocols::{Bitmap, CommandSet, EscPosCommands};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::detector::LanguageDetector;
use crate::discovery::{DiscoveryEvent, DiscoveryOrchestrator};
use crate::lock;
use crate::render::{self, HtmlRenderer};
use crate::scanner::broadcast::BroadcastPrinterScanner;
use crate::scanner::probe::{PortProbeScanner, PortProber, TcpProber};
use crate::scanner::usb::UsbPrinterScanner;
use crate::scanner::{Detection, DiscoveryPhase};
use crate::sdk::{self, ConnectionFactory, DeviceConnection, NetSearch};
use crate::usb::UsbHost;
use crate::watcher::UsbWatcher;

pub struct PrinterServiceBuilder {
    config: Config,
    factory: Arc<dyn ConnectionFactory>,
    commands: Arc<dyn CommandSet>,
    renderer: Option<Arc<dyn HtmlRenderer>>,
    net_search: Option<Arc<dyn NetSearch>>,
    usb: Option<Arc<dyn UsbHost>>,
    prober: Arc<dyn PortProber>,
    networks: Option<Vec<NetworkInfo>>,
}

impl PrinterServiceBuilder {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            config: Config::default(),
            factory,
            commands: Arc::new(EscPosCommands),
            renderer: None,
            net_search: None,
            usb: None,
            prober: Arc::new(TcpProber),
            networks: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn commands(mut self, commands: Arc<dyn CommandSet>) -> Self {
        self.commands = commands;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn HtmlRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn net_search(mut self, search: Arc<dyn NetSearch>) -> Self {
        self.net_search = Some(search);
        self
    }

    pub fn usb_host(mut self, host: Arc<dyn UsbHost>) -> Self {
        self.usb = Some(host);
        self
    }

    pub fn prober(mut self, prober: Arc<dyn PortProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Sweep these networks instead of the host's interfaces.
    pub fn networks(mut self, networks: Vec<NetworkInfo>) -> Self {
        self.networks = Some(networks);
        self
    }

    pub fn build(self) -> PrinterService {
        let mut manager = ConnectionManager::new(self.factory, &self.config);
        if let Some(host) = &self.usb {
            manager = manager.with_usb_host(host.clone());
        }
        let manager: Arc<ConnectionManager> = Arc::new(manager);
        let detector: Arc<LanguageDetector> = Arc::new(LanguageDetector::new(&self.config));

        let mut phases: Vec<Arc<dyn DiscoveryPhase>> = Vec::new();
        match &self.usb {
            Some(host) => phases.push(Arc::new(UsbPrinterScanner::new(host.clone()))),
            None => debug!("no USB host, USB discovery unavailable"),
        }
        match &self.net_search {
            Some(search) => phases.push(Arc::new(BroadcastPrinterScanner::new(search.clone(), &self.config))),
            None => debug!("no broadcast search, broadcast discovery unavailable"),
        }
        let mut sweep = PortProbeScanner::new(self.prober, &self.config);
        if let Some(networks) = self.networks {
            sweep = sweep.with_networks(networks);
        }
        phases.push(Arc::new(sweep));

        let orchestrator = DiscoveryOrchestrator::new(phases).with_detection(Detection {
            detector: detector.clone(),
            manager: manager.clone(),
        });

        PrinterService {
            config: self.config,
            manager,
            detector,
            orchestrator: Arc::new(orchestrator),
            commands: self.commands,
            renderer: self.renderer,
            net_search: self.net_search,
            usb: self.usb,
            lifetime: CancellationToken::new(),
            discovery: Mutex::new(None),
        }
    }
}

/// A running discovery. Dropping it does not stop the run; call [`cancel`](Self::cancel).
pub struct DiscoveryHandle {
    events: mpsc::UnboundedReceiver<DiscoveryEvent>,
    cancel: CancellationToken,
}

/// Outcome of a discovery run collected to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub printers: Vec<DiscoveredPrinter>,
    pub success: bool,
    pub error: Option<String>,
}

impl DiscoveryHandle {
    pub async fn next(&mut self) -> Option<DiscoveryEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for `DiscoveryComplete`, calling `on_found` for each printer on the way.
    pub async fn finish(mut self, mut on_found: impl FnMut(&DiscoveredPrinter)) -> DiscoveryReport {
        let mut printers: Vec<DiscoveredPrinter> = Vec::new();
        while let Some(event) = self.events.recv().await {
            match event {
                DiscoveryEvent::PrinterFound(printer) => {
                    on_found(&printer);
                    printers.push(printer);
                }
                DiscoveryEvent::DiscoveryComplete { success, error } => {
                    return DiscoveryReport {
                        printers,
                        success,
                        error,
                    };
                }
                DiscoveryEvent::PrinterAttached(_) | DiscoveryEvent::PrinterDetached(_) => {}
            }
        }

        DiscoveryReport {
            printers,
            success: false,
            error: Some("discovery ended without completing".into()),
        }
    }
}

pub struct PrinterService {
    config: Config,
    manager: Arc<ConnectionManager>,
    detector: Arc<LanguageDetector>,
    orchestrator: Arc<DiscoveryOrchestrator>,
    commands: Arc<dyn CommandSet>,
    renderer: Option<Arc<dyn HtmlRenderer>>,
    net_search: Option<Arc<dyn NetSearch>>,
    usb: Option<Arc<dyn UsbHost>>,
    /// Parent of every discovery and watch token; cancelled on shutdown.
    lifetime: CancellationToken,
    discovery: Mutex<Option<CancellationToken>>,
}

impl PrinterService {
    pub fn builder(factory: Arc<dyn ConnectionFactory>) -> PrinterServiceBuilder {
        PrinterServiceBuilder::new(factory)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Starts a discovery run, cancelling the previous one if it is still going.
    pub fn start_discovery(&self, filter: DiscoveryFilter) -> DiscoveryHandle {
        let cancel: CancellationToken = self.lifetime.child_token();
        let previous: Option<CancellationToken> = lock(&self.discovery).replace(cancel.clone());
        if let Some(previous) = previous {
            debug!("cancelling previous discovery");
            previous.cancel();
        }

        info!(?filter, "starting discovery");
        let events = self.orchestrator.start(filter, cancel.clone());
        DiscoveryHandle { events, cancel }
    }

    pub fn stop_discovery(&self) {
        let current: Option<CancellationToken> = lock(&self.discovery).take();
        if let Some(current) = current {
            current.cancel();
        }
    }

    pub async fn connect(&self, identity: &DeviceIdentity) -> PrinterResult<()> {
        self.manager.connect(identity).await.map(|_| ())
    }

    pub async fn disconnect(&self, identity: &DeviceIdentity) -> PrinterResult<()> {
        self.manager.disconnect(identity).await
    }

    /// Sends an ESC/POS job, prefixed with the initialize command.
    pub async fn print_raw(&self, identity: &DeviceIdentity, data: &[u8]) -> PrinterResult<()> {
        validation::print_data(data)?;
        let mut job: Vec<u8> = self.commands.initialize();
        job.extend_from_slice(data);
        self.send_job(identity, job).await
    }

    /// Sends a ZPL, TSPL or CPCL stream untouched.
    pub async fn print_label_raw(
        &self,
        identity: &DeviceIdentity,
        language: PrinterLanguage,
        data: &[u8],
    ) -> PrinterResult<()> {
        if !matches!(
            language,
            PrinterLanguage::Zpl | PrinterLanguage::Tspl | PrinterLanguage::Cpcl
        ) {
            return Err(PrinterError::InvalidArgument(format!(
                "{language} is not a label language"
            )));
        }
        validation::print_data(data)?;
        self.send_job(identity, data.to_vec()).await
    }

    /// Renders `html` to a raster `width` dots wide and prints it followed by a cut.
    pub async fn print_html(&self, identity: &DeviceIdentity, html: &str, width: u32) -> PrinterResult<()> {
        validation::html(html)?;
        validation::print_width(width)?;
        let renderer: &Arc<dyn HtmlRenderer> = self
            .renderer
            .as_ref()
            .ok_or_else(|| PrinterError::Unsupported("no HTML renderer configured".into()))?;

        let bitmap: Bitmap =
            render::render_with_retry(renderer.as_ref(), html, width, self.config.render_settle_delay).await?;
        debug!(width = bitmap.width, height = bitmap.height, "rendered");

        let mut job: Vec<u8> = self.commands.initialize();
        job.extend(self.commands.raster(&bitmap));
        job.extend(self.commands.cut());
        self.send_job(identity, job).await
    }

    /// Real-time status. Printers that cannot be reached report `Disconnected`.
    pub async fn get_status(&self, identity: &DeviceIdentity) -> PrinterResult<PrinterStatus> {
        let query: &'static [u8] = self.commands.status_query();
        let wait: Duration = self.config.detection_timeout;

        let status = self
            .manager
            .execute_with_connection(identity, |handle| async move {
                let reply: Option<Vec<u8>> = sdk::request(handle.as_ref(), query, wait).await?;
                Ok(match reply {
                    Some(reply) => decode_offline_status(&reply),
                    None => PrinterStatus::new(StatusKind::Timeout),
                })
            })
            .await;

        match status {
            Err(e) if e.is_retryable() => {
                warn!(%identity, error = %e, "status unavailable");
                Ok(PrinterStatus::new(StatusKind::Disconnected))
            }
            other => other,
        }
    }

    /// `true` if a label printer answers the ZPL host status request.
    pub async fn get_zpl_status(&self, identity: &DeviceIdentity) -> PrinterResult<bool> {
        let wait: Duration = self.config.detection_timeout;
        self.manager
            .execute_with_connection(identity, |handle| async move {
                let reply = sdk::request(handle.as_ref(), ZPL_HOST_STATUS_QUERY, wait).await?;
                Ok(reply.is_some())
            })
            .await
    }

    pub async fn get_serial_number(&self, identity: &DeviceIdentity) -> PrinterResult<String> {
        let query: &'static [u8] = self.commands.serial_query();
        let wait: Duration = self.config.detection_timeout;

        self.manager
            .execute_with_connection(identity, |handle| async move {
                let reply: Vec<u8> = sdk::request(handle.as_ref(), query, wait)
                    .await?
                    .ok_or_else(|| PrinterError::Timeout("no serial number reply".into()))?;
                decode_serial_number(&reply).map_err(PrinterError::protocol)
            })
            .await
    }

    /// Rewrites the printer's IP configuration over an existing link.
    pub async fn set_network_settings(
        &self,
        identity: &DeviceIdentity,
        ip: &str,
        mask: &str,
        gateway: &str,
        dhcp: bool,
    ) -> PrinterResult<()> {
        let settings: NetworkSettings = validation::network_settings(ip, mask, gateway, dhcp)?;
        let command: Vec<u8> = self
            .commands
            .set_network(&settings)
            .map_err(|e| PrinterError::Unsupported(format!("{e:#}")))?;
        let settle: Duration = self.config.network_settings_delay;

        self.manager
            .execute_with_connection(identity, |handle| async move {
                handle.send_data(&command).map_err(PrinterError::protocol)?;
                tokio::time::sleep(settle).await;
                Ok(())
            })
            .await?;

        info!(%identity, ip, dhcp, "network settings sent");
        Ok(())
    }

    /// Configures a printer found by MAC through the vendor UDP primitive.
    pub async fn configure_via_broadcast(
        &self,
        mac: &str,
        ip: &str,
        mask: &str,
        gateway: &str,
        dhcp: bool,
    ) -> PrinterResult<()> {
        let mac_bytes: [u8; 6] = address::parse_mac(mac)?;
        let settings: NetworkSettings = validation::network_settings(ip, mask, gateway, dhcp)?;
        let search: &Arc<dyn NetSearch> = self
            .net_search
            .as_ref()
            .ok_or_else(|| PrinterError::Unsupported("no broadcast search configured".into()))?;

        let limit: Duration = self.config.broadcast_config_timeout;
        match tokio::time::timeout(limit, search.udp_net_config(mac_bytes, &settings)).await {
            Ok(Ok(())) => {
                info!(mac = %address::format_mac(&mac_bytes), ip = %Ipv4Addr::from(settings.ip), "configured via broadcast");
                Ok(())
            }
            Ok(Err(e)) => Err(PrinterError::protocol(e)),
            Err(_) => Err(PrinterError::Timeout(format!(
                "no confirmation from {mac} within {limit:?}"
            ))),
        }
    }

    /// Kicks the cash drawer with the configured pulse sequence.
    pub async fn open_cash_drawer(&self, identity: &DeviceIdentity) -> PrinterResult<()> {
        let pulse: Vec<u8> = self.commands.drawer_pulse();
        let policy = self.config.drawer;

        self.manager
            .execute_with_connection(identity, |handle| async move {
                let pulses: u32 = policy.pulses.max(1);
                for i in 0..pulses {
                    handle.send_data(&pulse).map_err(PrinterError::protocol)?;
                    if i + 1 < pulses {
                        tokio::time::sleep(policy.gap_after(i)).await;
                    }
                }
                Ok(())
            })
            .await
    }

    pub async fn detect_language(&self, identity: &DeviceIdentity) -> PrinterLanguage {
        self.detector.detect_identity(&self.manager, identity).await
    }

    /// Streams USB attach and detach events until shutdown.
    pub async fn watch_usb(&self) -> PrinterResult<mpsc::UnboundedReceiver<DiscoveryEvent>> {
        let host: Arc<dyn UsbHost> = self
            .usb
            .clone()
            .ok_or_else(|| PrinterError::Unsupported("no USB host configured".into()))?;
        let watcher = Arc::new(UsbWatcher::new(host, &self.config));
        Ok(watcher.start(self.lifetime.child_token()).await)
    }

    /// Cancels discovery and watches and closes every connection.
    pub fn shutdown(&self) {
        info!("shutting down printer service");
        self.lifetime.cancel();
        self.manager.close_all();
    }

    async fn send_job(&self, identity: &DeviceIdentity, job: Vec<u8>) -> PrinterResult<()> {
        let bytes: usize = job.len();
        self.manager
            .execute_with_connection(identity, |handle: Arc<dyn DeviceConnection>| async move {
                handle.send_data(&job).map_err(PrinterError::protocol)
            })
            .await?;
        info!(%identity, bytes, "job sent");
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

#[cfg(test)]
mod tests {
    use super::*;
    use posprobe_protocols::serial::SERIAL_NUMBER_QUERY;
    use posprobe_protocols::status::OFFLINE_STATUS_QUERY;

    use crate::render::tests::FlakyRenderer;
    use crate::scanner::broadcast::tests::FakeSearch;
    use crate::sdk::tests::{MockFactory, OnConnect};

    fn printer() -> DeviceIdentity {
        DeviceIdentity::network("192.168.1.30").unwrap()
    }

    fn service(factory: Arc<MockFactory>) -> PrinterService {
        PrinterService::builder(factory).networks(vec![]).build()
    }

    #[tokio::test]
    async fn raw_print_is_prefixed_with_initialize_and_released() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed));
        let service = service(factory.clone());

        service.print_raw(&printer(), b"hello\n").await.unwrap();

        let connection = &factory.created()[0];
        assert_eq!(connection.sent(), vec![b"\x1b@hello\n".to_vec()]);
        assert!(connection.is_closed());
        assert_eq!(service.connections().active_count(), 0);
    }

    #[tokio::test]
    async fn empty_print_is_rejected_before_connecting() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed));
        let service = service(factory.clone());

        let result = service.print_raw(&printer(), b"").await;

        assert!(matches!(result, Err(PrinterError::InvalidArgument(_))));
        assert!(factory.created().is_empty());
    }

    #[tokio::test]
    async fn label_streams_are_passed_through() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed));
        let service = service(factory.clone());

        service
            .print_label_raw(&printer(), PrinterLanguage::Zpl, b"^XA^FDhi^FS^XZ")
            .await
            .unwrap();
        assert_eq!(factory.created()[0].sent(), vec![b"^XA^FDhi^FS^XZ".to_vec()]);

        let escpos = service.print_label_raw(&printer(), PrinterLanguage::Esc, b"x").await;
        assert!(matches!(escpos, Err(PrinterError::InvalidArgument(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn html_is_rendered_rastered_and_cut() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed));
        let service = PrinterService::builder(factory.clone())
            .renderer(Arc::new(FlakyRenderer::new(1)))
            .build();

        service.print_html(&printer(), "<b>total</b>", 16).await.unwrap();

        let job = factory.created()[0].sent().concat();
        assert_eq!(&job[..2], &[0x1B, 0x40]);
        assert_eq!(&job[2..10], &[0x1D, 0x76, 0x30, 0x00, 2, 0, 1, 0]);
        assert_eq!(&job[job.len() - 4..], &[0x1D, 0x56, 0x42, 0x01]);
    }

    #[tokio::test]
    async fn html_without_renderer_is_unsupported() {
        let service = service(Arc::new(MockFactory::new(OnConnect::Succeed)));
        let result = service.print_html(&printer(), "<p>x</p>", 384).await;
        assert!(matches!(result, Err(PrinterError::Unsupported(_))));
    }

    #[tokio::test]
    async fn status_is_decoded() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed).reply(OFFLINE_STATUS_QUERY, &[0x16]));
        let service = service(factory);

        let status = service.get_status(&printer()).await.unwrap();

        assert_eq!(status.kind, StatusKind::CoverOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_printer_reports_disconnected() {
        let factory = Arc::new(MockFactory::new(OnConnect::Fail));
        let service = service(factory);

        let status = service.get_status(&printer()).await.unwrap();

        assert_eq!(status.kind, StatusKind::Disconnected);
        assert_eq!(status.code(), -3);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_printer_status_times_out() {
        let service = service(Arc::new(MockFactory::new(OnConnect::Succeed)));
        let status = service.get_status(&printer()).await.unwrap();
        assert_eq!(status.kind, StatusKind::Timeout);
    }

    #[tokio::test]
    async fn serial_number_is_decoded() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed).reply(SERIAL_NUMBER_QUERY, b"_SN0042\0"));
        let service = service(factory);

        assert_eq!(service.get_serial_number(&printer()).await.unwrap(), "SN0042");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_serial_reply_is_a_timeout() {
        let service = service(Arc::new(MockFactory::new(OnConnect::Succeed)));
        let result = service.get_serial_number(&printer()).await;
        assert!(matches!(result, Err(PrinterError::Timeout(_))));
    }

    #[tokio::test]
    async fn escpos_network_settings_are_unsupported() {
        let service = service(Arc::new(MockFactory::new(OnConnect::Succeed)));

        let bad_ip = service
            .set_network_settings(&printer(), "192.168.1.256", "255.255.255.0", "192.168.1.1", false)
            .await;
        assert!(matches!(bad_ip, Err(PrinterError::InvalidAddress(_))));

        let unsupported = service
            .set_network_settings(&printer(), "192.168.1.40", "255.255.255.0", "192.168.1.1", false)
            .await;
        assert!(matches!(unsupported, Err(PrinterError::Unsupported(_))));
    }

    /// ESC/POS plus a made-up set-network frame: marker, ip, mask, gateway, dhcp.
    struct NetConfigurable;

    impl CommandSet for NetConfigurable {
        fn initialize(&self) -> Vec<u8> {
            EscPosCommands.initialize()
        }

        fn raster(&self, bitmap: &Bitmap) -> Vec<u8> {
            EscPosCommands.raster(bitmap)
        }

        fn cut(&self) -> Vec<u8> {
            EscPosCommands.cut()
        }

        fn drawer_pulse(&self) -> Vec<u8> {
            EscPosCommands.drawer_pulse()
        }

        fn set_network(&self, settings: &NetworkSettings) -> anyhow::Result<Vec<u8>> {
            let mut frame: Vec<u8> = vec![0x1F, b'N'];
            frame.extend(settings.ip);
            frame.extend(settings.mask);
            frame.extend(settings.gateway);
            frame.push(u8::from(settings.dhcp));
            Ok(frame)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn network_settings_are_sent_then_settled_and_released() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed));
        let service = PrinterService::builder(factory.clone())
            .commands(Arc::new(NetConfigurable))
            .networks(vec![])
            .build();
        let started = tokio::time::Instant::now();

        service
            .set_network_settings(&printer(), "192.168.1.40", "255.255.255.0", "192.168.1.1", true)
            .await
            .unwrap();

        let connection = &factory.created()[0];
        assert_eq!(
            connection.sent(),
            vec![vec![0x1F, b'N', 192, 168, 1, 40, 255, 255, 255, 0, 192, 168, 1, 1, 1]]
        );
        assert!(started.elapsed() >= service.config().network_settings_delay);
        assert!(connection.is_closed());
        assert_eq!(service.connections().active_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_configuration_validates_and_delegates() {
        let service = PrinterService::builder(Arc::new(MockFactory::new(OnConnect::Succeed)))
            .net_search(Arc::new(FakeSearch::new(vec![], None)))
            .build();

        let bad_mac = service
            .configure_via_broadcast("00:11:22:33:44", "10.0.0.9", "255.255.255.0", "10.0.0.1", false)
            .await;
        assert!(matches!(bad_mac, Err(PrinterError::InvalidAddress(_))));

        service
            .configure_via_broadcast("00-11-22-33-44-55", "10.0.0.9", "255.255.255.0", "10.0.0.1", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn broadcast_configuration_needs_a_search_primitive() {
        let service = service(Arc::new(MockFactory::new(OnConnect::Succeed)));
        let result = service
            .configure_via_broadcast("00:11:22:33:44:55", "10.0.0.9", "255.255.255.0", "10.0.0.1", false)
            .await;
        assert!(matches!(result, Err(PrinterError::Unsupported(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cash_drawer_is_pulsed_with_growing_gaps() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed));
        let service = service(factory.clone());
        let started = tokio::time::Instant::now();

        service.open_cash_drawer(&printer()).await.unwrap();

        assert_eq!(factory.created()[0].sent().len(), 4);
        // 120 + 200 + 280 ms between four pulses
        assert!(started.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn discovery_without_interfaces_completes() {
        let service = service(Arc::new(MockFactory::new(OnConnect::Succeed)));

        let report = service.start_discovery(DiscoveryFilter::default()).finish(|_| {}).await;

        assert!(report.printers.is_empty());
        assert!(report.success);
    }

    #[tokio::test]
    async fn shutdown_closes_connections() {
        let factory = Arc::new(MockFactory::new(OnConnect::Succeed));
        let service = service(factory.clone());
        service.connect(&printer()).await.unwrap();

        service.shutdown();

        assert_eq!(service.connections().active_count(), 0);
        assert!(factory.created()[0].is_closed());
        assert!(service.disconnect(&printer()).await.is_err());
    }

    #[tokio::test]
    async fn usb_watch_needs_a_usb_host() {
        let service = service(Arc::new(MockFactory::new(OnConnect::Succeed)));
        assert!(matches!(service.watch_usb().await, Err(PrinterError::Unsupported(_))));
    }
}
