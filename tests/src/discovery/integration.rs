use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use posprobe_common::config::Config;
use posprobe_common::network::interface::NetworkInfo;
use posprobe_common::printer::{DiscoveryFilter, PrinterLanguage};
use posprobe_core::service::{DiscoveryReport, PrinterService};
use posprobe_core::tcp::TcpConnectionFactory;
use posprobe_core::usb::{UsbDevice, UsbHost};
use posprobe_protocols::detect::ZPL_HOST_ID;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::support::{net_reply, Behaviour, FakeBroadcast, FakeSdk, FakeSubnet, FakeUsbBus};

fn ids(report: &DiscoveryReport) -> Vec<String> {
    report.printers.iter().map(|printer| printer.id.clone()).collect()
}

fn network_only() -> DiscoveryFilter {
    DiscoveryFilter {
        usb: false,
        broadcast: false,
        ..DiscoveryFilter::default()
    }
}

fn broadcast_only() -> DiscoveryFilter {
    DiscoveryFilter {
        usb: false,
        port_probe: false,
        ..DiscoveryFilter::default()
    }
}

/// /30 around `.2`: the sweep has exactly one candidate, `.1`.
fn slash_thirty(third: u8) -> Vec<NetworkInfo> {
    vec![NetworkInfo::new("eth0", Ipv4Addr::new(10, 0, third, 2), 30)]
}

#[tokio::test]
async fn phases_run_in_order_and_duplicates_collapse() {
    let usb = FakeUsbBus::default()
        .with_printer("1:4", 0x0483, 0x5743, Some("A1"))
        .with_printer("1:5", 0x0483, 0x5743, Some("A1"));
    let broadcast = FakeBroadcast::new(
        vec![net_reply(Ipv4Addr::new(10, 0, 0, 5), "00:11:22:33:44:55")],
        Some(Duration::from_millis(300)),
    );
    let subnet = Arc::new(FakeSubnet::with_open(
        [Ipv4Addr::new(10, 0, 0, 3), Ipv4Addr::new(10, 0, 0, 5)],
        Duration::from_millis(1),
    ));

    let service = PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Accept)))
        .usb_host(Arc::new(usb))
        .net_search(Arc::new(broadcast))
        .prober(subnet.clone())
        .networks(vec![NetworkInfo::new("eth0", Ipv4Addr::new(10, 0, 0, 2), 29)])
        .build();

    let report = service.start_discovery(DiscoveryFilter::default()).finish(|_| {}).await;

    assert!(report.success, "{:?}", report.error);
    assert_eq!(ids(&report), vec!["usb:1155:22339:A1", "net:10.0.0.5", "net:10.0.0.3"]);
    // .1 .3 .4 .6; .2 is ours and .5 came from the broadcast
    assert_eq!(subnet.probed(), 4);
}

#[tokio::test(start_paused = true)]
async fn endless_broadcast_is_cut_at_the_window() {
    let broadcast = FakeBroadcast::new(vec![net_reply(Ipv4Addr::new(10, 1, 1, 9), "AA-BB-CC-DD-EE-01")], None);
    let service = PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Accept)))
        .net_search(Arc::new(broadcast))
        .networks(vec![])
        .build();
    let started = Instant::now();

    let report = service.start_discovery(broadcast_only()).finish(|_| {}).await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(5_500), "{elapsed:?}");
    assert!(report.success);
    assert_eq!(ids(&report), vec!["net:10.1.1.9"]);
}

#[tokio::test(start_paused = true)]
async fn cancelling_reports_an_unsuccessful_completion() {
    let broadcast = FakeBroadcast::new(vec![], None);
    let service = PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Accept)))
        .net_search(Arc::new(broadcast))
        .networks(vec![])
        .build();
    let started = Instant::now();

    let handle = service.start_discovery(broadcast_only());
    let cancel = handle.cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });
    let report = handle.finish(|_| {}).await;

    assert!(!report.success);
    assert_eq!(report.error.as_deref(), Some("discovery cancelled"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn starting_again_cancels_the_previous_run() {
    let service = PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Accept)))
        .net_search(Arc::new(FakeBroadcast::new(vec![], None)))
        .networks(vec![])
        .build();

    let first = service.start_discovery(broadcast_only());
    let second = service.start_discovery(network_only());

    let first = first.finish(|_| {}).await;
    let second = second.finish(|_| {}).await;
    assert_eq!(first.error.as_deref(), Some("discovery cancelled"));
    assert!(second.success);
}

#[tokio::test(start_paused = true)]
async fn sweep_concurrency_stays_bounded() {
    let subnet = Arc::new(FakeSubnet::with_open([], Duration::from_millis(10)));
    let config = Config {
        max_concurrent_probes: 8,
        ..Config::default()
    };
    let service = PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Accept)))
        .config(config)
        .prober(subnet.clone())
        .networks(vec![NetworkInfo::new("eth0", Ipv4Addr::new(192, 168, 3, 10), 24)])
        .build();

    let report = service.start_discovery(network_only()).finish(|_| {}).await;

    assert!(report.success);
    assert!(report.printers.is_empty());
    assert_eq!(subnet.probed(), 253);
    assert!(subnet.peak() <= 8, "peak {}", subnet.peak());
}

#[tokio::test]
async fn language_filter_keeps_only_matching_printers() {
    let service = |open: Ipv4Addr| {
        PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Accept).answering(ZPL_HOST_ID, b"ZT410")))
            .prober(Arc::new(FakeSubnet::with_open([open], Duration::ZERO)))
            .networks(slash_thirty(4))
            .build()
    };
    let open = Ipv4Addr::new(10, 0, 4, 1);

    let zpl = service(open)
        .start_discovery(network_only().with_languages([PrinterLanguage::Zpl]))
        .finish(|_| {})
        .await;
    assert_eq!(ids(&zpl), vec!["net:10.0.4.1"]);
    assert_eq!(zpl.printers[0].language, Some(PrinterLanguage::Zpl));

    let tspl = service(open)
        .start_discovery(network_only().with_languages([PrinterLanguage::Tspl]))
        .finish(|_| {})
        .await;
    assert!(tspl.success);
    assert!(tspl.printers.is_empty());
}

struct DeadBus;

impl UsbHost for DeadBus {
    fn devices(&self) -> anyhow::Result<Vec<UsbDevice>> {
        anyhow::bail!("usbfs not mounted")
    }

    fn interface_classes(&self, _device: &UsbDevice) -> anyhow::Result<Vec<u8>> {
        Ok(vec![])
    }

    fn has_permission(&self, _device: &UsbDevice) -> bool {
        false
    }

    fn serial_number(&self, _device: &UsbDevice) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn failing_phase_does_not_stop_the_others() {
    let service = PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Accept)))
        .usb_host(Arc::new(DeadBus))
        .prober(Arc::new(FakeSubnet::with_open([Ipv4Addr::new(10, 0, 8, 1)], Duration::ZERO)))
        .networks(slash_thirty(8))
        .build();

    let report = service.start_discovery(DiscoveryFilter::default()).finish(|_| {}).await;

    assert!(!report.success);
    let error = report.error.clone().unwrap_or_default();
    assert!(error.starts_with("usb phase failed"), "{error}");
    assert!(error.contains("usbfs not mounted"), "{error}");
    assert_eq!(ids(&report), vec!["net:10.0.8.1"]);
}

/// Accepts any number of connections and answers `~HI` like a ZPL printer.
async fn zpl_printer_on_loopback() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                    if buf[..n].starts_with(b"~HI") && socket.write_all(b"\x02ZD420,V84.20.18Z,8,8192KB\x03").await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    port
}

#[tokio::test]
async fn loopback_slash_thirty_finds_the_listener() {
    let port = zpl_printer_on_loopback().await;
    let config = Config {
        probe_port: port,
        ..Config::default()
    };
    let service = PrinterService::builder(Arc::new(TcpConnectionFactory::new(port)))
        .config(config)
        .networks(vec![NetworkInfo::new("lo", Ipv4Addr::new(127, 0, 0, 2), 30)])
        .build();

    let filter = DiscoveryFilter {
        detect_language: true,
        ..network_only()
    };
    let report = service.start_discovery(filter).finish(|_| {}).await;

    assert!(report.success, "{:?}", report.error);
    assert_eq!(ids(&report), vec!["net:127.0.0.1"]);
    assert_eq!(report.printers[0].language, Some(PrinterLanguage::Zpl));
    service.shutdown();
}
