use std::sync::Arc;
use std::time::Duration;

use posprobe_common::config::{Config, RetryPolicy};
use posprobe_common::error::PrinterError;
use posprobe_common::printer::DeviceIdentity;
use posprobe_core::service::PrinterService;
use posprobe_core::tcp::TcpConnectionFactory;
use posprobe_protocols::{CommandSet, EscPosCommands};
use posprobe_protocols::status::{StatusKind, OFFLINE_STATUS_QUERY};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::support::{Behaviour, FakeBroadcast, FakeSdk, FakeUsbBus};

fn fast_retry() -> Config {
    Config {
        retry: RetryPolicy::fixed(2, Duration::from_millis(10)),
        ..Config::default()
    }
}

fn receipt_printer_on_usb() -> Arc<FakeUsbBus> {
    Arc::new(FakeUsbBus::default().with_printer("2:7", 0x0483, 0x5743, Some("RP-0099")))
}

#[tokio::test]
async fn usb_jobs_are_sent_to_the_device_path() {
    let sdk = Arc::new(FakeSdk::new(Behaviour::Accept));
    let service = PrinterService::builder(sdk.clone())
        .config(fast_retry())
        .usb_host(receipt_printer_on_usb())
        .networks(vec![])
        .build();
    let identity: DeviceIdentity = "usb:0x0483:0x5743:RP-0099".parse().unwrap();

    service.print_raw(&identity, b"TOTAL 4.20\n").await.unwrap();

    let handle = &sdk.created()[0];
    assert_eq!(handle.target.lock().unwrap().as_deref(), Some("2:7"));
    assert_eq!(handle.sent(), vec![b"\x1b@TOTAL 4.20\n".to_vec()]);
    assert!(handle.is_closed());
}

#[tokio::test]
async fn unplugged_usb_printer_is_not_found() {
    let sdk = Arc::new(FakeSdk::new(Behaviour::Accept));
    let service = PrinterService::builder(sdk.clone())
        .config(fast_retry())
        .usb_host(receipt_printer_on_usb())
        .build();
    let identity = DeviceIdentity::usb(0x0483, 0x5743, Some("OTHER".into()));

    let result = service.print_raw(&identity, b"x").await;

    assert!(matches!(result, Err(PrinterError::DeviceNotFound(_))), "{result:?}");
    assert!(sdk.created().is_empty());
}

#[tokio::test]
async fn refused_printer_reports_disconnected_status() {
    let service = PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Refuse)))
        .config(fast_retry())
        .build();

    let status = service
        .get_status(&DeviceIdentity::network("10.0.0.40").unwrap())
        .await
        .unwrap();

    assert_eq!(status.kind, StatusKind::Disconnected);
}

#[tokio::test]
async fn paper_out_is_decoded_over_a_fresh_connection() {
    let sdk = Arc::new(FakeSdk::new(Behaviour::Accept).answering(OFFLINE_STATUS_QUERY, &[0x32]));
    let service = PrinterService::builder(sdk.clone()).build();
    let identity = DeviceIdentity::network("10.0.0.41").unwrap();

    let status = service.get_status(&identity).await.unwrap();

    assert_eq!(status.kind, StatusKind::PaperEmpty);
    assert_eq!(status.raw, Some(0x32));
    assert!(!service.connections().is_connected(&identity));
}

#[tokio::test]
async fn broadcast_configuration_round_trip() {
    let service = PrinterService::builder(Arc::new(FakeSdk::new(Behaviour::Accept)))
        .net_search(Arc::new(FakeBroadcast::new(vec![], Some(Duration::ZERO))))
        .build();

    service
        .configure_via_broadcast("00:1A:2B:3C:4D:5E", "192.168.1.80", "255.255.255.0", "192.168.1.1", false)
        .await
        .unwrap();

    let bad_mask = service
        .configure_via_broadcast("00:1A:2B:3C:4D:5E", "192.168.1.80", "255.0.255.0", "192.168.1.1", false)
        .await;
    assert!(matches!(bad_mask, Err(PrinterError::InvalidAddress(_))));
}

/// Collects every job a loopback "printer" receives, one per connection.
async fn job_collector() -> (u16, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let jobs_tx = jobs_tx.clone();
            tokio::spawn(async move {
                let mut job = Vec::new();
                if socket.read_to_end(&mut job).await.is_ok() {
                    let _ = jobs_tx.send(job);
                }
            });
        }
    });

    (port, jobs_rx)
}

#[tokio::test]
async fn every_tcp_job_reaches_the_printer() {
    let (port, mut jobs) = job_collector().await;
    let service = PrinterService::builder(Arc::new(TcpConnectionFactory::new(port)))
        .config(fast_retry())
        .build();
    let identity = DeviceIdentity::network("127.0.0.1").unwrap();

    for _ in 0..30 {
        service.print_raw(&identity, b"hello receipt\n").await.unwrap();

        let job = tokio::time::timeout(Duration::from_secs(5), jobs.recv())
            .await
            .expect("printer never saw the connection close")
            .unwrap();
        assert_eq!(job, b"\x1b@hello receipt\n".to_vec());
    }
    assert_eq!(service.connections().active_count(), 0);
}

#[tokio::test]
async fn drawer_pulses_over_tcp_are_all_delivered() {
    let (port, mut jobs) = job_collector().await;
    let service = PrinterService::builder(Arc::new(TcpConnectionFactory::new(port)))
        .config(fast_retry())
        .build();

    service
        .open_cash_drawer(&DeviceIdentity::network("127.0.0.1").unwrap())
        .await
        .unwrap();

    let job = tokio::time::timeout(Duration::from_secs(5), jobs.recv()).await.unwrap().unwrap();
    let pulses = service.config().drawer.pulses as usize;
    assert_eq!(job, EscPosCommands.drawer_pulse().repeat(pulses));
}
