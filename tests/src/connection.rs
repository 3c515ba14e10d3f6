use std::sync::Arc;
use std::time::Duration;

use posprobe_common::config::{Config, RetryPolicy};
use posprobe_common::error::PrinterError;
use posprobe_common::printer::DeviceIdentity;
use posprobe_core::connection::{ConnectionManager, ConnectionState};
use posprobe_core::detector::LanguageDetector;
use posprobe_core::sdk::ConnectEvent;
use posprobe_protocols::detect::{ESC_POS_STATUS, ZPL_HOST_ID};
use posprobe_common::printer::PrinterLanguage;

use crate::support::{Behaviour, FakeSdk};

fn printer() -> DeviceIdentity {
    DeviceIdentity::network("192.168.50.20").unwrap()
}

fn quick_config() -> Config {
    Config {
        connect_timeout: Duration::from_secs(2),
        retry: RetryPolicy::fixed(3, Duration::from_millis(100)),
        ..Config::default()
    }
}

#[tokio::test]
async fn concurrent_connects_leave_one_fresh_entry() {
    let sdk = Arc::new(FakeSdk::new(Behaviour::Accept));
    let manager = ConnectionManager::new(sdk.clone(), &quick_config());
    let id = printer();

    let (first, second) = tokio::join!(manager.connect(&id), manager.connect(&id));
    assert!(first.is_ok());
    assert!(second.is_ok());

    let created = sdk.created();
    assert_eq!(created.len(), 2);
    assert!(created[0].is_closed(), "the evicted handle must be closed");
    assert!(!created[1].is_closed());
    assert_eq!(manager.active_count(), 1);
    assert_eq!(manager.state(&id), Some(ConnectionState::Connected));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_then_succeed() {
    let sdk = Arc::new(FakeSdk::scripted([Behaviour::Refuse, Behaviour::Hang], Behaviour::Accept));
    let manager = ConnectionManager::new(sdk.clone(), &quick_config());

    manager.connect(&printer()).await.unwrap();

    let created = sdk.created();
    assert_eq!(created.len(), 3);
    assert!(created[0].is_closed());
    assert!(created[1].is_closed());
    assert!(manager.is_connected(&printer()));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_the_last_failure() {
    let sdk = Arc::new(FakeSdk::new(Behaviour::Hang));
    let manager = ConnectionManager::new(sdk.clone(), &quick_config());

    let result = manager.connect(&printer()).await;

    assert!(matches!(result, Err(PrinterError::Timeout(_))));
    assert_eq!(sdk.created().len(), 3);
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test]
async fn operations_release_their_connection_even_on_error() {
    let sdk = Arc::new(FakeSdk::new(Behaviour::Accept));
    let manager = ConnectionManager::new(sdk.clone(), &quick_config());

    let result: Result<(), PrinterError> = manager
        .execute_with_connection(&printer(), |_handle| async {
            Err(PrinterError::Protocol("paper jam".into()))
        })
        .await;

    assert_eq!(result, Err(PrinterError::Protocol("paper jam".into())));
    assert_eq!(manager.active_count(), 0);
    assert!(sdk.created()[0].is_closed());
}

#[tokio::test]
async fn link_drop_evicts_the_entry() {
    let sdk = Arc::new(FakeSdk::new(Behaviour::Accept));
    let manager = ConnectionManager::new(sdk.clone(), &quick_config());
    manager.connect(&printer()).await.unwrap();

    sdk.created()[0].emit(ConnectEvent::Interrupt);

    assert!(!manager.is_connected(&printer()));
    assert!(sdk.created()[0].is_closed());
    assert!(matches!(
        manager.disconnect(&printer()).await,
        Err(PrinterError::NotConnected(_))
    ));
}

#[tokio::test]
async fn detection_probes_zpl_first_and_falls_through_to_escpos() {
    let sdk = Arc::new(FakeSdk::new(Behaviour::Accept).answering(ESC_POS_STATUS, &[0x00]));
    let config = Config {
        detection_timeout: Duration::from_millis(200),
        ..quick_config()
    };
    let manager = ConnectionManager::new(sdk.clone(), &config);
    let detector = LanguageDetector::new(&config);

    let language = detector.detect_identity(&manager, &printer()).await;

    assert_eq!(language, PrinterLanguage::Esc);
    let sent = sdk.created()[0].sent();
    assert_eq!(sent, vec![ZPL_HOST_ID.to_vec(), ESC_POS_STATUS.to_vec()]);
    assert_eq!(manager.active_count(), 0);
}
