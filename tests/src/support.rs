//! In-memory stand-ins for the vendor SDK, the USB bus and the network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use posprobe_common::printer::Transport;
use posprobe_common::validation::NetworkSettings;
use posprobe_core::scanner::probe::PortProber;
use posprobe_core::sdk::{
    ConnectEvent, ConnectListener, ConnectionFactory, DeviceConnection, NetReply, NetSearch, ReadCallback, ReplyCallback,
};
use posprobe_core::usb::{UsbDevice, UsbHost};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Accept,
    Refuse,
    /// Never reports an outcome.
    Hang,
}

/// One vendor handle. Replies are keyed by the exact payload sent.
pub struct FakePrinter {
    behaviour: Behaviour,
    replies: HashMap<Vec<u8>, Vec<u8>>,
    pub target: Mutex<Option<String>>,
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    listener: Mutex<Option<ConnectListener>>,
    reader: Mutex<Option<ReadCallback>>,
}

impl FakePrinter {
    fn new(behaviour: Behaviour, replies: HashMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            behaviour,
            replies,
            target: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            listener: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Reports an event after connect returned, like a link dropping.
    pub fn emit(&self, event: ConnectEvent) {
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            listener(event, "injected");
        }
    }
}

impl DeviceConnection for FakePrinter {
    fn connect(&self, target: &str, listener: ConnectListener) {
        *self.target.lock().unwrap() = Some(target.to_string());
        *self.listener.lock().unwrap() = Some(listener.clone());
        match self.behaviour {
            Behaviour::Accept => listener(ConnectEvent::Success, "ok"),
            Behaviour::Refuse => listener(ConnectEvent::Fail, "refused"),
            Behaviour::Hang => {}
        }
    }

    fn send_data(&self, data: &[u8]) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(data.to_vec());
        if let Some(reply) = self.replies.get(data) {
            if let Some(reader) = self.reader.lock().unwrap().as_mut() {
                reader(reply.as_slice());
            }
        }
        Ok(())
    }

    fn read_data(&self, callback: ReadCallback) {
        *self.reader.lock().unwrap() = Some(callback);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out [`FakePrinter`]s, optionally following a script of behaviours.
pub struct FakeSdk {
    script: Mutex<VecDeque<Behaviour>>,
    fallback: Behaviour,
    replies: HashMap<Vec<u8>, Vec<u8>>,
    created: Mutex<Vec<Arc<FakePrinter>>>,
}

impl FakeSdk {
    pub fn new(fallback: Behaviour) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            replies: HashMap::new(),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(script: impl IntoIterator<Item = Behaviour>, fallback: Behaviour) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::new(fallback)
        }
    }

    pub fn answering(mut self, payload: &[u8], reply: &[u8]) -> Self {
        self.replies.insert(payload.to_vec(), reply.to_vec());
        self
    }

    pub fn created(&self) -> Vec<Arc<FakePrinter>> {
        self.created.lock().unwrap().clone()
    }
}

impl ConnectionFactory for FakeSdk {
    fn create(&self, _transport: Transport) -> anyhow::Result<Arc<dyn DeviceConnection>> {
        let behaviour = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        let printer = Arc::new(FakePrinter::new(behaviour, self.replies.clone()));
        self.created.lock().unwrap().push(printer.clone());
        Ok(printer)
    }
}

/// Vendor broadcast search that replays canned replies. With `stops_after`
/// unset it reports "searching" forever.
pub struct FakeBroadcast {
    pub replies: Vec<NetReply>,
    pub stops_after: Option<Duration>,
    started: Mutex<Option<Instant>>,
}

impl FakeBroadcast {
    pub fn new(replies: Vec<NetReply>, stops_after: Option<Duration>) -> Self {
        Self {
            replies,
            stops_after,
            started: Mutex::new(None),
        }
    }
}

#[async_trait]
impl NetSearch for FakeBroadcast {
    fn search_net_device(&self, on_reply: ReplyCallback) -> anyhow::Result<()> {
        *self.started.lock().unwrap() = Some(Instant::now());
        for reply in &self.replies {
            on_reply(reply.clone());
        }
        Ok(())
    }

    fn is_searching(&self) -> bool {
        match (*self.started.lock().unwrap(), self.stops_after) {
            (Some(started), Some(limit)) => started.elapsed() < limit,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    async fn udp_net_config(&self, _mac: [u8; 6], _settings: &NetworkSettings) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn net_reply(ip: Ipv4Addr, mac: &str) -> NetReply {
    NetReply {
        ip_address: Some(ip),
        mac_address: Some(mac.to_string()),
        mask: Some(Ipv4Addr::new(255, 255, 255, 0)),
        gateway: None,
        dhcp: true,
    }
}

/// A USB bus whose devices are all printers with permission granted.
#[derive(Default)]
pub struct FakeUsbBus {
    pub devices: Vec<(UsbDevice, Option<String>)>,
}

impl FakeUsbBus {
    pub fn with_printer(mut self, path: &str, vendor_id: u16, product_id: u16, serial: Option<&str>) -> Self {
        let device = UsbDevice {
            path: path.to_string(),
            vendor_id,
            product_id,
            manufacturer: Some("Acme".into()),
            product_name: Some("TP-80".into()),
        };
        self.devices.push((device, serial.map(str::to_string)));
        self
    }
}

impl UsbHost for FakeUsbBus {
    fn devices(&self) -> anyhow::Result<Vec<UsbDevice>> {
        Ok(self.devices.iter().map(|(device, _)| device.clone()).collect())
    }

    fn interface_classes(&self, _device: &UsbDevice) -> anyhow::Result<Vec<u8>> {
        Ok(vec![7])
    }

    fn has_permission(&self, _device: &UsbDevice) -> bool {
        true
    }

    fn serial_number(&self, device: &UsbDevice) -> Option<String> {
        self.devices
            .iter()
            .find(|(candidate, _)| candidate.path == device.path)
            .and_then(|(_, serial)| serial.clone())
    }
}

/// Port prober with a fixed set of open hosts that tracks overlap.
#[derive(Default)]
pub struct FakeSubnet {
    pub open: HashSet<Ipv4Addr>,
    pub latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    probed: AtomicUsize,
}

impl FakeSubnet {
    pub fn with_open(open: impl IntoIterator<Item = Ipv4Addr>, latency: Duration) -> Self {
        Self {
            open: open.into_iter().collect(),
            latency,
            ..Self::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn probed(&self) -> usize {
        self.probed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortProber for FakeSubnet {
    async fn probe(&self, addr: SocketAddr, _wait: Duration) -> bool {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.probed.fetch_add(1, Ordering::SeqCst);

        match addr.ip() {
            IpAddr::V4(ip) => self.open.contains(&ip),
            IpAddr::V6(_) => false,
        }
    }
}
