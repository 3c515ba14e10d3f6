//! # Vendor Collaborator Seams
//!
//! The printer vendor's SDK is callback driven: a connection handle takes a
//! listener on `connect`, pushes inbound bytes to a read callback, and
//! reports broadcast-search replies through another callback. These traits
//! describe that surface so it can be backed by the vendor library, by the
//! built-in TCP backend, or by test doubles.
//!
//! [`request`] is the one place where a send/read pair is turned into an
//! awaitable exchange.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use posprobe_common::error::{PrinterError, PrinterResult};
use posprobe_common::printer::Transport;
use posprobe_common::validation::NetworkSettings;
use tokio::time::timeout;

use crate::resolve::Resolver;

/// Events reported to a connect listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectEvent {
    Success,
    Fail,
    Interrupt,
    SendFail,
    UsbAttached,
    UsbDetached,
}

impl ConnectEvent {
    /// Events that settle a pending connect.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectEvent::Success | ConnectEvent::Fail | ConnectEvent::Interrupt
        )
    }
}

pub type ConnectListener = Arc<dyn Fn(ConnectEvent, &str) + Send + Sync>;
pub type ReadCallback = Box<dyn FnMut(&[u8]) + Send>;

/// A live (or not yet connected) device handle.
pub trait DeviceConnection: Send + Sync {
    /// Starts connecting to `target`; the outcome arrives on `listener`.
    fn connect(&self, target: &str, listener: ConnectListener);

    fn send_data(&self, data: &[u8]) -> anyhow::Result<()>;

    /// Replaces the callback that receives inbound bytes.
    fn read_data(&self, callback: ReadCallback);

    fn close(&self);
}

pub trait ConnectionFactory: Send + Sync {
    fn create(&self, transport: Transport) -> anyhow::Result<Arc<dyn DeviceConnection>>;
}

/// One answer to the vendor UDP discovery broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetReply {
    pub ip_address: Option<Ipv4Addr>,
    pub mac_address: Option<String>,
    pub mask: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub dhcp: bool,
}

pub type ReplyCallback = Arc<dyn Fn(NetReply) + Send + Sync>;

/// Vendor UDP broadcast primitive.
#[async_trait]
pub trait NetSearch: Send + Sync {
    /// Starts a search. Replies arrive on `on_reply` until the vendor decides to stop.
    fn search_net_device(&self, on_reply: ReplyCallback) -> anyhow::Result<()>;

    fn is_searching(&self) -> bool;

    /// Pushes a network configuration to the device with the given MAC.
    async fn udp_net_config(&self, mac: [u8; 6], settings: &NetworkSettings) -> anyhow::Result<()>;
}

/// Sends `payload` and waits up to `wait` for the first non-empty reply.
///
/// A fresh read callback is installed before sending, and only the first
/// chunk settles the exchange. `Ok(None)` means the device stayed silent.
pub async fn request(
    connection: &dyn DeviceConnection,
    payload: &[u8],
    wait: Duration,
) -> PrinterResult<Option<Vec<u8>>> {
    let (resolver, reply) = Resolver::<Vec<u8>>::new();
    connection.read_data(Box::new(move |bytes: &[u8]| {
        if !bytes.is_empty() {
            resolver.resolve(bytes.to_vec());
        }
    }));

    connection.send_data(payload).map_err(PrinterError::protocol)?;

    match timeout(wait, reply).await {
        Ok(Ok(bytes)) => Ok(Some(bytes)),
        Ok(Err(_)) | Err(_) => Ok(None),
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
