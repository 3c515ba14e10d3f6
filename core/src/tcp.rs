//! # Raw TCP Backend
//!
//! A [`DeviceConnection`] for network printers that accept raw jobs on a TCP
//! port (JetDirect style, 9100 by default). It mirrors the vendor SDK's
//! callback shape: `connect` reports through the listener, inbound bytes go to
//! the registered read callback, and write failures surface as `SendFail`.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};
use posprobe_common::printer::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::lock;
use crate::sdk::{ConnectEvent, ConnectListener, ConnectionFactory, DeviceConnection, ReadCallback};

const READ_BUFFER: usize = 1024;

pub struct TcpConnectionFactory {
    default_port: u16,
}

impl TcpConnectionFactory {
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }
}

impl ConnectionFactory for TcpConnectionFactory {
    fn create(&self, transport: Transport) -> anyhow::Result<Arc<dyn DeviceConnection>> {
        match transport {
            Transport::Network => Ok(Arc::new(TcpConnection::new(self.default_port)?)),
            Transport::Usb => bail!("the TCP backend cannot open USB devices"),
        }
    }
}

#[derive(Default)]
struct Shared {
    writer: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    reader: Mutex<Option<ReadCallback>>,
}

pub struct TcpConnection {
    runtime: Handle,
    default_port: u16,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl TcpConnection {
    /// Must be called from within a tokio runtime.
    pub fn new(default_port: u16) -> anyhow::Result<Self> {
        let runtime: Handle = Handle::try_current().context("TCP connections need a tokio runtime")?;
        Ok(Self {
            runtime,
            default_port,
            shared: Arc::new(Shared::default()),
            cancel: CancellationToken::new(),
        })
    }

    fn socket_addr(&self, target: &str) -> anyhow::Result<SocketAddr> {
        if let Ok(addr) = target.parse::<SocketAddr>() {
            return Ok(addr);
        }
        let ip: IpAddr = target
            .parse()
            .with_context(|| format!("'{target}' is neither an address nor address:port"))?;
        Ok(SocketAddr::new(ip, self.default_port))
    }
}

impl DeviceConnection for TcpConnection {
    fn connect(&self, target: &str, listener: ConnectListener) {
        let addr: SocketAddr = match self.socket_addr(target) {
            Ok(addr) => addr,
            Err(e) => {
                listener(ConnectEvent::Fail, &format!("{e:#}"));
                return;
            }
        };

        let shared: Arc<Shared> = self.shared.clone();
        let cancel: CancellationToken = self.cancel.clone();

        self.runtime.spawn(async move {
            let stream: TcpStream = tokio::select! {
                _ = cancel.cancelled() => return,
                result = TcpStream::connect(addr) => match result {
                    Ok(stream) => stream,
                    Err(e) => {
                        listener(ConnectEvent::Fail, &format!("connect to {addr}: {e}"));
                        return;
                    }
                },
            };

            let (mut read_half, mut write_half) = stream.into_split();
            let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
            *lock(&shared.writer) = Some(tx);
            debug!(%addr, "tcp connection established");
            listener(ConnectEvent::Success, "connected");

            // Runs until every sender is gone, so bytes queued before `close` still go out.
            let writer_listener: ConnectListener = listener.clone();
            tokio::spawn(async move {
                while let Some(bytes) = rx.recv().await {
                    if let Err(e) = write_half.write_all(&bytes).await {
                        writer_listener(ConnectEvent::SendFail, &format!("write to {addr}: {e}"));
                        break;
                    }
                }
                let _ = write_half.shutdown().await;
                trace!(%addr, "tcp writer finished");
            });

            let mut buf: Vec<u8> = vec![0u8; READ_BUFFER];
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    read = read_half.read(&mut buf) => match read {
                        Ok(0) => {
                            listener(ConnectEvent::Interrupt, "closed by peer");
                            break;
                        }
                        Ok(n) => {
                            trace!(%addr, bytes = n, "tcp read");
                            if let Some(callback) = lock(&shared.reader).as_mut() {
                                callback(&buf[..n]);
                            }
                        }
                        Err(e) => {
                            listener(ConnectEvent::Interrupt, &format!("read from {addr}: {e}"));
                            break;
                        }
                    },
                }
            }
            lock(&shared.writer).take();
        });
    }

    fn send_data(&self, data: &[u8]) -> anyhow::Result<()> {
        let guard = lock(&self.shared.writer);
        let Some(writer) = guard.as_ref() else {
            bail!("not connected");
        };
        writer
            .send(data.to_vec())
            .map_err(|_| anyhow::anyhow!("connection writer has stopped"))
    }

    fn read_data(&self, callback: ReadCallback) {
        *lock(&self.shared.reader) = Some(callback);
    }

    /// Stops reading at once. Queued writes are flushed before the socket closes.
    fn close(&self) {
        self.cancel.cancel();
        lock(&self.shared.writer).take();
        lock(&self.shared.reader).take();
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
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
