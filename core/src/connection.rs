//! # Connection Manager
//!
//! Owns every live device handle, keyed by [`DeviceIdentity`]. For each
//! identity there is at most one registry entry, moving through
//! `Connecting -> Connected -> Closing` and disappearing when closed.
//!
//! Connects for one identity are serialized by a per-identity gate. Each
//! connect first evicts whatever entry the identity had, so concurrent callers
//! end with a single entry holding the newest handle. The registry itself sits
//! behind one std mutex that is never held across an `.await`, because vendor
//! listeners are synchronous and must be able to evict entries on a late
//! `FAIL` or `INTERRUPT`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use posprobe_common::config::{Config, RetryPolicy};
use posprobe_common::error::{PrinterError, PrinterResult};
use posprobe_common::printer::DeviceIdentity;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::lock;
use crate::resolve::Resolver;
use crate::sdk::{ConnectEvent, ConnectListener, ConnectionFactory, DeviceConnection};
use crate::usb::{self, UsbDevice, UsbHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Closing,
}

#[derive(Clone)]
struct ConnectionEntry {
    handle: Arc<dyn DeviceConnection>,
    state: ConnectionState,
    /// Distinguishes this entry from later entries for the same identity.
    generation: u64,
}

type Registry = Arc<Mutex<HashMap<DeviceIdentity, ConnectionEntry>>>;
type Gates = Mutex<HashMap<DeviceIdentity, Arc<AsyncMutex<()>>>>;

pub struct ConnectionManager {
    factory: Arc<dyn ConnectionFactory>,
    usb: Option<Arc<dyn UsbHost>>,
    connect_timeout: Duration,
    retry: RetryPolicy,
    registry: Registry,
    gates: Gates,
    next_generation: AtomicU64,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn ConnectionFactory>, config: &Config) -> Self {
        Self {
            factory,
            usb: None,
            connect_timeout: config.connect_timeout,
            retry: config.retry,
            registry: Arc::new(Mutex::new(HashMap::new())),
            gates: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Without a USB host, USB identities are `Unsupported`.
    pub fn with_usb_host(mut self, host: Arc<dyn UsbHost>) -> Self {
        self.usb = Some(host);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Connects with the default retry policy and registers the handle.
    pub async fn connect(&self, identity: &DeviceIdentity) -> PrinterResult<Arc<dyn DeviceConnection>> {
        self.connect_with(identity, self.retry).await
    }

    pub async fn connect_with(
        &self,
        identity: &DeviceIdentity,
        policy: RetryPolicy,
    ) -> PrinterResult<Arc<dyn DeviceConnection>> {
        let (handle, _generation) = self.connect_entry(identity, policy).await?;
        Ok(handle)
    }

    /// Closes and forgets the connection for `identity`.
    pub async fn disconnect(&self, identity: &DeviceIdentity) -> PrinterResult<()> {
        let _serialized: GatePass<'_> = self.serialize(identity).await;

        let closing: Option<ConnectionEntry> = lock(&self.registry).get_mut(identity).map(|entry| {
            entry.state = ConnectionState::Closing;
            entry.clone()
        });
        let Some(entry) = closing else {
            return Err(PrinterError::NotConnected(identity.id()));
        };

        entry.handle.close();
        remove_generation(&self.registry, identity, entry.generation);
        info!(%identity, "disconnected");
        Ok(())
    }

    /// Connects, runs `operation`, and closes the connection afterwards
    /// whatever the outcome, including when the returned future is dropped.
    pub async fn execute_with_connection<T, F, Fut>(&self, identity: &DeviceIdentity, operation: F) -> PrinterResult<T>
    where
        F: FnOnce(Arc<dyn DeviceConnection>) -> Fut,
        Fut: Future<Output = PrinterResult<T>>,
    {
        self.execute_with_retry(identity, self.retry, operation).await
    }

    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        identity: &DeviceIdentity,
        policy: RetryPolicy,
        operation: F,
    ) -> PrinterResult<T>
    where
        F: FnOnce(Arc<dyn DeviceConnection>) -> Fut,
        Fut: Future<Output = PrinterResult<T>>,
    {
        let (handle, generation) = self.connect_entry(identity, policy).await?;
        let _lease = Lease::new(&self.registry, identity, generation, handle.clone());
        operation(handle).await
    }

    /// Best-effort teardown of every registered connection.
    pub fn close_all(&self) {
        let entries: Vec<(DeviceIdentity, ConnectionEntry)> = lock(&self.registry).drain().collect();
        for (identity, entry) in entries {
            debug!(%identity, "closing connection");
            entry.handle.close();
        }
    }

    pub fn state(&self, identity: &DeviceIdentity) -> Option<ConnectionState> {
        lock(&self.registry).get(identity).map(|entry| entry.state)
    }

    pub fn is_connected(&self, identity: &DeviceIdentity) -> bool {
        self.state(identity) == Some(ConnectionState::Connected)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Waits for exclusive use of `identity`'s gate.
    async fn serialize(&self, identity: &DeviceIdentity) -> GatePass<'_> {
        let gate: Arc<AsyncMutex<()>> = lock(&self.gates).entry(identity.clone()).or_default().clone();
        let held: OwnedMutexGuard<()> = gate.lock_owned().await;
        GatePass {
            gates: &self.gates,
            identity: identity.clone(),
            held: Some(held),
        }
    }

    async fn connect_entry(
        &self,
        identity: &DeviceIdentity,
        policy: RetryPolicy,
    ) -> PrinterResult<(Arc<dyn DeviceConnection>, u64)> {
        let _serialized: GatePass<'_> = self.serialize(identity).await;

        let attempts: u32 = policy.attempts();
        let mut attempt: u32 = 1;
        loop {
            let delay: Duration = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.connect_once(identity).await {
                Ok(connected) => {
                    info!(%identity, attempt, "connected");
                    return Ok(connected);
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(%identity, attempt, error = %e, "connect attempt failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    warn!(%identity, attempt, error = %e, "connect failed");
                    return Err(e);
                }
            }
        }
    }

    async fn connect_once(&self, identity: &DeviceIdentity) -> PrinterResult<(Arc<dyn DeviceConnection>, u64)> {
        let previous: Option<ConnectionEntry> = lock(&self.registry).remove(identity);
        if let Some(previous) = previous {
            debug!(%identity, "evicting existing connection");
            previous.handle.close();
        }

        let target: String = self.resolve_target(identity).await?;
        let handle: Arc<dyn DeviceConnection> = self
            .factory
            .create(identity.transport())
            .map_err(|e| PrinterError::ConnectionFailed(format!("{identity}: {e:#}")))?;

        let generation: u64 = self.next_generation.fetch_add(1, Ordering::Relaxed);
        lock(&self.registry).insert(
            identity.clone(),
            ConnectionEntry {
                handle: handle.clone(),
                state: ConnectionState::Connecting,
                generation,
            },
        );
        // Until the outcome is known, dropping this future must undo the insert.
        let pending: Lease<'_> = Lease::new(&self.registry, identity, generation, handle.clone());

        let (resolver, outcome) = Resolver::<(ConnectEvent, String)>::new();
        let listener: ConnectListener = {
            let registry: Registry = self.registry.clone();
            let identity: DeviceIdentity = identity.clone();
            Arc::new(move |event: ConnectEvent, message: &str| {
                trace!(%identity, ?event, reason = message, "listener event");
                match event {
                    ConnectEvent::SendFail => warn!(%identity, reason = message, "send failed"),
                    _ if !event.is_terminal() => {}
                    _ => {
                        if resolver.resolve((event, message.to_string())) {
                            return;
                        }
                        if matches!(event, ConnectEvent::Fail | ConnectEvent::Interrupt) {
                            if let Some(entry) = remove_generation(&registry, &identity, generation) {
                                warn!(%identity, ?event, reason = message, "connection lost");
                                entry.handle.close();
                            }
                        }
                    }
                }
            })
        };

        debug!(%identity, %target, "connecting");
        handle.connect(&target, listener);

        let settled: PrinterResult<()> = match timeout(self.connect_timeout, outcome).await {
            Ok(Ok((ConnectEvent::Success, _))) => Ok(()),
            Ok(Ok((ConnectEvent::Interrupt, message))) => {
                Err(PrinterError::ConnectionInterrupted(format!("{identity}: {message}")))
            }
            Ok(Ok((_, message))) => Err(PrinterError::ConnectionFailed(format!("{identity}: {message}"))),
            Ok(Err(_)) => Err(PrinterError::ConnectionFailed(format!(
                "{identity}: listener dropped without an outcome"
            ))),
            Err(_) => Err(PrinterError::Timeout(format!(
                "{identity}: no connect outcome within {:?}",
                self.connect_timeout
            ))),
        };

        settled?;

        let promoted: bool = lock(&self.registry)
            .get_mut(identity)
            .filter(|entry| entry.generation == generation)
            .map(|entry| entry.state = ConnectionState::Connected)
            .is_some();

        if !promoted {
            return Err(PrinterError::ConnectionInterrupted(format!(
                "{identity}: lost right after connecting"
            )));
        }

        pending.keep();
        Ok((handle, generation))
    }

    async fn resolve_target(&self, identity: &DeviceIdentity) -> PrinterResult<String> {
        match identity {
            DeviceIdentity::Network { ip_address } => Ok(ip_address.to_string()),
            DeviceIdentity::Usb { .. } => {
                let host: Arc<dyn UsbHost> = self
                    .usb
                    .clone()
                    .ok_or_else(|| PrinterError::Unsupported("no USB host configured".into()))?;
                let wanted: DeviceIdentity = identity.clone();
                let device: UsbDevice =
                    tokio::task::spawn_blocking(move || usb::find_device(host.as_ref(), &wanted))
                        .await
                        .map_err(|e| PrinterError::Protocol(format!("USB lookup task: {e}")))??;
                Ok(device.path)
            }
        }
    }
}

fn remove_generation(registry: &Registry, identity: &DeviceIdentity, generation: u64) -> Option<ConnectionEntry> {
    let mut entries = lock(registry);
    match entries.get(identity) {
        Some(entry) if entry.generation == generation => entries.remove(identity),
        _ => None,
    }
}

/// Releases one connection when dropped, unless a newer connect replaced it.
struct Lease<'a> {
    registry: &'a Registry,
    identity: &'a DeviceIdentity,
    generation: u64,
    handle: Arc<dyn DeviceConnection>,
    armed: bool,
}

impl<'a> Lease<'a> {
    fn new(
        registry: &'a Registry,
        identity: &'a DeviceIdentity,
        generation: u64,
        handle: Arc<dyn DeviceConnection>,
    ) -> Self {
        Self {
            registry,
            identity,
            generation,
            handle,
            armed: true,
        }
    }

    /// Leaves the entry registered.
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        remove_generation(self.registry, self.identity, self.generation);
        self.handle.close();
        debug!(identity = %self.identity, "released connection");
    }
}

/// Holds an identity's gate; the gate is forgotten once nobody else wants it.
struct GatePass<'a> {
    gates: &'a Gates,
    identity: DeviceIdentity,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut gates = lock(self.gates);
        if gates.get(&self.identity).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            gates.remove(&self.identity);
        }
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
