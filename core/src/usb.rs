//! # USB Host Access
//!
//! [`UsbHost`] is the narrow view of the operating system's USB stack the
//! scanner and the connection manager need. [`NusbHost`] implements it on top
//! of `nusb`.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use nusb::{DeviceInfo, MaybeFuture};
use posprobe_common::error::{PrinterError, PrinterResult};
use posprobe_common::printer::DeviceIdentity;

use crate::lock;

/// USB interface class code for printers.
pub const PRINTER_INTERFACE_CLASS: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsbDevice {
    /// Host-specific path used as the connect target.
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
}

/// Blocking access to the attached USB devices.
pub trait UsbHost: Send + Sync {
    fn devices(&self) -> anyhow::Result<Vec<UsbDevice>>;

    fn interface_classes(&self, device: &UsbDevice) -> anyhow::Result<Vec<u8>>;

    fn has_permission(&self, device: &UsbDevice) -> bool;

    /// Only meaningful once permission is held.
    fn serial_number(&self, device: &UsbDevice) -> Option<String>;
}

pub fn is_printer(host: &dyn UsbHost, device: &UsbDevice) -> anyhow::Result<bool> {
    let classes: Vec<u8> = host.interface_classes(device)?;
    Ok(classes.contains(&PRINTER_INTERFACE_CLASS))
}

/// Finds the attached device behind `identity` and checks it can be opened.
///
/// Only devices with the identity's vendor and product id are opened. A
/// device whose serial is unreadable is not ruled out by a serial on the
/// identity; the permission check that follows decides.
pub fn find_device(host: &dyn UsbHost, identity: &DeviceIdentity) -> PrinterResult<UsbDevice> {
    let devices: Vec<UsbDevice> = host
        .devices()
        .map_err(|e| PrinterError::DeviceNotFound(format!("{identity}: {e:#}")))?;

    let mut candidates = devices
        .into_iter()
        .filter(|device| identity.matches_usb_device(device.vendor_id, device.product_id, None));

    let found: Option<(UsbDevice, bool)> = candidates.find_map(|device| {
        let permitted: bool = host.has_permission(&device);
        let serial: Option<String> = if permitted { host.serial_number(&device) } else { None };
        identity
            .matches_usb_device(device.vendor_id, device.product_id, serial.as_deref())
            .then_some((device, permitted))
    });

    match found {
        None => Err(PrinterError::DeviceNotFound(identity.id())),
        Some((device, false)) => Err(PrinterError::PermissionDenied(format!(
            "{identity} at {}",
            device.path
        ))),
        Some((device, true)) => Ok(device),
    }
}

/// `nusb` backed host. Device descriptors from the latest enumeration are
/// cached so later per-device queries do not re-walk the bus.
#[derive(Default)]
pub struct NusbHost {
    cache: Mutex<HashMap<String, DeviceInfo>>,
}

impl NusbHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn info(&self, device: &UsbDevice) -> anyhow::Result<DeviceInfo> {
        lock(&self.cache)
            .get(&device.path)
            .cloned()
            .with_context(|| format!("{} is no longer attached", device.path))
    }
}

impl UsbHost for NusbHost {
    fn devices(&self) -> anyhow::Result<Vec<UsbDevice>> {
        let infos: Vec<DeviceInfo> = nusb::list_devices()
            .wait()
            .context("enumerating USB devices")?
            .collect();

        let mut cache = lock(&self.cache);
        cache.clear();

        let devices: Vec<UsbDevice> = infos
            .into_iter()
            .map(|info| {
                let device = UsbDevice {
                    path: format!("{}:{}", info.bus_id(), info.device_address()),
                    vendor_id: info.vendor_id(),
                    product_id: info.product_id(),
                    manufacturer: info.manufacturer_string().map(str::to_string),
                    product_name: info.product_string().map(str::to_string),
                };
                cache.insert(device.path.clone(), info);
                device
            })
            .collect();

        Ok(devices)
    }

    fn interface_classes(&self, device: &UsbDevice) -> anyhow::Result<Vec<u8>> {
        let info: DeviceInfo = self.info(device)?;
        Ok(info.interfaces().map(|interface| interface.class()).collect())
    }

    fn has_permission(&self, device: &UsbDevice) -> bool {
        self.info(device)
            .map(|info| info.open().wait().is_ok())
            .unwrap_or(false)
    }

    fn serial_number(&self, device: &UsbDevice) -> Option<String> {
        self.info(device)
            .ok()
            .and_then(|info| info.serial_number().map(str::to_string))
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
