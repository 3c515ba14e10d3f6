//! # Printer Model
//!
//! Identity and discovery records shared by every crate in the workspace.
//!
//! A printer is reachable over exactly one [`Transport`]; the transport-specific
//! fields live in the variants of [`DeviceIdentity`] and [`ConnectionParams`]
//! so that a record can never carry both (or neither) payload.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::PrinterError;
use crate::network::address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Usb,
    Network,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Usb => write!(f, "USB"),
            Transport::Network => write!(f, "NETWORK"),
        }
    }
}

/// Stable key used to deduplicate discovery results and to key connections.
///
/// Equality is strict: a USB identity without a serial number is a different
/// identity from one with a serial. Device *lookup* is looser, see
/// [`DeviceIdentity::matches_usb_device`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceIdentity {
    Usb {
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<String>,
    },
    Network {
        ip_address: Ipv4Addr,
    },
}

impl DeviceIdentity {
    pub fn usb(vendor_id: u16, product_id: u16, serial_number: Option<String>) -> Self {
        DeviceIdentity::Usb {
            vendor_id,
            product_id,
            serial_number: serial_number.filter(|s| !s.is_empty()),
        }
    }

    /// Builds a network identity from a dotted-quad string.
    pub fn network(ip_address: &str) -> Result<Self, PrinterError> {
        Ok(DeviceIdentity::Network {
            ip_address: address::parse_ipv4_addr(ip_address)?,
        })
    }

    pub fn transport(&self) -> Transport {
        match self {
            DeviceIdentity::Usb { .. } => Transport::Usb,
            DeviceIdentity::Network { .. } => Transport::Network,
        }
    }

    /// `usb:<vid>:<pid>:<serial|null>` or `net:<ip>`.
    pub fn id(&self) -> String {
        match self {
            DeviceIdentity::Usb {
                vendor_id,
                product_id,
                serial_number,
            } => format!(
                "usb:{vendor_id}:{product_id}:{}",
                serial_number.as_deref().unwrap_or("null")
            ),
            DeviceIdentity::Network { ip_address } => format!("net:{ip_address}"),
        }
    }

    /// Lookup tolerance: a missing serial on the identity matches any device
    /// with the same vendor and product id, and a device whose serial cannot
    /// be read (no permission yet) is not ruled out by it.
    pub fn matches_usb_device(&self, vendor_id: u16, product_id: u16, serial: Option<&str>) -> bool {
        match self {
            DeviceIdentity::Usb {
                vendor_id: vid,
                product_id: pid,
                serial_number,
            } => {
                if *vid != vendor_id || *pid != product_id {
                    return false;
                }
                match (serial_number.as_deref(), serial) {
                    (None, _) | (_, None) => true,
                    (Some(wanted), Some(actual)) => wanted == actual,
                }
            }
            DeviceIdentity::Network { .. } => false,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for DeviceIdentity {
    type Err = PrinterError;

    /// Accepts the `id()` form, `usb:<vid>:<pid>` with hex (`0x`) or decimal
    /// ids, or a bare dotted-quad address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: &str = s.trim();

        if let Some(ip) = s.strip_prefix("net:") {
            return DeviceIdentity::network(ip);
        }

        if let Some(rest) = s.strip_prefix("usb:") {
            let parts: Vec<&str> = rest.splitn(3, ':').collect();
            if parts.len() < 2 {
                return Err(PrinterError::InvalidArgument(format!(
                    "expected usb:<vid>:<pid>[:<serial>], got '{s}'"
                )));
            }
            let vendor_id: u16 = parse_usb_id(parts[0])?;
            let product_id: u16 = parse_usb_id(parts[1])?;
            let serial: Option<String> = parts
                .get(2)
                .filter(|serial| **serial != "null")
                .map(|serial| serial.to_string());
            return Ok(DeviceIdentity::usb(vendor_id, product_id, serial));
        }

        DeviceIdentity::network(s)
    }
}

fn parse_usb_id(s: &str) -> Result<u16, PrinterError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| PrinterError::InvalidArgument(format!("invalid USB id '{s}': {e}")))
}

/// Command language spoken by a printer's firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrinterLanguage {
    Esc,
    Zpl,
    Tspl,
    Cpcl,
    Unknown,
}

impl fmt::Display for PrinterLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = match self {
            PrinterLanguage::Esc => "ESC",
            PrinterLanguage::Zpl => "ZPL",
            PrinterLanguage::Tspl => "TSPL",
            PrinterLanguage::Cpcl => "CPCL",
            PrinterLanguage::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

impl FromStr for PrinterLanguage {
    type Err = PrinterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "esc" | "escpos" | "esc/pos" => Ok(PrinterLanguage::Esc),
            "zpl" => Ok(PrinterLanguage::Zpl),
            "tspl" => Ok(PrinterLanguage::Tspl),
            "cpcl" => Ok(PrinterLanguage::Cpcl),
            "unknown" => Ok(PrinterLanguage::Unknown),
            other => Err(PrinterError::InvalidArgument(format!("unknown printer language '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbParams {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub ip_address: Ipv4Addr,
    pub mac_address: Option<String>,
    pub mask: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub dhcp: Option<bool>,
}

impl NetworkParams {
    pub fn from_ip(ip_address: Ipv4Addr) -> Self {
        Self {
            ip_address,
            mac_address: None,
            mask: None,
            gateway: None,
            dhcp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionParams {
    Usb(UsbParams),
    Network(NetworkParams),
}

/// A printer found by one of the scanners.
///
/// Never mutated: language detection yields a new value with the same `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPrinter {
    pub id: String,
    pub params: ConnectionParams,
    pub language: Option<PrinterLanguage>,
}

impl DiscoveredPrinter {
    pub fn usb(params: UsbParams) -> Self {
        let identity = DeviceIdentity::usb(params.vendor_id, params.product_id, params.serial_number.clone());
        Self {
            id: identity.id(),
            params: ConnectionParams::Usb(params),
            language: None,
        }
    }

    pub fn network(params: NetworkParams) -> Self {
        let identity = DeviceIdentity::Network {
            ip_address: params.ip_address,
        };
        Self {
            id: identity.id(),
            params: ConnectionParams::Network(params),
            language: None,
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        match &self.params {
            ConnectionParams::Usb(usb) => {
                DeviceIdentity::usb(usb.vendor_id, usb.product_id, usb.serial_number.clone())
            }
            ConnectionParams::Network(net) => DeviceIdentity::Network {
                ip_address: net.ip_address,
            },
        }
    }

    pub fn transport(&self) -> Transport {
        match self.params {
            ConnectionParams::Usb(_) => Transport::Usb,
            ConnectionParams::Network(_) => Transport::Network,
        }
    }

    pub fn ip_address(&self) -> Option<Ipv4Addr> {
        match &self.params {
            ConnectionParams::Network(net) => Some(net.ip_address),
            ConnectionParams::Usb(_) => None,
        }
    }

    pub fn with_language(self, language: PrinterLanguage) -> Self {
        Self {
            language: Some(language),
            ..self
        }
    }
}

/// Which discovery phases run, and which languages the caller cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFilter {
    pub usb: bool,
    pub broadcast: bool,
    pub port_probe: bool,
    pub languages: Option<HashSet<PrinterLanguage>>,
    pub detect_language: bool,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        Self {
            usb: true,
            broadcast: true,
            port_probe: true,
            languages: None,
            detect_language: false,
        }
    }
}

impl DiscoveryFilter {
    pub fn with_languages(mut self, languages: impl IntoIterator<Item = PrinterLanguage>) -> Self {
        self.languages = Some(languages.into_iter().collect());
        self
    }

    /// A language filter can only be applied to detected languages.
    pub fn needs_detection(&self) -> bool {
        self.detect_language || self.languages.is_some()
    }

    /// Undetected and `Unknown` languages never satisfy an active filter.
    pub fn accepts(&self, printer: &DiscoveredPrinter) -> bool {
        let Some(wanted) = &self.languages else {
            return true;
        };
        match printer.language {
            Some(PrinterLanguage::Unknown) | None => false,
            Some(language) => wanted.contains(&language),
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
