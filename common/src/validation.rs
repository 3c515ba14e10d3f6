//! Argument checks for the operations exposed by the printer service.

use std::time::Duration;

use crate::error::{PrinterError, PrinterResult};
use crate::network::address;

/// Widest raster a supported 80 mm head can print, in dots.
pub const MAX_PRINT_WIDTH: u32 = 832;
pub const MAX_TIMEOUT: Duration = Duration::from_millis(30_000);

pub fn print_data(data: &[u8]) -> PrinterResult<()> {
    if data.is_empty() {
        return Err(PrinterError::InvalidArgument("print data is empty".into()));
    }
    Ok(())
}

pub fn print_width(width: u32) -> PrinterResult<()> {
    if width == 0 || width > MAX_PRINT_WIDTH {
        return Err(PrinterError::InvalidArgument(format!(
            "print width {width} outside 1..={MAX_PRINT_WIDTH}"
        )));
    }
    Ok(())
}

pub fn html(content: &str) -> PrinterResult<()> {
    let trimmed: &str = content.trim();
    if trimmed.is_empty() {
        return Err(PrinterError::InvalidArgument("HTML content is empty".into()));
    }
    if !trimmed.contains('<') || !trimmed.contains('>') {
        return Err(PrinterError::InvalidArgument("content does not look like HTML".into()));
    }
    Ok(())
}

pub fn port(port: u32) -> PrinterResult<u16> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| PrinterError::InvalidArgument(format!("port {port} outside 1..=65535")))
}

pub fn timeout(timeout: Duration) -> PrinterResult<()> {
    if timeout.is_zero() || timeout > MAX_TIMEOUT {
        return Err(PrinterError::InvalidArgument(format!(
            "timeout {}ms outside 1..={}ms",
            timeout.as_millis(),
            MAX_TIMEOUT.as_millis()
        )));
    }
    Ok(())
}

/// Parsed form of a static network configuration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSettings {
    pub ip: [u8; 4],
    pub mask: [u8; 4],
    pub gateway: [u8; 4],
    pub dhcp: bool,
}

pub fn network_settings(ip: &str, mask: &str, gateway: &str, dhcp: bool) -> PrinterResult<NetworkSettings> {
    let settings = NetworkSettings {
        ip: address::parse_ipv4(ip)?,
        mask: address::parse_ipv4(mask)?,
        gateway: address::parse_ipv4(gateway)?,
        dhcp,
    };

    let mask_bits: u32 = u32::from_be_bytes(settings.mask);
    if mask_bits.leading_ones() + mask_bits.trailing_zeros() != 32 {
        return Err(PrinterError::InvalidAddress(format!("'{mask}' is not a contiguous netmask")));
    }

    Ok(settings)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
