//! # Address Parsing
//!
//! IP and MAC values cross the service boundary as strings. They are parsed
//! strictly into fixed-size byte arrays here and fail fast with
//! [`PrinterError::InvalidAddress`].

use std::net::Ipv4Addr;

use crate::error::{PrinterError, PrinterResult};

/// Parses a dotted quad (`"192.168.1.10"`) into its four octets.
///
/// Exactly four dot-separated decimal groups, each in `0..=255`.
pub fn parse_ipv4(s: &str) -> PrinterResult<[u8; 4]> {
    let parts: Vec<&str> = s.trim().split('.').collect();
    if parts.len() != 4 {
        return Err(PrinterError::InvalidAddress(format!(
            "expected 4 octets in '{s}', found {}",
            parts.len()
        )));
    }

    let mut octets: [u8; 4] = [0; 4];
    for (slot, part) in octets.iter_mut().zip(parts) {
        *slot = parse_decimal_octet(part)
            .ok_or_else(|| PrinterError::InvalidAddress(format!("invalid octet '{part}' in '{s}'")))?;
    }

    Ok(octets)
}

/// Same as [`parse_ipv4`] but returns the std address type.
pub fn parse_ipv4_addr(s: &str) -> PrinterResult<Ipv4Addr> {
    parse_ipv4(s).map(Ipv4Addr::from)
}

fn parse_decimal_octet(part: &str) -> Option<u8> {
    if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse::<u16>().ok().and_then(|v| u8::try_from(v).ok())
}

/// Parses `AA:BB:CC:DD:EE:FF` or `AA-BB-CC-DD-EE-FF` into six bytes.
pub fn parse_mac(s: &str) -> PrinterResult<[u8; 6]> {
    let groups: Vec<&str> = s.trim().split([':', '-']).collect();
    if groups.len() != 6 {
        return Err(PrinterError::InvalidAddress(format!(
            "expected 6 hex groups in '{s}', found {}",
            groups.len()
        )));
    }

    let mut bytes: [u8; 6] = [0; 6];
    for (slot, group) in bytes.iter_mut().zip(groups) {
        let valid: bool = group.len() == 2 && group.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(PrinterError::InvalidAddress(format!(
                "invalid hex group '{group}' in '{s}'"
            )));
        }
        *slot = u8::from_str_radix(group, 16)
            .map_err(|e| PrinterError::InvalidAddress(format!("invalid hex group '{group}': {e}")))?;
    }

    Ok(bytes)
}

/// Formats six bytes as upper-case, colon-separated hex.
pub fn format_mac(bytes: &[u8; 6]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<String>>()
        .join(":")
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
