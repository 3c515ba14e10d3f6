//! # Host Range Calculation
//!
//! Turns a local interface address plus prefix length into the sequence of
//! host addresses on that subnet, excluding the network and broadcast
//! addresses. The range is a plain value: iterating it is lazy, and it can be
//! iterated again as many times as needed.

use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::{PrinterError, PrinterResult};
use crate::network::address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    /// A range that yields nothing.
    pub fn empty() -> Self {
        Self::new(Ipv4Addr::from(1u32), Ipv4Addr::from(0u32))
    }

    pub fn is_empty(&self) -> bool {
        u32::from(self.start_addr) > u32::from(self.end_addr)
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let span: u64 = u64::from(u32::from(self.end_addr)) - u64::from(u32::from(self.start_addr));
        (span + 1) as usize
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let value: u32 = addr.into();
        !self.is_empty() && value >= self.start_addr.into() && value <= self.end_addr.into()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + Send + 'static {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }
}

impl IntoIterator for &Ipv4Range {
    type Item = Ipv4Addr;
    type IntoIter = Box<dyn Iterator<Item = Ipv4Addr> + Send>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Full CIDR block including network and broadcast addresses.
pub fn cidr_range(ip: Ipv4Addr, prefix: u8) -> PrinterResult<Ipv4Range> {
    let network: Ipv4Network = Ipv4Network::new(ip, prefix)
        .map_err(|e| PrinterError::InvalidAddress(format!("{ip}/{prefix}: {e}")))?;

    Ok(Ipv4Range::new(network.network(), network.broadcast()))
}

/// Usable host addresses of the subnet `address/prefix`.
///
/// Prefix lengths 31 and 32 have no room between network and broadcast and
/// produce an empty range. Prefix 0, prefixes above 32, and anything that is
/// not a dotted-quad IPv4 address are rejected.
pub fn host_range(address: &str, prefix: u8) -> PrinterResult<Ipv4Range> {
    let ip: Ipv4Addr = address::parse_ipv4_addr(address)?;
    host_range_of(ip, prefix)
}

pub fn host_range_of(ip: Ipv4Addr, prefix: u8) -> PrinterResult<Ipv4Range> {
    if prefix == 0 || prefix > 32 {
        return Err(PrinterError::InvalidAddress(format!(
            "prefix length {prefix} outside 1..=32"
        )));
    }

    let mask: u32 = u32::MAX << (32 - u32::from(prefix));
    let network: u64 = u64::from(u32::from(ip) & mask);
    let broadcast: u64 = network | u64::from(!mask);

    let start: u64 = network + 1;
    let end: Option<u64> = broadcast.checked_sub(1);

    match end {
        Some(end) if start <= end => Ok(Ipv4Range::new(
            Ipv4Addr::from(start as u32),
            Ipv4Addr::from(end as u32),
        )),
        _ => Ok(Ipv4Range::empty()),
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
