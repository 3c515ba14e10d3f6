//! # Local Interfaces
//!
//! Enumerates the local IPv4 networks the port-probe scanner should sweep.
//! Virtual adapters (container bridges, hypervisor NICs, tunnels) are filtered
//! out by name heuristics because sweeping them only finds ourselves.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::IpNetwork;
use tracing::debug;

/// One local IPv4 interface, used only to derive a host range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkInfo {
    pub name: String,
    pub address: Ipv4Addr,
    pub prefix_length: u8,
}

impl NetworkInfo {
    pub fn new(name: impl Into<String>, address: Ipv4Addr, prefix_length: u8) -> Self {
        Self {
            name: name.into(),
            address,
            prefix_length,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    /// The interface is operationally down.
    IsDown,
    /// Loopback never hosts a printer.
    IsLoopback,
    /// The name matches a known virtual adapter pattern.
    IsVirtual,
    /// The interface carries no IPv4 address with a usable prefix.
    NoUsableIpv4,
}

/// Name fragments of adapters that are never worth sweeping.
const VIRTUAL_NAME_HINTS: &[&str] = &["vir", "docker", "veth", "br-", "vmnet", "vbox", "tun", "tap"];

/// All viable local IPv4 networks, one entry per distinct address.
pub fn local_networks() -> Vec<NetworkInfo> {
    networks_from(pnet::datalink::interfaces())
}

pub fn networks_from(interfaces: Vec<NetworkInterface>) -> Vec<NetworkInfo> {
    let mut seen: HashSet<Ipv4Addr> = HashSet::new();
    let mut networks: Vec<NetworkInfo> = Vec::new();

    for interface in interfaces {
        if let Err(reason) = is_viable_scan_interface(&interface) {
            debug!(interface = %interface.name, ?reason, "skipping interface");
            continue;
        }

        for net in usable_ipv4_networks(&interface) {
            if seen.insert(net.address) {
                networks.push(net);
            }
        }
    }

    networks
}

fn is_viable_scan_interface(interface: &NetworkInterface) -> Result<(), ViabilityError> {
    if !interface.is_up() {
        return Err(ViabilityError::IsDown);
    }
    if interface.is_loopback() {
        return Err(ViabilityError::IsLoopback);
    }
    if is_virtual_name(&interface.name) {
        return Err(ViabilityError::IsVirtual);
    }
    if usable_ipv4_networks(interface).is_empty() {
        return Err(ViabilityError::NoUsableIpv4);
    }

    Ok(())
}

fn is_virtual_name(name: &str) -> bool {
    let lower: String = name.to_ascii_lowercase();
    VIRTUAL_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

fn usable_ipv4_networks(interface: &NetworkInterface) -> Vec<NetworkInfo> {
    interface
        .ips
        .iter()
        .filter_map(|net| match net {
            IpNetwork::V4(v4) if (1..=31).contains(&v4.prefix()) && !v4.ip().is_loopback() => {
                Some(NetworkInfo::new(interface.name.clone(), v4.ip(), v4.prefix()))
            }
            _ => None,
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
