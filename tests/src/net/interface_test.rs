use std::net::Ipv4Addr;

use pnet::datalink::{MacAddr, NetworkInterface};
use pnet::ipnetwork::IpNetwork;
use posprobe_common::network::interface::{networks_from, NetworkInfo};
use posprobe_common::network::range::host_range_of;

const UP_BROADCAST: u32 = 69699;
const UP_LOOPBACK: u32 = 65609;
const POINT_TO_POINT: u32 = 69841;

fn iface(name: &str, flags: u32, ips: &[&str]) -> NetworkInterface {
    NetworkInterface {
        name: name.into(),
        description: String::new(),
        index: 0,
        mac: Some(MacAddr::new(0x02, 0, 0, 0, 0, 0x01)),
        ips: ips.iter().map(|ip| ip.parse::<IpNetwork>().unwrap()).collect(),
        flags,
    }
}

/*************************************************************
               A workstation with a bit of everything
**************************************************************/

fn workstation() -> Vec<NetworkInterface> {
    vec![
        iface("lo", UP_LOOPBACK, &["127.0.0.1/8", "::1/128"]),
        iface(
            "enp9s0",
            UP_BROADCAST,
            &["192.168.0.32/24", "2a02:908:8c1:b880::b054/128", "fe80::b3dd:5c39:7c29:48b6/64"],
        ),
        iface("tun0", POINT_TO_POINT, &["10.96.0.57/16", "fe80::c137:8964:5a63:efde/64"]),
        iface("ipv6leakintrf0", UP_BROADCAST, &["fdeb:446c:912d:8da::/64"]),
        iface("wlan0", UP_BROADCAST, &["192.168.1.42/24", "fe80::36cf:f6ff:fe9a:1122/64"]),
        iface("docker0", UP_BROADCAST, &["172.17.0.1/16"]),
        iface("veth1234", UP_BROADCAST, &["fe80::1a2b:3cff:fe4d:5e6f/64"]),
        iface("virbr0", UP_BROADCAST, &["192.168.122.1/24"]),
        iface("eth1", 0, &["10.0.0.15/24"]),
    ]
}

#[test]
fn only_physical_ipv4_networks_are_swept() {
    assert_eq!(
        networks_from(workstation()),
        vec![
            NetworkInfo::new("enp9s0", Ipv4Addr::new(192, 168, 0, 32), 24),
            NetworkInfo::new("wlan0", Ipv4Addr::new(192, 168, 1, 42), 24),
        ]
    );
}

#[test]
fn nothing_to_sweep_without_a_lan() {
    let interfaces = vec![
        iface("lo", UP_LOOPBACK, &["127.0.0.1/8"]),
        iface("tun0", POINT_TO_POINT, &["10.96.0.57/16"]),
        iface("veth1234", UP_BROADCAST, &["fe80::1a2b:3cff:fe4d:5e6f/64"]),
    ];
    assert!(networks_from(interfaces).is_empty());
}

#[test]
fn secondary_addresses_each_become_a_network() {
    let interfaces = vec![iface("eth0", UP_BROADCAST, &["192.168.10.5/24", "10.20.0.5/30"])];

    let networks = networks_from(interfaces);

    assert_eq!(networks.len(), 2);
    let hosts: Vec<Ipv4Addr> = host_range_of(networks[1].address, networks[1].prefix_length)
        .unwrap()
        .iter()
        .collect();
    assert_eq!(hosts, vec![Ipv4Addr::new(10, 20, 0, 5), Ipv4Addr::new(10, 20, 0, 6)]);
}
