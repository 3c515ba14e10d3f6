use colored::*;
use posprobe_common::printer::{ConnectionParams, DiscoveredPrinter, NetworkParams, UsbParams};

use crate::terminal::colors;

pub type Detail = (String, ColoredString);

/// Name used as the tree head of a printer.
pub fn display_name(printer: &DiscoveredPrinter) -> String {
    match &printer.params {
        ConnectionParams::Usb(usb) => match (&usb.manufacturer, &usb.product_name) {
            (Some(vendor), Some(product)) => format!("{vendor} {product}"),
            (None, Some(product)) => product.clone(),
            _ => "USB printer".to_string(),
        },
        ConnectionParams::Network(net) => net.ip_address.to_string(),
    }
}

pub fn printer_to_details(printer: &DiscoveredPrinter) -> Vec<Detail> {
    let mut details: Vec<Detail> = vec![
        ("Id".to_string(), printer.id.normal()),
        ("Via".to_string(), printer.transport().to_string().color(colors::SECONDARY)),
    ];

    match &printer.params {
        ConnectionParams::Usb(usb) => details.extend(usb_details(usb)),
        ConnectionParams::Network(net) => details.extend(network_details(net)),
    }

    if let Some(language) = printer.language {
        details.push(("Language".to_string(), language.to_string().color(colors::LANGUAGE)));
    }

    details
}

fn usb_details(usb: &UsbParams) -> Vec<Detail> {
    let ids: ColoredString = format!("{:04x}:{:04x}", usb.vendor_id, usb.product_id).color(colors::USB_ID);
    let mut details: Vec<Detail> = vec![("USB".to_string(), ids)];
    if let Some(serial) = &usb.serial_number {
        details.push(("Serial".to_string(), serial.normal()));
    }
    details
}

fn network_details(net: &NetworkParams) -> Vec<Detail> {
    let mut details: Vec<Detail> = vec![("IPv4".to_string(), net.ip_address.to_string().color(colors::IPV4_ADDR))];
    if let Some(mac) = &net.mac_address {
        details.push(("MAC".to_string(), mac.color(colors::MAC_ADDR)));
    }
    if let Some(mask) = net.mask {
        details.push(("Mask".to_string(), mask.to_string().normal()));
    }
    if let Some(gateway) = net.gateway {
        details.push(("Gateway".to_string(), gateway.to_string().normal()));
    }
    if let Some(dhcp) = net.dhcp {
        details.push(("DHCP".to_string(), if dhcp { "on" } else { "off" }.normal()));
    }
    details
}
