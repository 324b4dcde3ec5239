//! Network classification of the attached device
//!
//! Combines the device's IPv4 address listing (`ip -o -4 addr show up`) with
//! a single reachability probe.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::bridge::DeviceBridge;
use crate::errors::log_absorbed;

/// Marker a successful single-packet probe prints
pub const PING_SUCCESS_MARKER: &str = "1 packets transmitted, 1 received";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterfaceKind {
    WiFi,
    Cellular,
    Ethernet,
}

impl InterfaceKind {
    /// Maps an interface name prefix to its kind
    pub fn from_interface_name(name: &str) -> Option<Self> {
        if name.starts_with("wlan") {
            Some(InterfaceKind::WiFi)
        } else if name.starts_with("rmnet") || name.starts_with("ccmni") {
            Some(InterfaceKind::Cellular)
        } else if name.starts_with("eth") {
            Some(InterfaceKind::Ethernet)
        } else {
            None
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InterfaceKind::WiFi => "Wi-Fi",
            InterfaceKind::Cellular => "Cellular",
            InterfaceKind::Ethernet => "Ethernet",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NetworkStatus {
    Connected {
        interface_kinds: BTreeSet<InterfaceKind>,
        internet_reachable: bool,
    },
    /// No interface holds an IPv4 address
    Disconnected,
    /// The address listing could not be read
    Unknown,
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkStatus::Connected {
                interface_kinds,
                internet_reachable,
            } => {
                let kinds: Vec<String> = interface_kinds.iter().map(|k| k.to_string()).collect();
                let reach = if *internet_reachable {
                    "internet reachable"
                } else {
                    "no internet access"
                };
                write!(f, "{} ({})", kinds.join(" + "), reach)
            }
            NetworkStatus::Disconnected => f.write_str("No network connection (no IPv4 address)"),
            NetworkStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Classifies the output of `ip -o -4 addr show up`.
///
/// Each line reads like `30: wlan0    inet 192.168.1.5/24 ...`; the second
/// field is the interface name.
pub fn classify(ip_output: &str, internet_reachable: bool) -> NetworkStatus {
    let interface_kinds: BTreeSet<InterfaceKind> = ip_output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(InterfaceKind::from_interface_name)
        .collect();

    if interface_kinds.is_empty() {
        NetworkStatus::Disconnected
    } else {
        NetworkStatus::Connected {
            interface_kinds,
            internet_reachable,
        }
    }
}

pub fn ping_succeeded(output: &str) -> bool {
    output.contains(PING_SUCCESS_MARKER)
}

/// One single-packet probe with a one second deadline.
/// Any bridge failure counts as unreachable.
pub async fn probe_reachability(bridge: &DeviceBridge, target: &str) -> bool {
    match bridge.shell(&["ping", "-c", "1", "-w", "1", target]).await {
        Ok(output) => {
            trace!("ping output: {output}");
            ping_succeeded(&output)
        }
        Err(e) => {
            debug!("Probe to {target} failed: {e}");
            false
        }
    }
}

/// Current network classification of the attached device
pub async fn network_status(bridge: &DeviceBridge, target: &str) -> NetworkStatus {
    let reachable = probe_reachability(bridge, target).await;

    match bridge.shell(&["ip", "-o", "-4", "addr", "show", "up"]).await {
        Ok(output) => classify(&output, reachable),
        Err(e) => {
            log_absorbed("listing device addresses", &e);
            NetworkStatus::Unknown
        }
    }
}
