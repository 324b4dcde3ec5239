//! Reads cumulative interface counters from the device
//!
//! The source is the kernel's `/proc/net/dev`, read through `adb shell cat`.
//! Each data line looks like
//!
//! ```text
//!  wlan0: 123456  789 0 0 0 0 0 0  65432  321 0 0 0 0 0 0
//! ```
//!
//! where field 0 after the colon is received bytes and field 8 is transmitted
//! bytes.

use log::{debug, trace, warn};
use tokio::time::Instant;

use crate::bridge::DeviceBridge;
use crate::collectors::traffic::stats::{InterfaceCounters, TrafficSnapshot, total_counters};
use crate::errors::BridgeError;

pub const TRAFFIC_PSEUDO_FILE: &str = "/proc/net/dev";

const LOOPBACK: &str = "lo";
const RX_BYTES_FIELD: usize = 0;
const TX_BYTES_FIELD: usize = 8;

/// Parses the traffic pseudo-file into per-interface counters.
///
/// Header lines, the loopback interface and malformed lines (fewer than nine
/// fields after the colon, or non-numeric byte fields) are skipped; the rest
/// of the file is still parsed.
pub fn parse_interface_counters(output: &str) -> Vec<InterfaceCounters> {
    let mut interfaces = Vec::new();

    for line in output.lines() {
        let Some((name, data)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name == LOOPBACK {
            continue;
        }

        let fields: Vec<&str> = data.split_whitespace().collect();
        if fields.len() <= TX_BYTES_FIELD {
            trace!("Skipping short traffic line for '{}': {} fields", name, fields.len());
            continue;
        }

        match (
            fields[RX_BYTES_FIELD].parse::<u64>(),
            fields[TX_BYTES_FIELD].parse::<u64>(),
        ) {
            (Ok(received_bytes), Ok(transmitted_bytes)) => interfaces.push(InterfaceCounters {
                name: name.to_string(),
                received_bytes,
                transmitted_bytes,
            }),
            _ => {
                trace!("Skipping non-numeric traffic line for '{}'", name);
            }
        }
    }

    interfaces
}

/// Sums receive and transmit bytes over all non-loopback interfaces
pub fn sum_counters(output: &str) -> (u64, u64) {
    total_counters(&parse_interface_counters(output))
}

/// Takes [`TrafficSnapshot`]s from the attached device
#[derive(Debug, Clone)]
pub struct TrafficSampler {
    bridge: DeviceBridge,
    read_count: u64,
}

impl TrafficSampler {
    pub fn new(bridge: DeviceBridge) -> Self {
        Self {
            bridge,
            read_count: 0,
        }
    }

    /// Reads and sums the device's cumulative counters.
    ///
    /// A failed bridge command is returned as an error so the caller can keep
    /// its previous baseline rather than treat missing data as zero.
    pub async fn read_cumulative_counters(&mut self) -> Result<TrafficSnapshot, BridgeError> {
        self.read_count += 1;
        let output = match self.bridge.shell(&["cat", TRAFFIC_PSEUDO_FILE]).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Traffic read #{} failed: {}", self.read_count, e);
                return Err(e);
            }
        };

        let interfaces = parse_interface_counters(&output);
        let snapshot = TrafficSnapshot::from_interfaces(interfaces, Instant::now());

        debug!(
            "Traffic read #{}: rx={} tx={} across {} interfaces",
            self.read_count,
            snapshot.received_bytes,
            snapshot.transmitted_bytes,
            snapshot.interfaces.len()
        );

        Ok(snapshot)
    }

    pub fn read_count(&self) -> u64 {
        self.read_count
    }
}
