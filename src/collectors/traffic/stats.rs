//! Traffic snapshots and derived throughput samples
//!
//! A snapshot holds device-lifetime cumulative counters summed over all
//! non-loopback interfaces. A sample is the rate between two snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::collectors::traffic::formatting::format_speed;

/// Indicates the reliability of a throughput sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CalculationConfidence {
    /// Counters advanced normally over a full interval
    High,
    /// Counters went backwards (reboot or reset); the sample is a zeroed new baseline
    Low,
}

/// Counters for one interface line of the traffic pseudo-file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
}

/// Receive and transmit totals over `interfaces`, saturating at `u64::MAX`
pub fn total_counters(interfaces: &[InterfaceCounters]) -> (u64, u64) {
    interfaces.iter().fold((0u64, 0u64), |(rx, tx), iface| {
        (
            rx.saturating_add(iface.received_bytes),
            tx.saturating_add(iface.transmitted_bytes),
        )
    })
}

/// Cumulative byte counters at one instant
#[derive(Debug, Clone, Serialize)]
pub struct TrafficSnapshot {
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
    /// Wall-clock time of the read, for display
    pub captured_at: DateTime<Utc>,
    /// Monotonic time of the read; intervals are measured with this
    #[serde(skip)]
    pub instant: Instant,
    /// Per-interface breakdown the totals were summed from
    pub interfaces: Vec<InterfaceCounters>,
}

impl TrafficSnapshot {
    pub fn new(received_bytes: u64, transmitted_bytes: u64, instant: Instant) -> Self {
        Self {
            received_bytes,
            transmitted_bytes,
            captured_at: Utc::now(),
            instant,
            interfaces: Vec::new(),
        }
    }

    /// Builds a snapshot by summing interface counters taken at `instant`
    pub fn from_interfaces(interfaces: Vec<InterfaceCounters>, instant: Instant) -> Self {
        let (received_bytes, transmitted_bytes) = total_counters(&interfaces);
        Self {
            received_bytes,
            transmitted_bytes,
            captured_at: Utc::now(),
            instant,
            interfaces,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.received_bytes.saturating_add(self.transmitted_bytes)
    }
}

/// Download/upload rate over an interval of at least one second
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThroughputSample {
    pub down_bytes_per_sec: f64,
    pub up_bytes_per_sec: f64,
    /// Length of the measured interval in seconds
    pub interval_secs: f64,
    pub confidence: CalculationConfidence,
}

impl ThroughputSample {
    /// Speed line shown to the user, e.g. `⬇️ 1.5 KB/s   ⬆️ 300 B/s`
    pub fn text(&self) -> String {
        format!(
            "⬇️ {}   ⬆️ {}",
            format_speed(self.down_bytes_per_sec),
            format_speed(self.up_bytes_per_sec)
        )
    }

    pub fn total_bytes_per_sec(&self) -> f64 {
        self.down_bytes_per_sec + self.up_bytes_per_sec
    }

    pub fn has_activity(&self) -> bool {
        self.down_bytes_per_sec > 0.0 || self.up_bytes_per_sec > 0.0
    }
}
