//! Throughput calculation with interval and counter-reset validation
//!
//! Rates are only computed over intervals of at least [`MIN_SAMPLE_INTERVAL`].
//! Shorter pairs yield [`ThroughputError::InsufficientInterval`] and the caller
//! waits for a later snapshot instead.

use std::time::Duration;

use log::{debug, trace};

use crate::collectors::traffic::stats::{CalculationConfidence, ThroughputSample, TrafficSnapshot};
use crate::errors::ThroughputError;

pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Detects counter reset conditions (device reboot or interface re-creation)
///
/// Returns `true` when either counter is lower than before.
pub fn detect_counter_reset(current_rx: u64, current_tx: u64, prev_rx: u64, prev_tx: u64) -> bool {
    current_rx < prev_rx || current_tx < prev_tx
}

/// Derives a throughput sample from two snapshots
///
/// # Errors
///
/// [`ThroughputError::InsufficientInterval`] when `curr` was taken less than
/// one second after `prev` (including a `curr` older than `prev`).
///
/// # Counter resets
///
/// If any counter decreased the pair is treated as a new baseline: both rates
/// are zero and the sample is marked [`CalculationConfidence::Low`].
pub fn compute_throughput(
    prev: &TrafficSnapshot,
    curr: &TrafficSnapshot,
) -> Result<ThroughputSample, ThroughputError> {
    let elapsed = curr.instant.saturating_duration_since(prev.instant);
    if elapsed < MIN_SAMPLE_INTERVAL {
        trace!(
            "Interval too small for a throughput sample: {:.3}s < {:.3}s",
            elapsed.as_secs_f64(),
            MIN_SAMPLE_INTERVAL.as_secs_f64()
        );
        return Err(ThroughputError::InsufficientInterval {
            elapsed,
            minimum: MIN_SAMPLE_INTERVAL,
        });
    }

    let interval_secs = elapsed.as_secs_f64();

    if detect_counter_reset(
        curr.received_bytes,
        curr.transmitted_bytes,
        prev.received_bytes,
        prev.transmitted_bytes,
    ) {
        debug!(
            "Counter reset detected (rx: {} -> {}, tx: {} -> {}) - establishing new baseline",
            prev.received_bytes, curr.received_bytes, prev.transmitted_bytes, curr.transmitted_bytes
        );
        return Ok(ThroughputSample {
            down_bytes_per_sec: 0.0,
            up_bytes_per_sec: 0.0,
            interval_secs,
            confidence: CalculationConfidence::Low,
        });
    }

    let rx_delta = curr.received_bytes - prev.received_bytes;
    let tx_delta = curr.transmitted_bytes - prev.transmitted_bytes;

    let sample = ThroughputSample {
        down_bytes_per_sec: rx_delta as f64 / interval_secs,
        up_bytes_per_sec: tx_delta as f64 / interval_secs,
        interval_secs,
        confidence: CalculationConfidence::High,
    };

    trace!(
        "Throughput - down: {:.2} B/s, up: {:.2} B/s (rx_delta={}, tx_delta={}, interval={:.3}s)",
        sample.down_bytes_per_sec, sample.up_bytes_per_sec, rx_delta, tx_delta, interval_secs
    );

    Ok(sample)
}
