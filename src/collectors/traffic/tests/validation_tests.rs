//! Tests for throughput validation
//!
//! Covers the minimum interval guard, normal rate maths and counter resets.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::collectors::traffic::stats::{CalculationConfidence, TrafficSnapshot};
    use crate::collectors::traffic::validation::*;
    use crate::errors::ThroughputError;

    // Helper to build a pair of snapshots `gap` apart
    fn snapshot_pair(
        prev: (u64, u64),
        curr: (u64, u64),
        gap: Duration,
    ) -> (TrafficSnapshot, TrafficSnapshot) {
        let start = Instant::now();
        (
            TrafficSnapshot::new(prev.0, prev.1, start),
            TrafficSnapshot::new(curr.0, curr.1, start + gap),
        )
    }

    #[test]
    fn test_detect_counter_reset() {
        assert!(!detect_counter_reset(1000, 500, 1000, 500));
        assert!(!detect_counter_reset(2000, 600, 1000, 500));
        assert!(detect_counter_reset(10, 600, 1000, 500));
        assert!(detect_counter_reset(2000, 5, 1000, 500));
    }

    #[test]
    fn test_short_interval_is_rejected() {
        let (prev, curr) = snapshot_pair((1000, 500), (5000, 900), Duration::from_millis(999));

        let err = compute_throughput(&prev, &curr).unwrap_err();
        assert_eq!(
            err,
            ThroughputError::InsufficientInterval {
                elapsed: Duration::from_millis(999),
                minimum: MIN_SAMPLE_INTERVAL,
            }
        );
    }

    #[test]
    fn test_out_of_order_snapshots_are_rejected() {
        let (prev, curr) = snapshot_pair((1000, 500), (5000, 900), Duration::from_secs(2));

        // swapped: elapsed saturates to zero
        assert!(compute_throughput(&curr, &prev).is_err());
    }

    #[test]
    fn test_rates_over_one_second() {
        let (prev, curr) = snapshot_pair((1000, 500), (3048, 1012), Duration::from_secs(1));

        let sample = compute_throughput(&prev, &curr).unwrap();
        assert_eq!(sample.down_bytes_per_sec, 2048.0);
        assert_eq!(sample.up_bytes_per_sec, 512.0);
        assert_eq!(sample.interval_secs, 1.0);
        assert_eq!(sample.confidence, CalculationConfidence::High);
    }

    #[test]
    fn test_rates_are_normalised_by_interval() {
        let (prev, curr) = snapshot_pair((0, 0), (4096, 1000), Duration::from_secs(4));

        let sample = compute_throughput(&prev, &curr).unwrap();
        assert_eq!(sample.down_bytes_per_sec, 1024.0);
        assert_eq!(sample.up_bytes_per_sec, 250.0);
    }

    #[test]
    fn test_counter_reset_gives_zero_low_confidence_sample() {
        let (prev, curr) = snapshot_pair((9_000_000, 800_000), (1200, 300), Duration::from_secs(2));

        let sample = compute_throughput(&prev, &curr).unwrap();
        assert_eq!(sample.down_bytes_per_sec, 0.0);
        assert_eq!(sample.up_bytes_per_sec, 0.0);
        assert_eq!(sample.confidence, CalculationConfidence::Low);
        assert!(!sample.has_activity());
    }

    #[test]
    fn test_idle_link_is_high_confidence_zero() {
        let (prev, curr) = snapshot_pair((1000, 500), (1000, 500), Duration::from_secs(1));

        let sample = compute_throughput(&prev, &curr).unwrap();
        assert_eq!(sample.total_bytes_per_sec(), 0.0);
        assert_eq!(sample.confidence, CalculationConfidence::High);
    }
}
