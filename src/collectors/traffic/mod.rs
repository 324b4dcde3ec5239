//! Device traffic collection
//!
//! - `sampler`: reads the kernel traffic pseudo-file through the bridge
//! - `stats`: snapshot and throughput sample types
//! - `validation`: interval guard, counter reset handling and rate maths
//! - `formatting`: human-scaled speed, byte and countdown strings

pub mod formatting;
pub mod sampler;
pub mod stats;
pub mod validation;

pub use formatting::{format_bytes, format_countdown, format_speed};
pub use sampler::{TrafficSampler, parse_interface_counters, sum_counters};
pub use stats::{CalculationConfidence, InterfaceCounters, ThroughputSample, TrafficSnapshot};
pub use validation::{MIN_SAMPLE_INTERVAL, compute_throughput};

#[cfg(test)]
pub mod tests;
