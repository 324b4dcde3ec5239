//! Network health sampling during a test run
//!
//! Each iteration probes reachability (with one retry after 0.5 s), then reads
//! the traffic counters and reports throughput once a full second has passed
//! since the last sample. Two consecutive failed probes end the loop with a
//! single [`HealthEvent::Failed`].

use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bridge::DeviceBridge;
use crate::collectors::network_status::probe_reachability;
use crate::collectors::traffic::{
    ThroughputSample, TrafficSampler, TrafficSnapshot, compute_throughput,
};
use crate::monitors::{LoopHandle, pause_or_stop};

pub const HEALTH_LOOP_INTERVAL: Duration = Duration::from_secs(1);
pub const PROBE_RETRY_BACKOFF: Duration = Duration::from_millis(500);
pub const PING_LOSS_REASON: &str = "network connectivity lost: ping packet loss";

/// Terminal failure of a monitoring session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureEvent {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HealthEvent {
    Throughput(ThroughputSample),
    Failed(FailureEvent),
}

/// How a monitoring session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    Stopped,
    Failed,
}

#[derive(Debug)]
pub struct NetworkHealthMonitor {
    bridge: DeviceBridge,
    sampler: TrafficSampler,
    ping_target: String,
    baseline: Option<TrafficSnapshot>,
}

impl NetworkHealthMonitor {
    pub fn new(bridge: DeviceBridge, ping_target: impl Into<String>) -> Self {
        Self {
            sampler: TrafficSampler::new(bridge.clone()),
            bridge,
            ping_target: ping_target.into(),
            baseline: None,
        }
    }

    /// Starts a monitoring session reporting on `events`
    pub fn spawn(mut self, events: mpsc::UnboundedSender<HealthEvent>) -> LoopHandle {
        LoopHandle::spawn("health", move |token| async move {
            let outcome = self.run(&events, &token).await;
            info!("Health monitor ended: {:?}", outcome);
        })
    }

    /// Runs until stopped or until reachability is lost
    pub async fn run(
        &mut self,
        events: &mpsc::UnboundedSender<HealthEvent>,
        token: &CancellationToken,
    ) -> HealthOutcome {
        info!("Health monitor started, probing {}", self.ping_target);
        self.baseline = self.sampler.read_cumulative_counters().await.ok();

        loop {
            if token.is_cancelled() {
                return HealthOutcome::Stopped;
            }

            match self.probe_with_retry(token).await {
                Some(true) => {}
                Some(false) => {
                    warn!("Reachability lost after retry");
                    let _ = events.send(HealthEvent::Failed(FailureEvent {
                        reason: PING_LOSS_REASON.to_string(),
                    }));
                    return HealthOutcome::Failed;
                }
                None => return HealthOutcome::Stopped,
            }

            if let Some(sample) = self.sample_throughput().await {
                if events.send(HealthEvent::Throughput(sample)).is_err() {
                    debug!("Health event receiver dropped");
                    return HealthOutcome::Stopped;
                }
            }

            if !pause_or_stop(token, HEALTH_LOOP_INTERVAL).await {
                return HealthOutcome::Stopped;
            }
        }
    }

    /// `None` when stopped during the retry backoff
    async fn probe_with_retry(&self, token: &CancellationToken) -> Option<bool> {
        if probe_reachability(&self.bridge, &self.ping_target).await {
            return Some(true);
        }
        debug!("Probe failed, retrying in {:?}", PROBE_RETRY_BACKOFF);
        if !pause_or_stop(token, PROBE_RETRY_BACKOFF).await {
            return None;
        }
        Some(probe_reachability(&self.bridge, &self.ping_target).await)
    }

    /// Reads counters and derives a sample against the stored baseline.
    /// The baseline only moves when a sample is produced.
    async fn sample_throughput(&mut self) -> Option<ThroughputSample> {
        let current = self.sampler.read_cumulative_counters().await.ok()?;

        let Some(previous) = &self.baseline else {
            self.baseline = Some(current);
            return None;
        };

        match compute_throughput(previous, &current) {
            Ok(sample) => {
                self.baseline = Some(current);
                Some(sample)
            }
            Err(e) => {
                debug!("Waiting for a longer interval: {}", e);
                None
            }
        }
    }
}
