//! Events emitted by the monitoring core to the presentation layer

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::collectors::network_status::NetworkStatus;
use crate::collectors::traffic::ThroughputSample;
use crate::controller::TestState;

const EVENT_CAPACITY: usize = 256;

/// How prominently a device status line should be shown
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum MonitorEvent {
    /// Device attach/detach or a bridge problem seen while polling
    DeviceStatus {
        text: String,
        severity: Severity,
        connected: bool,
    },

    /// Device and network state captured when a test starts
    Environment {
        device: String,
        network: NetworkStatus,
    },

    /// One throughput measurement over at least one second
    Throughput {
        sample: ThroughputSample,
        text: String,
    },

    /// Countdown progress of the running test
    Tick { elapsed: u32, remaining: u32 },

    StateChanged { state: TestState },

    /// The test ran its full duration without a network failure
    Completed { duration: u32 },

    /// Terminal network failure. When `capture_pending` is set a
    /// `CaptureCompleted` event follows and carries the final outcome.
    NetworkFailure {
        reason: String,
        capture_pending: bool,
    },

    /// A diagnostic bundle capture has begun; the device must stay attached
    CaptureStarted { directory: String },

    CaptureCompleted {
        path: Option<String>,
        error: Option<String>,
        original_reason: String,
    },
}

/// Broadcast fan-out for [`MonitorEvent`]s. Cloning yields another emitter.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Emits to current subscribers. Having none is not an error.
    pub fn emit(&self, event: MonitorEvent) {
        log::trace!("event: {event:?}");
        let _ = self.sender.send(event);
    }
}
