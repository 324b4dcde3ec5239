//! Device presence polling
//!
//! Two states, no device or `HasDevice(id)`. Only a change of state is
//! announced, so an unchanged device list produces no events.

use std::time::Duration;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::bridge::{DeviceBridge, DeviceHandle, DeviceHandleWriter};
use crate::events::{EventBus, MonitorEvent, Severity};
use crate::monitors::{LoopHandle, pause_or_stop};

pub const PRESENCE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Connected(String),
    Disconnected,
    /// The bridge could not list devices; the known device is kept
    PollFailed(String),
    Unchanged,
}

/// Polls the bridge for attached devices and owns the only writer of the
/// device handle.
#[derive(Debug)]
pub struct DevicePresenceMonitor {
    bridge: DeviceBridge,
    writer: DeviceHandleWriter,
    events: EventBus,
    last_error: Option<String>,
}

impl DevicePresenceMonitor {
    pub fn new(bridge: DeviceBridge, writer: DeviceHandleWriter, events: EventBus) -> Self {
        Self {
            bridge,
            writer,
            events,
            last_error: None,
        }
    }

    /// A reader of the handle this monitor writes
    pub fn handle(&self) -> DeviceHandle {
        self.writer.handle()
    }

    /// Lists devices once and applies the transition, emitting a status
    /// event when something changed.
    pub async fn poll_once(&mut self) -> PresenceChange {
        let devices = match self.bridge.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                let text = e.to_string();
                if self.last_error.as_deref() == Some(text.as_str()) {
                    return PresenceChange::Unchanged;
                }
                warn!("Device poll failed: {}", text);
                self.last_error = Some(text.clone());
                // the kept device is still reported, so a later identical
                // listing needs no event to restore the flag
                self.events.emit(MonitorEvent::DeviceStatus {
                    text: format!("❌ Device bridge error: {text}"),
                    severity: Severity::Error,
                    connected: self.writer.current().is_some(),
                });
                return PresenceChange::PollFailed(text);
            }
        };
        self.last_error = None;

        let first = devices.into_iter().next();
        if !self.writer.set(first.clone()) {
            return PresenceChange::Unchanged;
        }

        match first {
            Some(id) => {
                info!("Device connected: {}", id);
                self.events.emit(MonitorEvent::DeviceStatus {
                    text: format!("✅ Device connected: {id}"),
                    severity: Severity::Ok,
                    connected: true,
                });
                PresenceChange::Connected(id)
            }
            None => {
                info!("Device disconnected");
                self.events.emit(MonitorEvent::DeviceStatus {
                    text: "⚠️ No device detected, please connect a phone".to_string(),
                    severity: Severity::Warning,
                    connected: false,
                });
                PresenceChange::Disconnected
            }
        }
    }

    /// Polls every two seconds until stopped
    pub fn spawn(mut self) -> LoopHandle {
        LoopHandle::spawn("presence", move |token: CancellationToken| async move {
            info!("Presence monitor started");
            loop {
                self.poll_once().await;
                if !pause_or_stop(&token, PRESENCE_POLL_INTERVAL).await {
                    break;
                }
            }
            info!("Presence monitor stopped");
        })
    }
}
