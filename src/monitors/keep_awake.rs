//! Periodic swipe that keeps the device screen on during a run

use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::bridge::DeviceBridge;
use crate::config::KeepAwakeSettings;
use crate::errors::log_absorbed;
use crate::monitors::LoopHandle;

pub const KEEP_AWAKE_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct KeepAwake {
    bridge: DeviceBridge,
    swipe_args: Vec<String>,
}

impl KeepAwake {
    pub fn new(bridge: DeviceBridge, settings: &KeepAwakeSettings) -> Self {
        Self {
            bridge,
            swipe_args: settings.swipe_args(),
        }
    }

    /// One swipe; a failure is logged and otherwise ignored
    pub async fn swipe(&self) {
        let args: Vec<&str> = self.swipe_args.iter().map(String::as_str).collect();
        match self.bridge.shell(&args).await {
            Ok(_) => debug!("keep-awake swipe sent"),
            Err(e) => log_absorbed("keep-awake swipe", &e),
        }
    }

    /// Fires a swipe on a fixed two-second cadence, first after one full
    /// interval. Swipes are not awaited by the loop; a tick that finds the
    /// previous swipe still running is skipped. Stopping waits for a swipe
    /// already in flight.
    pub fn spawn(self) -> LoopHandle {
        LoopHandle::spawn("keep-awake", move |token| async move {
            info!("Keep-awake started");
            let mut ticker = interval_at(Instant::now() + KEEP_AWAKE_INTERVAL, KEEP_AWAKE_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut in_flight: Option<JoinHandle<()>> = None;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if in_flight.as_ref().is_some_and(|swipe| !swipe.is_finished()) {
                            debug!("keep-awake swipe still running, skipping tick");
                            continue;
                        }
                        let keep_awake = self.clone();
                        in_flight = Some(tokio::spawn(async move { keep_awake.swipe().await }));
                    }
                }
            }
            if let Some(swipe) = in_flight {
                if let Err(e) = swipe.await {
                    warn!("keep-awake swipe ended abnormally: {}", e);
                }
            }
            debug!("Keep-awake stopped");
        })
    }
}
