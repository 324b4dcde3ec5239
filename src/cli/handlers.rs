use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, error, info};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep, timeout};

use crate::bridge::{DeviceBridge, DeviceHandle, DeviceInfo, device_handle};
use crate::capture::DiagnosticCapture;
use crate::cli::console::{ConsoleCommand, ConsolePresenter};
use crate::collectors::network_status::{NetworkStatus, network_status};
use crate::collectors::traffic::{
    MIN_SAMPLE_INTERVAL, ThroughputSample, TrafficSampler, TrafficSnapshot, compute_throughput,
    format_bytes,
};
use crate::config::AppConfig;
use crate::controller::TestRunController;
use crate::events::EventBus;
use crate::monitors::DevicePresenceMonitor;

#[derive(Debug, Serialize)]
struct InfoReport {
    device_id: String,
    summary: String,
    device: DeviceInfo,
    network: NetworkStatus,
}

#[derive(Debug, Serialize)]
struct TrafficReport {
    device_id: String,
    before: TrafficSnapshot,
    after: TrafficSnapshot,
    throughput: ThroughputSample,
}

pub struct CommandHandler {
    config: AppConfig,
}

impl CommandHandler {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn bridge(&self, device: DeviceHandle) -> DeviceBridge {
        DeviceBridge::from_settings(&self.config.bridge, device)
    }

    /// Bridge scoped to the first ready device
    async fn attached_bridge(&self) -> Result<(String, DeviceBridge)> {
        let devices = self
            .bridge(DeviceHandle::fixed(None))
            .list_devices()
            .await
            .context("Failed to list devices")?;
        let Some(id) = devices.into_iter().next() else {
            bail!("No device connected");
        };
        Ok((id.clone(), self.bridge(DeviceHandle::fixed(Some(id)))))
    }

    pub async fn handle_devices_command(&self) -> Result<()> {
        let devices = self
            .bridge(DeviceHandle::fixed(None))
            .list_devices()
            .await
            .context("Failed to list devices")?;

        if devices.is_empty() {
            println!("⚠️  No device detected, please connect a phone");
        } else {
            println!("Attached devices");
            println!("================");
            for id in devices {
                println!("  {id}");
            }
        }
        Ok(())
    }

    pub async fn handle_info_command(&self, json: bool) -> Result<()> {
        let (device_id, bridge) = self.attached_bridge().await?;
        let device = bridge.device_info().await;
        let network = network_status(&bridge, &self.config.health.ping_target).await;

        if json {
            let report = InfoReport {
                device_id,
                summary: device.to_string(),
                device,
                network,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("📱 Device:  {device_id}");
            println!("   Model:   {device}");
            println!(
                "   Brand:   {}",
                device.brand.as_deref().unwrap_or("Unknown")
            );
            println!("🌐 Network: {network}");
        }
        Ok(())
    }

    pub async fn handle_traffic_command(&self, measurement_duration: u64, json: bool) -> Result<()> {
        let (device_id, bridge) = self.attached_bridge().await?;
        let mut sampler = TrafficSampler::new(bridge);
        let wait = Duration::from_secs(measurement_duration).max(MIN_SAMPLE_INTERVAL);

        let before = sampler
            .read_cumulative_counters()
            .await
            .context("Failed to read traffic counters")?;
        if !json {
            println!("📊 Measuring for {}s...", wait.as_secs());
        }
        sleep(wait).await;
        let after = sampler
            .read_cumulative_counters()
            .await
            .context("Failed to read traffic counters")?;
        let throughput = compute_throughput(&before, &after)?;

        if json {
            let report = TrafficReport {
                device_id,
                before,
                after,
                throughput,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("\nDevice: {device_id}");
        for iface in &after.interfaces {
            println!(
                "  {:<16} rx {:>12}   tx {:>12}",
                iface.name,
                format_bytes(iface.received_bytes as f64),
                format_bytes(iface.transmitted_bytes as f64)
            );
        }
        println!("\n{}", throughput.text());
        Ok(())
    }

    pub async fn handle_capture_command(&self) -> Result<()> {
        let (_, bridge) = self.attached_bridge().await?;
        let capture = DiagnosticCapture::new(bridge, self.config.capture.clone());

        let mut job = capture.prepare("manual capture").await?;
        println!(
            "⏳ Capturing a full system log into {}",
            job.target_directory.display()
        );
        println!("   This takes 1-3 minutes; do not disconnect the phone!");

        let archive = capture.run(&mut job).await?;
        println!("✅ System log saved to:\n{}", archive.display());
        Ok(())
    }

    pub async fn handle_run_command(&self, duration_secs: u32, wait_device: u64) -> Result<()> {
        if duration_secs == 0 {
            bail!("Please set a test duration greater than zero");
        }

        let events = EventBus::new();
        let mut rx = events.subscribe();
        let (writer, mut device) = device_handle();
        let bridge = self.bridge(device.clone());

        let mut presence =
            DevicePresenceMonitor::new(bridge.clone(), writer, events.clone()).spawn();
        let (controller, controller_task) =
            TestRunController::spawn(bridge, &self.config, events.clone());
        let mut presenter = ConsolePresenter::new();

        println!("🔍 Waiting up to {wait_device}s for a device...");
        match timeout(Duration::from_secs(wait_device), device.wait_for_device()).await {
            Ok(Some(id)) => info!("Using device {}", id),
            _ => {
                presence.stop().await;
                bail!("No device connected within {wait_device}s");
            }
        }

        controller
            .start(duration_secs)
            .await
            .context("Could not start the test")?;

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(event) => {
                        if let Some(line) = presenter.render(&event) {
                            println!("{line}");
                        }
                        if ConsolePresenter::is_final(&event) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => debug!("Console skipped {} events", n),
                    Err(RecvError::Closed) => break,
                },
                line = stdin.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if !self.apply_console_command(&controller, &line).await {
                            break;
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        stdin_open = false;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    println!("\nInterrupted");
                    break;
                }
            }
        }

        controller.shutdown().await?;
        while let Ok(event) = rx.try_recv() {
            if let Some(line) = presenter.render(&event) {
                println!("{line}");
            }
        }
        presence.stop().await;
        controller_task.await.context("Controller task failed")?;
        Ok(())
    }

    /// Returns `false` when the user asked to quit
    async fn apply_console_command(&self, controller: &TestRunController, line: &str) -> bool {
        let Some(command) = ConsoleCommand::parse(line) else {
            if !line.trim().is_empty() {
                println!("Unknown command '{}'. Use stop, resume, restart, status or quit.", line.trim());
            }
            return true;
        };

        let result = match command {
            ConsoleCommand::Quit => return false,
            ConsoleCommand::Stop => controller.stop().await.map(|_| ()),
            ConsoleCommand::Resume => controller.resume().await.map(|_| ()),
            ConsoleCommand::Restart => controller.restart().await.map(|_| ()),
            ConsoleCommand::Status => controller.snapshot().await.map(|snapshot| {
                let progress = snapshot
                    .session
                    .map(|s| format!("{}/{}s", s.elapsed_secs, s.duration_secs))
                    .unwrap_or_default();
                println!(
                    "State: {} {}  Device: {}",
                    snapshot.state,
                    progress,
                    snapshot.device.as_deref().unwrap_or("none")
                );
            }),
        };

        if let Err(e) = result {
            println!("⚠️  {e}");
        }
        true
    }
}
