//! Console rendering of monitor events and parsing of interactive commands

use std::path::PathBuf;

use crate::capture::compose_failure_message;
use crate::collectors::traffic::format_countdown;
use crate::controller::TestState;
use crate::events::MonitorEvent;

/// Commands typed on stdin during `dnw run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Stop,
    Resume,
    Restart,
    Status,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "stop" | "pause" => Some(ConsoleCommand::Stop),
            "resume" | "continue" => Some(ConsoleCommand::Resume),
            "restart" => Some(ConsoleCommand::Restart),
            "status" => Some(ConsoleCommand::Status),
            "quit" | "exit" | "q" => Some(ConsoleCommand::Quit),
            _ => None,
        }
    }
}

/// Turns events into console lines and tracks when a run has finished
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    state: TestState,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &MonitorEvent) -> Option<String> {
        let line = match event {
            MonitorEvent::DeviceStatus {
                text, connected, ..
            } => {
                if !connected && self.state == TestState::Running {
                    // device loss does not abort the run by itself
                    format!("{text}\n⚠️ Device lost during the test; it continues until the probe fails or you stop it")
                } else {
                    text.clone()
                }
            }
            MonitorEvent::Environment { device, network } => {
                format!("📱 Device: {device}\n🌐 Network: {network}")
            }
            MonitorEvent::Throughput { text, .. } => format!("📶 {text}"),
            MonitorEvent::Tick { remaining, .. } => format!("⏱  {}", format_countdown(*remaining)),
            MonitorEvent::StateChanged { state } => {
                self.state = *state;
                match state {
                    TestState::Running => "▶️  Test running".to_string(),
                    TestState::Paused => "⏸  Test paused; type 'resume' to continue".to_string(),
                    TestState::Idle => "⏹  Test stopped".to_string(),
                    // a dedicated message follows for these
                    TestState::Completed | TestState::AbortedOnFailure => return None,
                }
            }
            MonitorEvent::Completed { duration } => format!(
                "✅ The {} test finished. The network stayed up the whole time.",
                format_countdown(*duration)
            ),
            MonitorEvent::NetworkFailure {
                reason,
                capture_pending: true,
            } => format!(
                "⚠️ Network failure detected: {reason}\n\
                 Capturing a full system log. This takes 1-3 minutes; do not disconnect the phone!"
            ),
            MonitorEvent::NetworkFailure {
                reason,
                capture_pending: false,
            } => compose_failure_message(reason, None),
            MonitorEvent::CaptureStarted { directory } => {
                format!("⏳ Saving bug report under {directory}")
            }
            MonitorEvent::CaptureCompleted {
                path,
                error,
                original_reason,
            } => {
                let outcome = match (path, error) {
                    (Some(path), _) => Ok(PathBuf::from(path)),
                    (None, Some(error)) => Err(error.clone()),
                    (None, None) => Err("no archive was produced".to_string()),
                };
                compose_failure_message(original_reason, Some(&outcome))
            }
        };
        Some(line)
    }

    /// True for the last event of a run
    pub fn is_final(event: &MonitorEvent) -> bool {
        matches!(
            event,
            MonitorEvent::Completed { .. }
                | MonitorEvent::NetworkFailure {
                    capture_pending: false,
                    ..
                }
                | MonitorEvent::CaptureCompleted { .. }
        )
    }
}
