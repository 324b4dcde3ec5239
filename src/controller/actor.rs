//! Test run orchestration
//!
//! [`TestRunController`] is a cheap handle; the state machine itself lives in
//! a single task that owns the session, the monitor loops and the capture job.
//! Requests arrive as commands with a oneshot reply, so no state is shared.

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::bridge::DeviceBridge;
use crate::capture::DiagnosticCapture;
use crate::collectors::network_status::network_status;
use crate::config::AppConfig;
use crate::controller::state::{TestSession, TestState};
use crate::errors::{CaptureError, ControllerError};
use crate::events::{EventBus, MonitorEvent};
use crate::monitors::{HealthEvent, KeepAwake, LoopHandle, NetworkHealthMonitor};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
const COMMAND_CHANNEL_SIZE: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, ControllerError>>;

enum Command {
    Start { duration_secs: u32, reply: Reply<TestState> },
    Stop { reply: Reply<TestState> },
    Resume { reply: Reply<TestState> },
    Restart { reply: Reply<TestState> },
    Snapshot { reply: oneshot::Sender<ControllerSnapshot> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Current session and device state for the presentation layer
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ControllerSnapshot {
    pub state: TestState,
    pub session: Option<TestSession>,
    pub device: Option<String>,
    pub capture_in_progress: bool,
}

/// Handle to the controller task
#[derive(Debug, Clone)]
pub struct TestRunController {
    commands: mpsc::Sender<Command>,
}

impl TestRunController {
    /// Spawns the controller task. Dropping every handle, or calling
    /// [`TestRunController::shutdown`], ends it.
    pub fn spawn(bridge: DeviceBridge, config: &AppConfig, events: EventBus) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let actor = ControllerActor::new(bridge, config, events);
        let task = tokio::spawn(actor.run(rx));
        (Self { commands }, task)
    }

    pub async fn start(&self, duration_secs: u32) -> Result<TestState, ControllerError> {
        self.request(|reply| Command::Start {
            duration_secs,
            reply,
        })
        .await?
    }

    pub async fn stop(&self) -> Result<TestState, ControllerError> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    pub async fn resume(&self) -> Result<TestState, ControllerError> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    /// Fresh start with the previous session's duration
    pub async fn restart(&self) -> Result<TestState, ControllerError> {
        self.request(|reply| Command::Restart { reply }).await?
    }

    pub async fn snapshot(&self) -> Result<ControllerSnapshot, ControllerError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stops all loops and waits for an in-flight capture to finish
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| ControllerError::ControllerGone)?;
        rx.await.map_err(|_| ControllerError::ControllerGone)
    }
}

struct CaptureInFlight {
    reason: String,
    task: JoinHandle<Result<PathBuf, CaptureError>>,
}

struct ControllerActor {
    bridge: DeviceBridge,
    events: EventBus,
    config: AppConfig,
    capture: DiagnosticCapture,
    session: Option<TestSession>,
    health: Option<LoopHandle>,
    health_rx: Option<mpsc::UnboundedReceiver<HealthEvent>>,
    keep_awake: Option<LoopHandle>,
    ticker: Option<Interval>,
    in_flight: Option<CaptureInFlight>,
    capture_triggered: bool,
}

impl ControllerActor {
    fn new(bridge: DeviceBridge, config: &AppConfig, events: EventBus) -> Self {
        Self {
            capture: DiagnosticCapture::new(bridge.clone(), config.capture.clone()),
            bridge,
            events,
            config: config.clone(),
            session: None,
            health: None,
            health_rx: None,
            keep_awake: None,
            ticker: None,
            in_flight: None,
            capture_triggered: false,
        }
    }

    fn state(&self) -> TestState {
        self.session.map(|s| s.state).unwrap_or_default()
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            return;
                        }
                    }
                    None => break,
                },
                _ = next_tick(&mut self.ticker) => self.on_tick().await,
                event = next_health_event(&mut self.health_rx) => match event {
                    Some(event) => self.on_health_event(event).await,
                    None => self.health_rx = None,
                },
                result = join_capture(&mut self.in_flight) => self.on_capture_finished(result),
            }
        }
        self.shutdown().await;
    }

    /// Returns `false` once the controller should exit
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start {
                duration_secs,
                reply,
            } => {
                let _ = reply.send(self.start(duration_secs).await);
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            Command::Restart { reply } => {
                let _ = reply.send(self.restart().await);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(ControllerSnapshot {
                    state: self.state(),
                    session: self.session,
                    device: self.bridge.device().current(),
                    capture_in_progress: self.in_flight.is_some(),
                });
            }
            Command::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn start(&mut self, duration_secs: u32) -> Result<TestState, ControllerError> {
        if self.state() == TestState::Running {
            return Err(ControllerError::AlreadyRunning);
        }
        self.fresh_start(duration_secs).await
    }

    async fn restart(&mut self) -> Result<TestState, ControllerError> {
        let duration_secs = self
            .session
            .map(|s| s.duration_secs)
            .ok_or(ControllerError::NoPreviousSession)?;
        // a refused restart leaves the current run untouched
        self.check_startable(duration_secs)?;
        if self.state() == TestState::Running {
            self.stop_loops().await;
        }
        self.fresh_start(duration_secs).await
    }

    fn check_startable(&self, duration_secs: u32) -> Result<TestSession, ControllerError> {
        if self.in_flight.is_some() {
            return Err(ControllerError::CaptureInProgress);
        }
        let session = TestSession::start(duration_secs)?;
        if !self.bridge.device().is_present() {
            return Err(ControllerError::DeviceAbsent);
        }
        Ok(session)
    }

    async fn fresh_start(&mut self, duration_secs: u32) -> Result<TestState, ControllerError> {
        let session = self.check_startable(duration_secs)?;

        self.capture_triggered = false;
        self.emit_environment().await;

        info!("Starting {}s test", duration_secs);
        self.session = Some(session);
        self.start_loops();
        self.emit_state();
        Ok(TestState::Running)
    }

    async fn stop(&mut self) -> Result<TestState, ControllerError> {
        let state = self.state();
        let Some(session) = self.session.as_mut().filter(|_| state == TestState::Running) else {
            return Err(ControllerError::InvalidTransition {
                action: "stop",
                state,
            });
        };
        let next = session.stop()?;
        self.stop_loops().await;
        info!("Test stopped manually, now {}", next);
        self.emit_state();
        Ok(next)
    }

    fn resume(&mut self) -> Result<TestState, ControllerError> {
        if self.in_flight.is_some() {
            return Err(ControllerError::CaptureInProgress);
        }
        let state = self.state();
        let session = self.session.as_mut().ok_or(ControllerError::InvalidTransition {
            action: "resume",
            state,
        })?;
        session.resume()?;
        info!(
            "Resuming test with {}s remaining",
            session.remaining_secs()
        );
        self.start_loops();
        self.emit_state();
        Ok(TestState::Running)
    }

    async fn on_tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let completed = session.tick();
        let (elapsed, remaining, duration) = (
            session.elapsed_secs,
            session.remaining_secs(),
            session.duration_secs,
        );
        self.events.emit(MonitorEvent::Tick { elapsed, remaining });

        if completed {
            self.stop_loops().await;
            info!("Test completed after {}s", duration);
            self.emit_state();
            self.events.emit(MonitorEvent::Completed { duration });
        }
    }

    async fn on_health_event(&mut self, event: HealthEvent) {
        if self.state() != TestState::Running {
            debug!("Ignoring health event outside a run: {:?}", event);
            return;
        }
        match event {
            HealthEvent::Throughput(sample) => {
                let text = sample.text();
                self.events.emit(MonitorEvent::Throughput { sample, text });
            }
            HealthEvent::Failed(failure) => self.on_failure(failure.reason).await,
        }
    }

    async fn on_failure(&mut self, reason: String) {
        self.stop_loops().await;
        if let Some(session) = self.session.as_mut() {
            let _ = session.abort();
            warn!(
                "Test aborted at {}s: {}",
                session.elapsed_secs, reason
            );
        }
        self.emit_state();

        if self.capture_triggered || !self.capture.device_qualifies().await {
            self.events.emit(MonitorEvent::NetworkFailure {
                reason,
                capture_pending: false,
            });
            return;
        }
        self.capture_triggered = true;

        self.events.emit(MonitorEvent::NetworkFailure {
            reason: reason.clone(),
            capture_pending: true,
        });

        match self.capture.prepare(&reason).await {
            Ok(mut job) => {
                self.events.emit(MonitorEvent::CaptureStarted {
                    directory: job.target_directory.display().to_string(),
                });
                let capture = self.capture.clone();
                let task = tokio::spawn(async move { capture.run(&mut job).await });
                self.in_flight = Some(CaptureInFlight { reason, task });
            }
            Err(e) => {
                error!("Could not prepare capture: {}", e);
                self.events.emit(MonitorEvent::CaptureCompleted {
                    path: None,
                    error: Some(e.to_string()),
                    original_reason: reason,
                });
            }
        }
    }

    fn on_capture_finished(&mut self, result: Result<Result<PathBuf, CaptureError>, JoinError>) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        let outcome = result.unwrap_or_else(|e| Err(CaptureError::Join(e.to_string())));
        let (path, error) = match outcome {
            Ok(path) => (Some(path.display().to_string()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        self.events.emit(MonitorEvent::CaptureCompleted {
            path,
            error,
            original_reason: in_flight.reason,
        });
    }

    fn start_loops(&mut self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = NetworkHealthMonitor::new(self.bridge.clone(), &self.config.health.ping_target);
        self.health = Some(monitor.spawn(tx));
        self.health_rx = Some(rx);

        self.keep_awake = Some(KeepAwake::new(self.bridge.clone(), &self.config.keep_awake).spawn());

        let mut ticker = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    /// Waits for each loop to finish its current iteration
    async fn stop_loops(&mut self) {
        self.ticker = None;
        if let Some(mut health) = self.health.take() {
            health.stop().await;
        }
        self.health_rx = None;
        if let Some(mut keep_awake) = self.keep_awake.take() {
            keep_awake.stop().await;
        }
    }

    async fn shutdown(&mut self) {
        self.stop_loops().await;
        if self.in_flight.is_some() {
            info!("Waiting for diagnostic capture to finish");
            let result = join_capture(&mut self.in_flight).await;
            self.on_capture_finished(result);
        }
    }

    async fn emit_environment(&self) {
        let info = self.bridge.device_info().await;
        let network = network_status(&self.bridge, &self.config.health.ping_target).await;
        info!("Environment: {} / {}", info, network);
        self.events.emit(MonitorEvent::Environment {
            device: info.to_string(),
            network,
        });
    }

    fn emit_state(&self) {
        self.events.emit(MonitorEvent::StateChanged {
            state: self.state(),
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_health_event(rx: &mut Option<mpsc::UnboundedReceiver<HealthEvent>>) -> Option<HealthEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn join_capture(
    in_flight: &mut Option<CaptureInFlight>,
) -> Result<Result<PathBuf, CaptureError>, JoinError> {
    match in_flight {
        Some(in_flight) => (&mut in_flight.task).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::PROP_BRAND;
    use crate::capture::PROPERTY_QUERY_TIMEOUT;
    use crate::testing::{ScriptedRunner, scripted_bridge};
    use tokio::sync::broadcast;

    fn spawn_with(
        runner: std::sync::Arc<ScriptedRunner>,
        device: Option<&str>,
    ) -> (TestRunController, broadcast::Receiver<MonitorEvent>) {
        let events = EventBus::new();
        let rx = events.subscribe();
        let (controller, _task) =
            TestRunController::spawn(scripted_bridge(runner, device), &AppConfig::default(), events);
        (controller, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_validation() {
        let (controller, _rx) = spawn_with(ScriptedRunner::healthy(), None);
        assert_eq!(controller.start(0).await, Err(ControllerError::InvalidDuration));
        assert_eq!(controller.start(5).await, Err(ControllerError::DeviceAbsent));
        assert_eq!(controller.restart().await, Err(ControllerError::NoPreviousSession));
        assert_eq!(controller.snapshot().await.unwrap().state, TestState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_resume_keeps_progress() {
        let (controller, _rx) = spawn_with(ScriptedRunner::healthy(), Some("dev-1"));

        assert_eq!(controller.start(10).await, Ok(TestState::Running));
        assert_eq!(controller.start(10).await, Err(ControllerError::AlreadyRunning));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(controller.stop().await, Ok(TestState::Paused));
        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.session.unwrap().elapsed_secs, 3);
        assert_eq!(snapshot.device.as_deref(), Some("dev-1"));

        assert_eq!(controller.resume().await, Ok(TestState::Running));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let session = controller.snapshot().await.unwrap().session.unwrap();
        assert_eq!(session.elapsed_secs, 5);
        assert_eq!(session.state, TestState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_elapsed() {
        let (controller, _rx) = spawn_with(ScriptedRunner::healthy(), Some("dev-1"));

        controller.start(10).await.unwrap();
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(controller.restart().await, Ok(TestState::Running));

        let session = controller.snapshot().await.unwrap().session.unwrap();
        assert_eq!(session.elapsed_secs, 0);
        assert_eq!(session.duration_secs, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_requires_pause() {
        let (controller, _rx) = spawn_with(ScriptedRunner::healthy(), Some("dev-1"));
        assert_eq!(
            controller.resume().await,
            Err(ControllerError::InvalidTransition {
                action: "resume",
                state: TestState::Idle
            })
        );
        assert_eq!(
            controller.stop().await,
            Err(ControllerError::InvalidTransition {
                action: "stop",
                state: TestState::Idle
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_environment_is_announced_on_start() {
        let (controller, mut rx) = spawn_with(ScriptedRunner::healthy(), Some("dev-1"));
        controller.start(3).await.unwrap();

        match rx.recv().await.unwrap() {
            MonitorEvent::Environment { device, network } => {
                assert_eq!(device, "Pixel 7 (Android 14)");
                assert_eq!(network.to_string(), "Wi-Fi (internet reachable)");
            }
            other => panic!("expected environment event, got {other:?}"),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            MonitorEvent::StateChanged {
                state: TestState::Running
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_controller() {
        let (controller, _rx) = spawn_with(ScriptedRunner::healthy(), Some("dev-1"));
        controller.start(30).await.unwrap();
        controller.shutdown().await.unwrap();
        assert_eq!(controller.snapshot().await, Err(ControllerError::ControllerGone));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_brand_read_does_not_stall_controller() {
        let runner = ScriptedRunner::healthy();
        runner.set_prop(PROP_BRAND, Some("Redmi"));
        runner.push_pings(&[true, true]);
        runner.set_ping_default(false);
        let (controller, mut rx) = spawn_with(runner.clone(), Some("dev-1"));

        controller.start(30).await.unwrap();
        runner.set_prop_latency(Duration::from_secs(60));

        let aborted = MonitorEvent::StateChanged {
            state: TestState::AbortedOnFailure,
        };
        while rx.recv().await.unwrap() != aborted {}
        let since_abort = Instant::now();

        let snapshot = controller.snapshot().await.unwrap();
        assert!(since_abort.elapsed() <= PROPERTY_QUERY_TIMEOUT);
        assert_eq!(snapshot.state, TestState::AbortedOnFailure);
        assert!(!snapshot.capture_in_progress);

        // an unreadable brand is surfaced without a capture
        assert!(matches!(
            rx.recv().await.unwrap(),
            MonitorEvent::NetworkFailure {
                capture_pending: false,
                ..
            }
        ));
        assert!(runner.bugreports().is_empty());
    }
}
