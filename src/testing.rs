//! Scripted bridge runner for tests
//!
//! [`ScriptedRunner`] answers the handful of adb invocations the monitors
//! issue, from state that a test can change between steps. No process is ever
//! spawned, so it works under tokio's paused clock.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::bridge::{CommandRunner, DeviceBridge, DeviceHandle, PROP_BRAND, PROP_MODEL, PROP_VERSION};
use crate::errors::BridgeError;

const PING_OK: &str = "PING 223.5.5.5 (223.5.5.5) 56(84) bytes of data.\n\
64 bytes from 223.5.5.5: icmp_seq=1 ttl=116 time=12.3 ms\n\n\
--- 223.5.5.5 ping statistics ---\n\
1 packets transmitted, 1 received, 0% packet loss, time 0ms";

#[derive(Debug)]
struct Script {
    devices: VecDeque<Option<Vec<String>>>,
    last_devices: Option<Vec<String>>,
    pings: VecDeque<bool>,
    ping_default: bool,
    ping_count: usize,
    rx: u64,
    tx: u64,
    rx_step: u64,
    tx_step: u64,
    traffic_override: Option<String>,
    traffic_fails: bool,
    traffic_reads: usize,
    props: HashMap<String, String>,
    ip_addresses: Option<String>,
    swipes: usize,
    bugreport_delay: Duration,
    bugreport_fails: bool,
    bugreports: Vec<PathBuf>,
    devices_latency: Duration,
    prop_latency: Duration,
    swipe_latency: Duration,
    calls: Vec<Vec<String>>,
    completed: Vec<Vec<String>>,
}

/// In-memory stand-in for the adb executable
#[derive(Debug)]
pub struct ScriptedRunner {
    script: Mutex<Script>,
}

impl ScriptedRunner {
    /// One ready device `dev-1`, a "google Pixel 7", answering every ping,
    /// with counters growing by 2048/512 bytes per read.
    pub fn healthy() -> Arc<Self> {
        let mut props = HashMap::new();
        props.insert(PROP_MODEL.to_string(), "Pixel 7".to_string());
        props.insert(PROP_BRAND.to_string(), "google".to_string());
        props.insert(PROP_VERSION.to_string(), "14".to_string());

        Arc::new(Self {
            script: Mutex::new(Script {
                devices: VecDeque::new(),
                last_devices: Some(vec!["dev-1".to_string()]),
                pings: VecDeque::new(),
                ping_default: true,
                ping_count: 0,
                rx: 1_000_000,
                tx: 500_000,
                rx_step: 2048,
                tx_step: 512,
                traffic_override: None,
                traffic_fails: false,
                traffic_reads: 0,
                props,
                ip_addresses: Some(
                    "30: wlan0    inet 192.168.1.5/24 brd 192.168.1.255 scope global wlan0"
                        .to_string(),
                ),
                swipes: 0,
                bugreport_delay: Duration::ZERO,
                bugreport_fails: false,
                bugreports: Vec::new(),
                devices_latency: Duration::ZERO,
                prop_latency: Duration::ZERO,
                swipe_latency: Duration::ZERO,
                calls: Vec::new(),
                completed: Vec::new(),
            }),
        })
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues device-list answers; `None` makes that poll fail. The last
    /// answer keeps repeating once the queue drains.
    pub fn push_devices(&self, devices: Option<&[&str]>) {
        self.script()
            .devices
            .push_back(devices.map(|ids| ids.iter().map(|id| id.to_string()).collect()));
    }

    /// Queues ping outcomes consumed before the default applies
    pub fn push_pings(&self, outcomes: &[bool]) {
        self.script().pings.extend(outcomes.iter().copied());
    }

    pub fn set_ping_default(&self, reachable: bool) {
        self.script().ping_default = reachable;
    }

    pub fn set_prop(&self, name: &str, value: Option<&str>) {
        let mut script = self.script();
        match value {
            Some(value) => {
                script.props.insert(name.to_string(), value.to_string());
            }
            None => {
                script.props.remove(name);
            }
        }
    }

    pub fn set_ip_addresses(&self, output: Option<&str>) {
        self.script().ip_addresses = output.map(str::to_string);
    }

    /// Serves `output` verbatim for every traffic read
    pub fn set_traffic(&self, output: &str) {
        self.script().traffic_override = Some(output.to_string());
    }

    pub fn fail_traffic(&self, fail: bool) {
        self.script().traffic_fails = fail;
    }

    pub fn set_bugreport(&self, delay: Duration, fails: bool) {
        let mut script = self.script();
        script.bugreport_delay = delay;
        script.bugreport_fails = fails;
    }

    /// How long each device listing takes to answer
    pub fn set_devices_latency(&self, latency: Duration) {
        self.script().devices_latency = latency;
    }

    /// How long each `getprop` takes to answer
    pub fn set_prop_latency(&self, latency: Duration) {
        self.script().prop_latency = latency;
    }

    /// How long each keep-awake swipe takes to answer
    pub fn set_swipe_latency(&self, latency: Duration) {
        self.script().swipe_latency = latency;
    }

    pub fn ping_count(&self) -> usize {
        self.script().ping_count
    }

    pub fn traffic_reads(&self) -> usize {
        self.script().traffic_reads
    }

    pub fn swipe_count(&self) -> usize {
        self.script().swipes
    }

    pub fn bugreports(&self) -> Vec<PathBuf> {
        self.script().bugreports.clone()
    }

    /// Every invocation, recorded when it starts
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.script().calls.clone()
    }

    /// Invocations that ran to completion, in the order they finished
    pub fn completed_calls(&self) -> Vec<Vec<String>> {
        self.script().completed.clone()
    }

    fn device_list(script: &mut Script) -> Result<String, BridgeError> {
        if let Some(next) = script.devices.pop_front() {
            script.last_devices = next;
        }
        match &script.last_devices {
            Some(ids) => {
                let mut out = String::from("List of devices attached\n");
                for id in ids {
                    out.push_str(id);
                    out.push_str("\tdevice\n");
                }
                Ok(out)
            }
            None => Err(BridgeError::ToolUnavailable {
                tool: "adb".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
            }),
        }
    }

    fn failed(command: &str, stdout_hint: &str) -> BridgeError {
        BridgeError::CommandFailed {
            command: command.to_string(),
            code: Some(1),
            stderr: stdout_hint.to_string(),
        }
    }

    fn traffic_output(script: &mut Script) -> String {
        if let Some(raw) = &script.traffic_override {
            return raw.clone();
        }
        script.rx += script.rx_step;
        script.tx += script.tx_step;
        format!(
            "Inter-|   Receive |  Transmit\n face |bytes packets|bytes packets\n    lo: 500 5 0 0 0 0 0 0 500 5 0 0 0 0 0 0\n wlan0: {} 10 0 0 0 0 0 0 {} 10 0 0 0 0 0 0\n",
            script.rx, script.tx
        )
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        _program: &Path,
        args: &[String],
        _timeout: Option<Duration>,
    ) -> Result<String, BridgeError> {
        let args: Vec<&str> = match args {
            [flag, _id, rest @ ..] if flag == "-s" => rest.iter().map(String::as_str).collect(),
            _ => args.iter().map(String::as_str).collect(),
        };

        let call: Vec<String> = args.iter().map(|a| a.to_string()).collect();

        // `None` is a bug report, whose outcome is read once its delay has passed
        let (reply, delay) = {
            let mut script = self.script();
            script.calls.push(call.clone());

            match args.as_slice() {
                ["devices"] => (Some(Self::device_list(&mut script)), script.devices_latency),
                ["shell", "ping", ..] => {
                    script.ping_count += 1;
                    let ok = script.pings.pop_front().unwrap_or(script.ping_default);
                    let reply = if ok {
                        Ok(PING_OK.to_string())
                    } else {
                        Err(Self::failed(
                            "adb shell ping",
                            "1 packets transmitted, 0 received, 100% packet loss",
                        ))
                    };
                    (Some(reply), Duration::ZERO)
                }
                ["shell", "cat", "/proc/net/dev"] => {
                    script.traffic_reads += 1;
                    let reply = if script.traffic_fails {
                        Err(Self::failed("adb shell cat /proc/net/dev", ""))
                    } else {
                        Ok(Self::traffic_output(&mut script))
                    };
                    (Some(reply), Duration::ZERO)
                }
                ["shell", "getprop", name] => (
                    Some(Ok(script.props.get(*name).cloned().unwrap_or_default())),
                    script.prop_latency,
                ),
                ["shell", "ip", ..] => (
                    Some(
                        script
                            .ip_addresses
                            .clone()
                            .ok_or_else(|| Self::failed("adb shell ip", "")),
                    ),
                    Duration::ZERO,
                ),
                ["shell", "input", "swipe", ..] => {
                    script.swipes += 1;
                    (Some(Ok(String::new())), script.swipe_latency)
                }
                ["bugreport", prefix] => {
                    script.bugreports.push(PathBuf::from(prefix));
                    (None, script.bugreport_delay)
                }
                _ => (Some(Ok(String::new())), Duration::ZERO),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script();
        script.completed.push(call);
        match reply {
            Some(reply) => reply,
            None if script.bugreport_fails => Err(Self::failed("adb bugreport", "device disconnected")),
            None => Ok("Bug report copied".to_string()),
        }
    }
}

/// Bridge over `runner` with a fixed device id
pub fn scripted_bridge(runner: Arc<ScriptedRunner>, device: Option<&str>) -> DeviceBridge {
    scripted_bridge_with_handle(runner, DeviceHandle::fixed(device.map(str::to_string)))
}

/// Bridge over `runner` following a live device handle
pub fn scripted_bridge_with_handle(runner: Arc<ScriptedRunner>, device: DeviceHandle) -> DeviceBridge {
    DeviceBridge::new(
        PathBuf::from("adb"),
        runner,
        device,
        Duration::from_secs(15),
    )
}
