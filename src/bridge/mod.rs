//! Device bridge (adb) invocation
//!
//! Every call is a single synchronous-from-the-caller child process. There is
//! no retry here; the polling loops above decide what a failure means.

pub mod device;
pub mod locate;
pub mod runner;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::config::BridgeSettings;
use crate::errors::{BridgeError, log_absorbed};

pub use device::{DeviceHandle, DeviceHandleWriter, DeviceInfo, device_handle, parse_device_list};
pub use locate::{TOOL_NAME, locate_tool};
pub use runner::{CommandRunner, ProcessRunner};

pub const PROP_MODEL: &str = "ro.product.model";
pub const PROP_BRAND: &str = "ro.product.brand";
pub const PROP_VERSION: &str = "ro.build.version.release";

/// Handle for issuing bridge commands against the attached device.
/// Cheap to clone; clones share the runner and observe the same device.
#[derive(Clone)]
pub struct DeviceBridge {
    tool: PathBuf,
    runner: Arc<dyn CommandRunner>,
    device: DeviceHandle,
    command_timeout: Duration,
}

impl std::fmt::Debug for DeviceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBridge")
            .field("tool", &self.tool)
            .field("device", &self.device.current())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl DeviceBridge {
    pub fn new(
        tool: PathBuf,
        runner: Arc<dyn CommandRunner>,
        device: DeviceHandle,
        command_timeout: Duration,
    ) -> Self {
        Self {
            tool,
            runner,
            device,
            command_timeout,
        }
    }

    /// Bridge spawning real processes, with the tool resolved per [`locate_tool`]
    pub fn from_settings(settings: &BridgeSettings, device: DeviceHandle) -> Self {
        Self::new(
            locate_tool(settings.tool_path.as_deref()),
            Arc::new(ProcessRunner),
            device,
            settings.command_timeout(),
        )
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Runs a bridge subcommand scoped to the current device (`-s <id>`) if one is known
    pub async fn run_command(&self, args: &[&str]) -> Result<String, BridgeError> {
        self.invoke(args, true, Some(self.command_timeout)).await
    }

    /// Runs `shell <args>` on the current device
    pub async fn shell(&self, args: &[&str]) -> Result<String, BridgeError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.run_command(&full).await
    }

    /// Ids of attached, ready devices. Never scoped to a device.
    pub async fn list_devices(&self) -> Result<Vec<String>, BridgeError> {
        let output = self
            .invoke(&["devices"], false, Some(self.command_timeout))
            .await?;
        Ok(parse_device_list(&output))
    }

    /// Reads a system property; an empty value is reported as `None`
    pub async fn get_prop(&self, name: &str) -> Result<Option<String>, BridgeError> {
        let value = self.shell(&["getprop", name]).await?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    /// Model, Android version and brand; unreadable properties stay `None`
    pub async fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            model: self.prop_or_none(PROP_MODEL).await,
            android_version: self.prop_or_none(PROP_VERSION).await,
            brand: self.prop_or_none(PROP_BRAND).await,
        }
    }

    pub async fn model(&self) -> Option<String> {
        self.prop_or_none(PROP_MODEL).await
    }

    pub async fn brand(&self) -> Option<String> {
        self.prop_or_none(PROP_BRAND).await
    }

    /// Full diagnostic bundle; the tool appends `.zip` to `prefix`.
    /// Runs without a timeout because captures routinely take minutes.
    pub async fn bugreport(&self, prefix: &Path) -> Result<String, BridgeError> {
        let prefix = prefix.to_string_lossy();
        self.invoke(&["bugreport", prefix.as_ref()], true, None).await
    }

    async fn prop_or_none(&self, name: &str) -> Option<String> {
        match self.get_prop(name).await {
            Ok(value) => value,
            Err(e) => {
                log_absorbed(&format!("reading {name}"), &e);
                None
            }
        }
    }

    async fn invoke(
        &self,
        args: &[&str],
        scoped: bool,
        timeout: Option<Duration>,
    ) -> Result<String, BridgeError> {
        let mut full: Vec<String> = Vec::with_capacity(args.len() + 2);
        if scoped {
            if let Some(id) = self.device.current() {
                full.push("-s".to_string());
                full.push(id);
            }
        }
        full.extend(args.iter().map(|arg| arg.to_string()));

        debug!("bridge: {:?}", full);
        self.runner.run(&self.tool, &full, timeout).await
    }
}
