//! The attached-device handle and device properties

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Read side of the currently attached device id.
///
/// Only [`DeviceHandleWriter`] (owned by the presence monitor) changes the
/// value; every other component reads it through clones of this handle.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    rx: watch::Receiver<Option<String>>,
}

/// Sole writer of the device id
#[derive(Debug)]
pub struct DeviceHandleWriter {
    tx: watch::Sender<Option<String>>,
}

/// Creates a linked writer/reader pair with no device attached
pub fn device_handle() -> (DeviceHandleWriter, DeviceHandle) {
    let (tx, rx) = watch::channel(None);
    (DeviceHandleWriter { tx }, DeviceHandle { rx })
}

impl DeviceHandle {
    /// A handle fixed to `id`, for one-shot commands that bypass presence polling
    pub fn fixed(id: Option<String>) -> Self {
        let (_tx, rx) = watch::channel(id);
        Self { rx }
    }

    pub fn current(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    pub fn is_present(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolves once a device is attached. Returns `None` if the writer is gone.
    pub async fn wait_for_device(&mut self) -> Option<String> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(id) => id.clone(),
            Err(_) => None,
        }
    }
}

impl DeviceHandleWriter {
    /// Replaces the device id, returning whether it changed
    pub fn set(&self, id: Option<String>) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == id {
                false
            } else {
                *current = id;
                true
            }
        })
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn handle(&self) -> DeviceHandle {
        DeviceHandle {
            rx: self.tx.subscribe(),
        }
    }
}

/// Build properties read from the device
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub android_version: Option<String>,
    pub brand: Option<String>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Android {})",
            self.model.as_deref().unwrap_or("Unknown"),
            self.android_version.as_deref().unwrap_or("?")
        )
    }
}

/// Extracts ready device ids from `adb devices` output.
///
/// The header line is ignored and only entries whose state token is exactly
/// `device` count, so `offline` and `unauthorized` entries are skipped.
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices"))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?;
            fields.any(|token| token == "device").then(|| id.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_list() {
        let output = "List of devices attached\n\
                      R58M123ABC\tdevice\n\
                      emulator-5554\toffline\n\
                      9A8B7C\tunauthorized\n\
                      192.168.1.20:5555\tdevice product:lotus model:Redmi_Note_12 device:lotus\n";
        assert_eq!(
            parse_device_list(output),
            vec!["R58M123ABC".to_string(), "192.168.1.20:5555".to_string()]
        );
    }

    #[test]
    fn test_parse_device_list_empty_and_daemon_noise() {
        assert!(parse_device_list("List of devices attached\n").is_empty());
        assert!(parse_device_list("").is_empty());

        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      List of devices attached\n\
                      abc123\tdevice";
        assert_eq!(parse_device_list(output), vec!["abc123".to_string()]);
    }

    #[test]
    fn test_writer_reports_changes_only() {
        let (writer, handle) = device_handle();
        assert!(!handle.is_present());

        assert!(writer.set(Some("abc".to_string())));
        assert!(!writer.set(Some("abc".to_string())));
        assert_eq!(handle.current().as_deref(), Some("abc"));

        assert!(writer.set(None));
        assert!(!handle.is_present());
    }

    #[tokio::test]
    async fn test_wait_for_device() {
        let (writer, mut handle) = device_handle();
        let waiter = tokio::spawn(async move { handle.wait_for_device().await });
        writer.set(Some("serial-1".to_string()));
        assert_eq!(waiter.await.unwrap().as_deref(), Some("serial-1"));
    }

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo {
            model: Some("23021RAAEG".to_string()),
            android_version: Some("14".to_string()),
            brand: Some("Redmi".to_string()),
        };
        assert_eq!(info.to_string(), "23021RAAEG (Android 14)");
        assert_eq!(DeviceInfo::default().to_string(), "Unknown (Android ?)");
    }
}
