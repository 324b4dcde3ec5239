//! Diagnostic bundle capture after a network failure
//!
//! Capture is gated on the device brand. The bundle lands in
//! `<root>/<YYYY-MM-DD>-<model>-<suffix>/bugreport_<unix-secs>.zip`, where
//! `<root>` is the configured output root or the directory of the running
//! program.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate, Utc};
use log::{error, info, warn};
use serde::Serialize;

use crate::bridge::DeviceBridge;
use crate::bridge::locate::program_dir;
use crate::config::CaptureSettings;
use crate::errors::CaptureError;

const ARCHIVE_PREFIX: &str = "bugreport";
const ARCHIVE_SUFFIX: &str = ".zip";
const UNKNOWN_MODEL: &str = "Unknown";

/// Upper bound on each property read made while deciding on a capture. The
/// controller waits on these, so a hung bridge must not hold it for a full
/// command timeout.
pub const PROPERTY_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// True when `brand` contains any of `tokens`, ignoring case.
/// A missing or blank brand never matches.
pub fn brand_matches(brand: Option<&str>, tokens: &[String]) -> bool {
    let Some(brand) = brand.map(str::trim).filter(|b| !b.is_empty()) else {
        return false;
    };
    let brand = brand.to_lowercase();
    tokens
        .iter()
        .filter(|token| !token.is_empty())
        .any(|token| brand.contains(&token.to_lowercase()))
}

/// `<YYYY-MM-DD>-<model with spaces as underscores>-<suffix>`
pub fn capture_directory_name(date: NaiveDate, model: Option<&str>, suffix: &str) -> String {
    let model = model
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(UNKNOWN_MODEL)
        .replace(' ', "_");
    format!("{}-{}-{}", date.format("%Y-%m-%d"), model, suffix)
}

/// Path handed to the bridge; the tool appends `.zip` itself
pub fn archive_prefix(directory: &Path, unix_secs: i64) -> PathBuf {
    directory.join(format!("{ARCHIVE_PREFIX}_{unix_secs}"))
}

/// Final user-facing text for a network failure, with the capture outcome if
/// a capture ran
pub fn compose_failure_message(reason: &str, capture: Option<&Result<PathBuf, String>>) -> String {
    let mut message = format!("❌ Network failure detected!\n\n{reason}");
    match capture {
        Some(Ok(path)) => {
            message.push_str(&format!("\n\n✅ System log saved to:\n{}", path.display()));
        }
        Some(Err(e)) => {
            message.push_str(&format!("\n\n⚠️ Log capture failed: {e}"));
        }
        None => message.push_str("\n\nThe test was stopped immediately."),
    }
    message
}

/// One diagnostic capture, created on failure and run exactly once
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CaptureJob {
    pub target_directory_name: String,
    pub target_directory: PathBuf,
    pub result_path: Option<PathBuf>,
    pub triggering_reason: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticCapture {
    bridge: DeviceBridge,
    settings: CaptureSettings,
}

impl DiagnosticCapture {
    pub fn new(bridge: DeviceBridge, settings: CaptureSettings) -> Self {
        Self { bridge, settings }
    }

    /// Reads the brand property and applies the brand policy. A brand that
    /// cannot be read in time does not qualify.
    pub async fn device_qualifies(&self) -> bool {
        let brand = bounded_property("brand", self.bridge.brand()).await;
        let qualifies = brand_matches(brand.as_deref(), &self.settings.brand_tokens);
        info!(
            "Capture policy: brand {:?} {}",
            brand,
            if qualifies { "matches" } else { "does not match" }
        );
        qualifies
    }

    fn output_root(&self) -> Result<PathBuf, CaptureError> {
        match &self.settings.output_root {
            Some(root) => Ok(root.clone()),
            None => program_dir().ok_or_else(|| {
                CaptureError::OutputRoot("location of the running program is unknown".to_string())
            }),
        }
    }

    /// Names the target directory from today's date and the device model
    pub async fn prepare(&self, triggering_reason: &str) -> Result<CaptureJob, CaptureError> {
        let model = bounded_property("model", self.bridge.model()).await;
        let name = capture_directory_name(
            Local::now().date_naive(),
            model.as_deref(),
            &self.settings.directory_suffix,
        );
        let target_directory = self.output_root()?.join(&name);

        Ok(CaptureJob {
            target_directory_name: name,
            target_directory,
            result_path: None,
            triggering_reason: triggering_reason.to_string(),
        })
    }

    /// Creates the directory and runs the bug report. Unbounded in time.
    pub async fn run(&self, job: &mut CaptureJob) -> Result<PathBuf, CaptureError> {
        tokio::fs::create_dir_all(&job.target_directory)
            .await
            .map_err(|source| CaptureError::CreateDirectory {
                path: job.target_directory.clone(),
                source,
            })?;

        let prefix = archive_prefix(&job.target_directory, Utc::now().timestamp());
        info!("Capturing bug report to {}", prefix.display());

        if let Err(e) = self.bridge.bugreport(&prefix).await {
            error!("Bug report capture failed: {}", e);
            return Err(e.into());
        }

        let mut archive = prefix.into_os_string();
        archive.push(ARCHIVE_SUFFIX);
        let archive = PathBuf::from(archive);
        info!("Bug report saved to {}", archive.display());
        job.result_path = Some(archive.clone());
        Ok(archive)
    }
}

async fn bounded_property(
    name: &str,
    read: impl Future<Output = Option<String>>,
) -> Option<String> {
    match tokio::time::timeout(PROPERTY_QUERY_TIMEOUT, read).await {
        Ok(value) => value,
        Err(_) => {
            warn!(
                "Device {} not read within {:?}, treating as unknown",
                name, PROPERTY_QUERY_TIMEOUT
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::testing::{ScriptedRunner, scripted_bridge};

    fn tokens() -> Vec<String> {
        CaptureSettings::default().brand_tokens
    }

    #[test]
    fn test_brand_policy() {
        assert!(brand_matches(Some("Redmi Note 12"), &tokens()));
        assert!(brand_matches(Some("Xiaomi"), &tokens()));
        assert!(brand_matches(Some("XIAOMI"), &tokens()));
        assert!(!brand_matches(Some("Pixel 7"), &tokens()));
        assert!(!brand_matches(Some("google"), &tokens()));
        assert!(!brand_matches(None, &tokens()));
        assert!(!brand_matches(Some(""), &tokens()));
        assert!(!brand_matches(Some("   "), &tokens()));
    }

    #[test]
    fn test_directory_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            capture_directory_name(date, Some("Redmi Note 12"), "NetworkError"),
            "2024-03-09-Redmi_Note_12-NetworkError"
        );
        assert_eq!(
            capture_directory_name(date, None, "NetworkError"),
            "2024-03-09-Unknown-NetworkError"
        );
    }

    #[test]
    fn test_failure_message() {
        let reason = "network connectivity lost: ping packet loss";
        let saved = compose_failure_message(reason, Some(&Ok(PathBuf::from("/out/bugreport_1.zip"))));
        assert!(saved.contains(reason));
        assert!(saved.contains("/out/bugreport_1.zip"));

        let failed = compose_failure_message(reason, Some(&Err("device disconnected".to_string())));
        assert!(failed.contains("Log capture failed: device disconnected"));

        assert!(compose_failure_message(reason, None).contains("stopped immediately"));
    }

    #[tokio::test]
    async fn test_capture_writes_under_output_root() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::healthy();
        runner.set_prop(crate::bridge::PROP_MODEL, Some("Redmi Note 12"));
        let settings = CaptureSettings {
            output_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let capture = DiagnosticCapture::new(scripted_bridge(runner.clone(), Some("d")), settings);

        let mut job = capture.prepare("lost").await.unwrap();
        assert!(job.target_directory_name.ends_with("-Redmi_Note_12-NetworkError"));

        let archive = capture.run(&mut job).await.unwrap();
        assert!(job.target_directory.is_dir());
        assert_eq!(job.result_path.as_ref(), Some(&archive));
        assert_eq!(archive.extension().and_then(|e| e.to_str()), Some("zip"));
        assert!(archive.starts_with(&job.target_directory));

        let prefixes = runner.bugreports();
        assert_eq!(prefixes.len(), 1);
        assert!(
            prefixes[0]
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("bugreport_"))
        );
    }

    #[tokio::test]
    async fn test_capture_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::healthy();
        runner.set_bugreport(Duration::ZERO, true);
        let settings = CaptureSettings {
            output_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let capture = DiagnosticCapture::new(scripted_bridge(runner, Some("d")), settings);

        let mut job = tokio_test::assert_ok!(capture.prepare("lost").await);
        let err = tokio_test::assert_err!(capture.run(&mut job).await);
        assert!(matches!(err, CaptureError::Bridge(_)));
        assert_eq!(job.result_path, None);
    }

    #[tokio::test]
    async fn test_policy_reads_brand() {
        let runner = ScriptedRunner::healthy();
        let capture = DiagnosticCapture::new(
            scripted_bridge(runner.clone(), Some("d")),
            CaptureSettings::default(),
        );
        assert!(!capture.device_qualifies().await);

        runner.set_prop(crate::bridge::PROP_BRAND, Some("Redmi"));
        assert!(capture.device_qualifies().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_property_reads_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::healthy();
        runner.set_prop(crate::bridge::PROP_BRAND, Some("Redmi"));
        runner.set_prop(crate::bridge::PROP_MODEL, Some("Redmi Note 12"));
        runner.set_prop_latency(Duration::from_secs(60));
        let settings = CaptureSettings {
            output_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let capture = DiagnosticCapture::new(scripted_bridge(runner, Some("d")), settings);

        let started = tokio::time::Instant::now();
        assert!(!capture.device_qualifies().await);
        assert_eq!(started.elapsed(), PROPERTY_QUERY_TIMEOUT);

        let job = capture.prepare("lost").await.unwrap();
        assert!(job.target_directory_name.ends_with("-Unknown-NetworkError"));
        assert_eq!(started.elapsed(), PROPERTY_QUERY_TIMEOUT * 2);
    }
}
