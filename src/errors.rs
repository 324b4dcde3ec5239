//! Error types shared across the bridge, collectors, monitors and controller
//!
//! Transient failures (`BridgeError`) are absorbed by the polling layer that
//! produced them. Only a confirmed network failure and the outcome of a
//! diagnostic capture reach the user.

use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use thiserror::Error;

use crate::controller::TestState;

/// Failure of a single invocation of the device bridge tool
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The executable could not be spawned at all (missing or not runnable)
    #[error("device bridge '{tool}' is unavailable: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited unsuccessfully
    #[error("`{command}` exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The tool did not finish within the allotted time
    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("i/o error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    /// True when the tool itself is missing rather than a single command failing
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(self, BridgeError::ToolUnavailable { .. })
    }
}

/// Throughput could not be derived from a pair of snapshots
#[derive(Debug, Error, PartialEq)]
pub enum ThroughputError {
    #[error("insufficient interval between snapshots: {elapsed:?} < {minimum:?}")]
    InsufficientInterval { elapsed: Duration, minimum: Duration },
}

/// Rejected requests from the presentation layer
#[derive(Debug, Error, PartialEq)]
pub enum ControllerError {
    #[error("test duration must be greater than zero")]
    InvalidDuration,

    #[error("no device connected")]
    DeviceAbsent,

    #[error("a test is already running")]
    AlreadyRunning,

    #[error("cannot {action} while the test is {state}")]
    InvalidTransition { action: &'static str, state: TestState },

    #[error("no previous test to restart")]
    NoPreviousSession,

    #[error("a diagnostic capture is still running; keep the device connected")]
    CaptureInProgress,

    #[error("test controller is no longer running")]
    ControllerGone,
}

/// Failure of the diagnostic bundle capture job
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("could not resolve capture output directory: {0}")]
    OutputRoot(String),

    #[error("failed to create capture directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bug report capture failed: {0}")]
    Bridge(#[from] BridgeError),

    #[error("capture task ended unexpectedly: {0}")]
    Join(String),
}

/// Logs a bridge failure that the caller has decided to treat as "no data"
pub fn log_absorbed(context: &str, error: &BridgeError) {
    if error.is_tool_unavailable() {
        warn!("{context}: {error}");
    } else {
        warn!("{context}: {error} - treating as unknown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_unavailable_detection() {
        let missing = BridgeError::ToolUnavailable {
            tool: "adb".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(missing.is_tool_unavailable());

        let failed = BridgeError::CommandFailed {
            command: "adb shell ping".to_string(),
            code: Some(1),
            stderr: String::new(),
        };
        assert!(!failed.is_tool_unavailable());
    }

    #[test]
    fn test_transition_error_message() {
        let err = ControllerError::InvalidTransition {
            action: "resume",
            state: TestState::Running,
        };
        assert_eq!(err.to_string(), "cannot resume while the test is running");
    }
}
