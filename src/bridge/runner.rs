//! Process execution seam for the bridge tool

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::process::Command;

use crate::errors::BridgeError;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Runs one external command to completion and returns its trimmed stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<String, BridgeError>;
}

/// Spawns real child processes through tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<String, BridgeError> {
        let command_line = render_command(program, args);
        debug!("exec: {command_line}");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // only reached when the timeout below drops the future
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(BridgeError::TimedOut {
                        command: command_line,
                        timeout: limit,
                    });
                }
            },
            None => cmd.output().await,
        };

        let output = output.map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                BridgeError::ToolUnavailable {
                    tool: program.display().to_string(),
                    source,
                }
            }
            _ => BridgeError::Io {
                command: command_line.clone(),
                source,
            },
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        trace!("exec output ({command_line}): {stdout}");

        if !output.status.success() {
            return Err(BridgeError::CommandFailed {
                command: command_line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

pub(crate) fn render_command(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_command() {
        let line = render_command(
            Path::new("adb"),
            &["-s".to_string(), "abc".to_string(), "devices".to_string()],
        );
        assert_eq!(line, "adb -s abc devices");
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_unavailable() {
        let result = ProcessRunner
            .run(
                &PathBuf::from("/nonexistent/dir/adb-missing"),
                &[],
                Some(Duration::from_secs(1)),
            )
            .await;
        assert!(matches!(result, Err(BridgeError::ToolUnavailable { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_command_failed() {
        let result = ProcessRunner
            .run(Path::new("false"), &[], Some(Duration::from_secs(5)))
            .await;
        assert!(matches!(result, Err(BridgeError::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_trimmed() {
        let output = ProcessRunner
            .run(
                Path::new("echo"),
                &["  hello  ".to_string()],
                Some(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        assert_eq!(output, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let result = ProcessRunner
            .run(
                Path::new("sleep"),
                &["5".to_string()],
                Some(Duration::from_millis(100)),
            )
            .await;
        assert!(matches!(result, Err(BridgeError::TimedOut { .. })));
    }
}
