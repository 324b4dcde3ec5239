use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ControllerError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    AbortedOnFailure,
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestState::Idle => "idle",
            TestState::Running => "running",
            TestState::Paused => "paused",
            TestState::Completed => "completed",
            TestState::AbortedOnFailure => "aborted on failure",
        };
        f.write_str(label)
    }
}

/// Progress of one timed test. Elapsed time survives pause and resume and is
/// reset only by a fresh start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestSession {
    pub duration_secs: u32,
    pub elapsed_secs: u32,
    pub state: TestState,
}

impl TestSession {
    /// A fresh running session
    pub fn start(duration_secs: u32) -> Result<Self, ControllerError> {
        if duration_secs == 0 {
            return Err(ControllerError::InvalidDuration);
        }
        Ok(Self {
            duration_secs,
            elapsed_secs: 0,
            state: TestState::Running,
        })
    }

    pub fn remaining_secs(&self) -> u32 {
        self.duration_secs.saturating_sub(self.elapsed_secs)
    }

    /// Advances one second. Returns `true` when this tick completed the test.
    pub fn tick(&mut self) -> bool {
        if self.state != TestState::Running {
            return false;
        }
        self.elapsed_secs = (self.elapsed_secs + 1).min(self.duration_secs);
        if self.remaining_secs() == 0 {
            self.state = TestState::Completed;
            true
        } else {
            false
        }
    }

    /// Manual stop: paused while time remains, idle otherwise
    pub fn stop(&mut self) -> Result<TestState, ControllerError> {
        self.expect(TestState::Running, "stop")?;
        self.state = if self.remaining_secs() > 0 {
            TestState::Paused
        } else {
            TestState::Idle
        };
        Ok(self.state)
    }

    pub fn resume(&mut self) -> Result<(), ControllerError> {
        self.expect(TestState::Paused, "resume")?;
        self.state = TestState::Running;
        Ok(())
    }

    pub fn abort(&mut self) -> Result<(), ControllerError> {
        self.expect(TestState::Running, "abort")?;
        self.state = TestState::AbortedOnFailure;
        Ok(())
    }

    fn expect(&self, required: TestState, action: &'static str) -> Result<(), ControllerError> {
        if self.state == required {
            Ok(())
        } else {
            Err(ControllerError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }
}
