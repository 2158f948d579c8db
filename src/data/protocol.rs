//! Control and notification protocol types
//!
//! The control endpoint speaks a one-request/one-reply token protocol:
//! the request is a single frame holding `STATUS`, `START` or `PAUSE`,
//! the reply is any number of free-form text frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame payload text that marks the remote job as running
const RUNNING_TOKEN: &str = "running";

/// Whether the remote job is executing, as last confirmed by a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Paused,
}

impl RunState {
    /// Text for the toggle action given the last known state.
    ///
    /// An unknown state is displayed like a paused one.
    pub fn action_label(state: Option<RunState>) -> &'static str {
        match state {
            Some(RunState::Running) => "Pause",
            Some(RunState::Paused) | None => "Start",
        }
    }

    /// Command that flips the given state. Unknown counts as paused.
    pub fn toggle_command(state: Option<RunState>) -> ControlCommand {
        match state {
            Some(RunState::Running) => ControlCommand::Pause,
            Some(RunState::Paused) | None => ControlCommand::Start,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => f.write_str("running"),
            RunState::Paused => f.write_str("paused"),
        }
    }
}

/// Request token sent verbatim to the control endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Query the current state; never mutates the remote job
    Status,
    /// Ask the remote job to run
    Start,
    /// Ask the remote job to pause
    Pause,
}

impl ControlCommand {
    /// Wire token for this command
    pub fn token(self) -> &'static str {
        match self {
            ControlCommand::Status => "STATUS",
            ControlCommand::Start => "START",
            ControlCommand::Pause => "PAUSE",
        }
    }

    /// Request frames for this command
    pub fn to_frames(self) -> Vec<Vec<u8>> {
        vec![self.token().as_bytes().to_vec()]
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Frames received in reply to a control request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlReply {
    frames: Vec<Vec<u8>>,
}

impl ControlReply {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self { frames }
    }

    /// Build a reply from text frames
    #[cfg(test)]
    pub fn from_text<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            frames: frames
                .into_iter()
                .map(|frame| frame.as_ref().as_bytes().to_vec())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Interpret the reply as a run state.
    ///
    /// Any frame exactly equal to `running` confirms RUNNING. Every other
    /// reply, empty or garbage included, confirms PAUSED.
    pub fn run_state(&self) -> RunState {
        let running = self
            .frames
            .iter()
            .any(|frame| frame.as_slice() == RUNNING_TOKEN.as_bytes());

        if running {
            RunState::Running
        } else {
            RunState::Paused
        }
    }

    /// Lossy text rendering for logs
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .frames
            .iter()
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .collect();
        format!("{:?}", parts)
    }
}

/// One displayable message received on the notification subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Topic the event was received under
    pub category: String,
    /// Frame text, forwarded verbatim
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(category: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}
