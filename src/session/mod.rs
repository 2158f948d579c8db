//! Session core - mirrors the remote job's run state and relays notifications

mod control;
mod controller;
mod listener;

pub use control::{ControlClient, ControlError};
pub use controller::SessionController;
pub use listener::NotificationListener;

use tokio::sync::{broadcast, mpsc};

use crate::data::{ControlCommand, RunState};

/// Commands that can be sent to the session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// User invoked the toggle action
    Toggle,
    /// Re-query the remote state
    Refresh,
    /// Stop the controller loop
    Shutdown,
}

/// Status updates from the session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// A control reply confirmed this state
    State(RunState),
    /// A control request went out; the state is unchanged until it is answered
    RequestSent(ControlCommand),
    /// The latest control request failed or timed out
    RequestFailed {
        command: ControlCommand,
        reason: String,
    },
}

pub fn create_session_channels() -> (
    mpsc::Sender<SessionCommand>,
    mpsc::Receiver<SessionCommand>,
    broadcast::Sender<SessionStatus>,
    broadcast::Receiver<SessionStatus>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (status_tx, status_rx) = broadcast::channel(16);
    (cmd_tx, cmd_rx, status_tx, status_rx)
}
