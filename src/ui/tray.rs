//! Headless tray shell
//!
//! Plays the tray's role without a GUI: reports session status in the log
//! and turns OS signals into session commands (SIGUSR1 toggles, SIGUSR2
//! refreshes). Ctrl+C is handled in `main`.

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::LogSurface;
use crate::session::{SessionCommand, SessionStatus};

/// Tray shell bound to a running session controller
pub struct TrayShell {
    cmd_tx: mpsc::Sender<SessionCommand>,
    status_rx: broadcast::Receiver<SessionStatus>,
    surface: LogSurface,
}

impl TrayShell {
    pub fn new(
        cmd_tx: mpsc::Sender<SessionCommand>,
        status_rx: broadcast::Receiver<SessionStatus>,
        surface: LogSurface,
    ) -> Self {
        Self {
            cmd_tx,
            status_rx,
            surface,
        }
    }

    /// Run until the controller goes away
    pub async fn run(mut self) -> Result<()> {
        let mut signals = TraySignals::new()?;
        info!("Tray shell ready");

        loop {
            tokio::select! {
                status = self.status_rx.recv() => match status {
                    Ok(status) => self.update_status(&status),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Missed {} status updates", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Status channel closed, exiting tray");
                        break;
                    }
                },

                Some(cmd) = signals.next() => self.send(cmd),
            }
        }

        info!("Tray shell exited");
        Ok(())
    }

    fn update_status(&self, status: &SessionStatus) {
        debug!(
            "Tray status updated: {} [{}]",
            status_text(status),
            self.surface.action_label()
        );
    }

    fn send(&self, cmd: SessionCommand) {
        info!("{:?} requested via tray", cmd);
        // Never block the shell on a full command queue
        if let Err(e) = self.cmd_tx.try_send(cmd) {
            error!("Failed to send {:?} command: {}", cmd, e);
        }
    }
}

fn status_text(status: &SessionStatus) -> String {
    match status {
        SessionStatus::State(state) => format!("Status: {}", state),
        SessionStatus::RequestSent(command) => format!("Status: waiting for {} reply", command),
        SessionStatus::RequestFailed { command, reason } => {
            format!("Status: {} failed - {}", command, truncate_str(reason, 40))
        }
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(unix)]
struct TraySignals {
    toggle: tokio::signal::unix::Signal,
    refresh: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TraySignals {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            toggle: signal(SignalKind::user_defined1())?,
            refresh: signal(SignalKind::user_defined2())?,
        })
    }

    async fn next(&mut self) -> Option<SessionCommand> {
        tokio::select! {
            Some(()) = self.toggle.recv() => Some(SessionCommand::Toggle),
            Some(()) = self.refresh.recv() => Some(SessionCommand::Refresh),
            else => None,
        }
    }
}

#[cfg(not(unix))]
struct TraySignals;

#[cfg(not(unix))]
impl TraySignals {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> Option<SessionCommand> {
        std::future::pending().await
    }
}
