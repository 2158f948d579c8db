//! Session controller
//!
//! Owns the last confirmed run state of the remote job. The state only
//! changes when a control reply arrives; sending a request never moves it.
//!
//! Requests run as tasks tagged with a generation number and the latest
//! request wins: a reply to anything but the most recent request is
//! discarded, and once the most recent one is answered the older ones still
//! in flight are aborted.
//!
//! This applies to every request kind. A refresh or status poll issued while
//! a START/PAUSE is outstanding supersedes it: the toggle's reply is dropped
//! and the label follows the STATUS reply, which may predate the toggle
//! taking effect on the peer. The next request corrects it.

use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::data::{ControlCommand, ControlReply, NotificationEvent, RunState};
use crate::transport::ControlTransport;
use crate::ui::DisplaySurface;

use super::{ControlClient, ControlError, NotificationListener, SessionCommand, SessionStatus};

/// Outcome of one control request
#[derive(Debug)]
struct ReplyEvent {
    generation: u64,
    command: ControlCommand,
    result: Result<ControlReply, ControlError>,
}

pub struct SessionController {
    /// Transport used for every control request
    control: Arc<dyn ControlTransport>,
    control_endpoint: String,
    request_timeout: Option<Duration>,
    status_poll: Option<Duration>,
    notification_title: String,
    surface: Box<dyn DisplaySurface>,
    status_tx: broadcast::Sender<SessionStatus>,
    /// Last confirmed state, `None` until the first reply
    run_state: Option<RunState>,
    /// Generation of the most recently issued request
    latest_request: u64,
    in_flight: JoinSet<ReplyEvent>,
}

impl SessionController {
    /// Create the controller and query the remote state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &Config,
        control: Arc<dyn ControlTransport>,
        surface: Box<dyn DisplaySurface>,
        status_tx: broadcast::Sender<SessionStatus>,
    ) -> Self {
        let mut controller = Self {
            control,
            control_endpoint: config.endpoints.control.clone(),
            request_timeout: config.control.request_timeout(),
            status_poll: config.control.status_poll_interval(),
            notification_title: config.notifications.title.clone(),
            surface,
            status_tx,
            run_state: None,
            latest_request: 0,
            in_flight: JoinSet::new(),
        };

        controller
            .surface
            .set_action_label(RunState::action_label(None));
        controller.issue(ControlCommand::Status);
        controller
    }

    /// Last confirmed state of the remote job
    pub fn run_state(&self) -> Option<RunState> {
        self.run_state
    }

    /// Flip the remote job based on the last known state.
    ///
    /// Returns the command that was sent.
    pub fn toggle(&mut self) -> ControlCommand {
        let command = RunState::toggle_command(self.run_state);
        info!(
            "Toggle requested (last known state: {}), sending {}",
            describe_state(self.run_state),
            command
        );
        self.issue(command);
        command
    }

    /// Re-query the remote state
    pub fn refresh(&mut self) {
        debug!("Refreshing remote state");
        self.issue(ControlCommand::Status);
    }

    /// Forward a notification to the surface verbatim
    pub fn handle_notification(&mut self, event: NotificationEvent) {
        debug!(
            "Notification [{}] received at {}: {}",
            event.category, event.received_at, event.payload
        );
        self.surface
            .show_notification(&self.notification_title, &event.payload);
    }

    /// Run the controller until shutdown.
    ///
    /// Multiplexes surface commands, control replies, notifications and the
    /// optional status poll on the current task.
    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<SessionCommand>,
        listener: Option<NotificationListener>,
    ) {
        info!("Session controller running against {}", self.control_endpoint);

        let mut notifications = listener.map(|listener| listener.into_stream().boxed());
        let mut poll_timer = self
            .status_poll
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Toggle) => {
                        self.toggle();
                    }
                    Some(SessionCommand::Refresh) => self.refresh(),
                    Some(SessionCommand::Shutdown) => {
                        info!("Shutdown requested");
                        break;
                    }
                    None => {
                        info!("Command channel closed, stopping session controller");
                        break;
                    }
                },

                Some(reply) = self.next_reply() => self.handle_reply(reply),

                event = next_notification(&mut notifications) => match event {
                    Some(event) => self.handle_notification(event),
                    None => {
                        warn!("Notification subscription closed, no further notifications");
                        notifications = None;
                    }
                },

                _ = next_tick(&mut poll_timer) => self.refresh(),
            }
        }

        if !self.in_flight.is_empty() {
            debug!("Abandoning {} outstanding request(s)", self.in_flight.len());
        }
        self.in_flight.abort_all();
        info!(
            "Session controller stopped (last known state: {})",
            describe_state(self.run_state())
        );
    }

    fn issue(&mut self, command: ControlCommand) {
        self.latest_request += 1;
        let generation = self.latest_request;

        if !self.in_flight.is_empty() {
            debug!(
                "{} supersedes {} outstanding request(s)",
                command,
                self.in_flight.len()
            );
        }

        let client = ControlClient::new(
            self.control.clone(),
            self.control_endpoint.clone(),
            self.request_timeout,
        );
        self.in_flight.spawn(async move {
            let result = client.send(command).await;
            ReplyEvent {
                generation,
                command,
                result,
            }
        });

        let _ = self.status_tx.send(SessionStatus::RequestSent(command));
    }

    /// Wait for the next finished request. `None` when nothing is in flight.
    async fn next_reply(&mut self) -> Option<ReplyEvent> {
        while let Some(joined) = self.in_flight.join_next().await {
            match joined {
                Ok(reply) => return Some(reply),
                Err(e) if e.is_cancelled() => continue,
                Err(e) => error!("Control request task failed: {}", e),
            }
        }
        None
    }

    fn handle_reply(&mut self, reply: ReplyEvent) {
        if reply.generation != self.latest_request {
            debug!(
                "Discarding reply to superseded {} request (#{}, latest #{})",
                reply.command, reply.generation, self.latest_request
            );
            return;
        }

        // Everything still in flight is older than this reply
        self.in_flight.abort_all();

        match reply.result {
            Ok(control_reply) => self.apply_state(control_reply.run_state()),
            Err(e) => {
                warn!("{} request failed: {}", reply.command, e);
                self.surface.request_failed(reply.command, &e);
                let _ = self.status_tx.send(SessionStatus::RequestFailed {
                    command: reply.command,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn apply_state(&mut self, state: RunState) {
        let previous = self.run_state.replace(state);
        if previous != Some(state) {
            info!(
                "Remote job state: {} -> {}",
                describe_state(previous),
                state
            );
        }

        self.surface
            .set_action_label(RunState::action_label(Some(state)));
        let _ = self.status_tx.send(SessionStatus::State(state));
    }
}

fn describe_state(state: Option<RunState>) -> String {
    match state {
        Some(state) => state.to_string(),
        None => "unknown".to_string(),
    }
}

async fn next_notification(
    notifications: &mut Option<BoxStream<'static, NotificationEvent>>,
) -> Option<NotificationEvent> {
    match notifications {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
