//! Headless display surface
//!
//! Stands in for the tray GUI: notifications and label changes go to the
//! log, and the current label is kept so the tray shell can report it.

use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::DisplaySurface;
use crate::data::ControlCommand;
use crate::session::ControlError;

/// Display surface that writes everything to the log
#[derive(Debug, Clone, Default)]
pub struct LogSurface {
    label: Arc<Mutex<String>>,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current toggle action label
    pub fn action_label(&self) -> String {
        match self.label.lock() {
            Ok(label) => label.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DisplaySurface for LogSurface {
    fn show_notification(&mut self, title: &str, body: &str) {
        info!("{}: {}", title, body);
    }

    fn set_action_label(&mut self, text: &str) {
        let mut label = match self.label.lock() {
            Ok(label) => label,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *label != text {
            debug!("Action label: {:?} -> {:?}", *label, text);
            *label = text.to_string();
        }
    }

    fn request_failed(&mut self, command: ControlCommand, error: &ControlError) {
        warn!("Could not {} the sync job: {}", verb(command), error);
    }
}

fn verb(command: ControlCommand) -> &'static str {
    match command {
        ControlCommand::Status => "query",
        ControlCommand::Start => "start",
        ControlCommand::Pause => "pause",
    }
}
