//! Display surface contract
//!
//! The session controller calls into a surface; the surface never calls
//! back into the controller except by sending [`crate::session::SessionCommand`]s.

use crate::data::ControlCommand;
use crate::session::ControlError;

/// Sink for user-visible text owned by the GUI layer
pub trait DisplaySurface: Send {
    /// Show a transient notification
    fn show_notification(&mut self, title: &str, body: &str);

    /// Update the text of the toggle action
    fn set_action_label(&mut self, text: &str);

    /// The latest control request failed. The label is left as it was.
    fn request_failed(&mut self, _command: ControlCommand, _error: &ControlError) {}
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SurfaceCall {
        Notification { title: String, body: String },
        Label(String),
        Failed(ControlCommand),
    }

    /// Surface that reports every call on a channel
    pub struct RecordingSurface {
        tx: mpsc::UnboundedSender<SurfaceCall>,
    }

    impl RecordingSurface {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<SurfaceCall>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    impl DisplaySurface for RecordingSurface {
        fn show_notification(&mut self, title: &str, body: &str) {
            let _ = self.tx.send(SurfaceCall::Notification {
                title: title.to_string(),
                body: body.to_string(),
            });
        }

        fn set_action_label(&mut self, text: &str) {
            let _ = self.tx.send(SurfaceCall::Label(text.to_string()));
        }

        fn request_failed(&mut self, command: ControlCommand, _error: &ControlError) {
            let _ = self.tx.send(SurfaceCall::Failed(command));
        }
    }

    /// Calls recorded so far, without waiting
    pub fn drain(rx: &mut mpsc::UnboundedReceiver<SurfaceCall>) -> Vec<SurfaceCall> {
        let mut calls = Vec::new();
        while let Ok(call) = rx.try_recv() {
            calls.push(call);
        }
        calls
    }
}
