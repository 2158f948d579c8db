//! Data types shared by the control and notification channels

mod protocol;

pub use protocol::{ControlCommand, ControlReply, NotificationEvent, RunState};
