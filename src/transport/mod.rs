//! Messaging transports for the control and notification channels

mod backend;
#[cfg(test)]
pub mod memory;
mod zmq_backend;

pub use backend::{ControlTransport, Frames, MessageStream, SubscribeTransport, TransportError};
pub use zmq_backend::ZmqTransport;
