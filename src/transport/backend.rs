//! Messaging transport traits
//!
//! The session core only needs two primitives from the messaging layer:
//! a one-shot multi-frame request/reply and a multi-frame subscription.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// A multi-part message, one byte buffer per frame
pub type Frames = Vec<Vec<u8>>;

/// Messages delivered by a subscription, in arrival order
pub type MessageStream = BoxStream<'static, Result<Frames, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("failed to send on {endpoint}: {reason}")]
    Send { endpoint: String, reason: String },

    #[error("failed to receive on {endpoint}: {reason}")]
    Receive { endpoint: String, reason: String },

    #[error("failed to subscribe to {topic:?} on {endpoint}: {reason}")]
    Subscribe {
        endpoint: String,
        topic: String,
        reason: String,
    },
}

/// Request/reply capability used by the control client
#[async_trait]
pub trait ControlTransport: Send + Sync {
    /// Open a fresh connection to `endpoint`, send `frames` and wait for
    /// exactly one reply. Implementations must not reuse connections.
    async fn request(&self, endpoint: &str, frames: Frames) -> Result<Frames, TransportError>;
}

/// Publish/subscribe capability used by the notification listener
#[async_trait]
pub trait SubscribeTransport: Send + Sync {
    /// Subscribe to `topic` on `endpoint`. The returned stream is infinite
    /// unless the transport shuts down; per-message errors are yielded as
    /// items and do not end it.
    async fn subscribe(&self, endpoint: &str, topic: &str) -> Result<MessageStream, TransportError>;
}
