//! Notification subscription
//!
//! Turns the multi-frame messages of a pub/sub subscription into a lazy
//! sequence of [`NotificationEvent`]s, one per frame, in arrival order.

use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::data::NotificationEvent;
use crate::transport::{Frames, MessageStream, SubscribeTransport, TransportError};

/// Long-lived subscription to the notification topic.
///
/// Not restartable: dropping it ends the subscription and a new listener
/// starts from whatever is published after it connects.
pub struct NotificationListener {
    topic: String,
    messages: MessageStream,
    pending: VecDeque<NotificationEvent>,
}

impl NotificationListener {
    /// Subscribe to `topic` on `endpoint`
    pub async fn start(
        transport: &dyn SubscribeTransport,
        endpoint: &str,
        topic: &str,
    ) -> Result<Self, TransportError> {
        let messages = transport.subscribe(endpoint, topic).await?;
        info!("Listening for {:?} notifications on {}", topic, endpoint);

        Ok(Self {
            topic: topic.to_string(),
            messages,
            pending: VecDeque::new(),
        })
    }

    /// Next notification, waiting for one to arrive.
    ///
    /// Returns `None` only once the transport has closed the subscription.
    pub async fn next_event(&mut self) -> Option<NotificationEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            match self.messages.next().await? {
                Ok(frames) => self.decode(frames),
                Err(e) => warn!("Notification message lost: {}", e),
            }
        }
    }

    /// Consume the listener as a stream of notifications
    pub fn into_stream(self) -> impl Stream<Item = NotificationEvent> + Send {
        futures::stream::unfold(self, |mut listener| async move {
            let event = listener.next_event().await?;
            Some((event, listener))
        })
    }

    fn decode(&mut self, frames: Frames) {
        debug!("Notification message with {} frame(s)", frames.len());

        for frame in frames {
            match String::from_utf8(frame) {
                Ok(payload) => self
                    .pending
                    .push_back(NotificationEvent::new(self.topic.clone(), payload)),
                Err(e) => warn!("Skipping non-text notification frame: {}", e),
            }
        }
    }
}
