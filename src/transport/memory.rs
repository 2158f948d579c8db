//! In-memory transports for exercising the session core without sockets

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{ControlTransport, Frames, MessageStream, SubscribeTransport, TransportError};

type Responder = dyn Fn(&str) -> Option<Result<Frames, TransportError>> + Send + Sync;

/// Control transport that answers from a responder closure.
///
/// The closure sees the request token; returning `None` leaves the request
/// outstanding forever, like a peer that never replies.
#[derive(Clone)]
pub struct ScriptedControl {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    responder: Arc<Responder>,
}

impl ScriptedControl {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Option<Result<Frames, TransportError>> + Send + Sync + 'static,
    {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    /// Reply to every request with the given text frames
    pub fn always(frames: &[&str]) -> Self {
        let frames: Frames = frames.iter().map(|f| f.as_bytes().to_vec()).collect();
        Self::new(move |_| Some(Ok(frames.clone())))
    }

    /// Never reply to anything
    pub fn silent() -> Self {
        Self::new(|_| None)
    }

    /// Request tokens sent so far, in order
    pub fn sent_tokens(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, token)| token.clone())
            .collect()
    }

    /// Endpoints contacted so far, in order
    pub fn sent_endpoints(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }
}

#[async_trait]
impl ControlTransport for ScriptedControl {
    async fn request(&self, endpoint: &str, frames: Frames) -> Result<Frames, TransportError> {
        let token = frames
            .first()
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .unwrap_or_default();
        self.sent
            .lock()
            .unwrap()
            .push((endpoint.to_string(), token.clone()));

        let response = (self.responder)(&token);
        match response {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

/// Subscription transport fed by a test-held sender
pub struct ChannelSubscriber {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<Frames, TransportError>>>>,
    subscriptions: Mutex<Vec<(String, String)>>,
}

impl ChannelSubscriber {
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<Frames, TransportError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = Self {
            rx: Mutex::new(Some(rx)),
            subscriptions: Mutex::new(Vec::new()),
        };
        (subscriber, tx)
    }

    /// (endpoint, topic) pairs subscribed so far
    pub fn subscriptions(&self) -> Vec<(String, String)> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscribeTransport for ChannelSubscriber {
    async fn subscribe(&self, endpoint: &str, topic: &str) -> Result<MessageStream, TransportError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((endpoint.to_string(), topic.to_string()));

        let rx = self.rx.lock().unwrap().take().ok_or_else(|| TransportError::Subscribe {
            endpoint: endpoint.to_string(),
            topic: topic.to_string(),
            reason: "already subscribed".to_string(),
        })?;

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Build text frames
pub fn text_frames(frames: &[&str]) -> Frames {
    frames.iter().map(|f| f.as_bytes().to_vec()).collect()
}
