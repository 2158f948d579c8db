//! ZeroMQ transport backend
//! REQ sockets for control requests, SUB sockets for notifications.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, warn};
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

use super::{ControlTransport, Frames, MessageStream, SubscribeTransport, TransportError};

/// Pause before reconnecting a failed subscription
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// ZeroMQ-backed transport. Stateless: every request opens its own socket.
#[derive(Debug, Clone, Default)]
pub struct ZmqTransport;

impl ZmqTransport {
    pub fn new() -> Self {
        Self
    }
}

fn to_message(frames: Frames) -> Result<ZmqMessage, zeromq::ZmqEmptyMessageError> {
    let frames: Vec<Bytes> = frames.into_iter().map(Bytes::from).collect();
    ZmqMessage::try_from(frames)
}

fn to_frames(message: ZmqMessage) -> Frames {
    message
        .into_vec()
        .into_iter()
        .map(|frame| frame.to_vec())
        .collect()
}

#[async_trait]
impl ControlTransport for ZmqTransport {
    async fn request(&self, endpoint: &str, frames: Frames) -> Result<Frames, TransportError> {
        let mut socket = ReqSocket::new();
        socket
            .connect(endpoint)
            .await
            .map_err(|e| TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let message = to_message(frames).map_err(|e| TransportError::Send {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        socket
            .send(message)
            .await
            .map_err(|e| TransportError::Send {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let reply = socket.recv().await.map_err(|e| TransportError::Receive {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let frames = to_frames(reply);
        debug!("Received {} reply frame(s) from {}", frames.len(), endpoint);
        Ok(frames)
    }
}

/// Connect a SUB socket and apply the topic filter
async fn open_subscription(endpoint: &str, topic: &str) -> Result<SubSocket, TransportError> {
    let mut socket = SubSocket::new();
    socket
        .connect(endpoint)
        .await
        .map_err(|e| TransportError::Connect {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    socket
        .subscribe(topic)
        .await
        .map_err(|e| TransportError::Subscribe {
            endpoint: endpoint.to_string(),
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;

    debug!("Subscribed to {:?} on {}", topic, endpoint);
    Ok(socket)
}

/// Subscription state carried between stream items
struct Subscription {
    socket: Option<SubSocket>,
    endpoint: String,
    topic: String,
    failures: u32,
}

impl Subscription {
    /// Receive the next message, reconnecting as often as needed.
    ///
    /// Only the first of a run of connect failures is logged. A receive
    /// failure drops the socket and is yielded as an error item.
    async fn next_message(&mut self) -> Result<Frames, TransportError> {
        loop {
            if self.failures > 0 {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }

            if self.socket.is_none() {
                match open_subscription(&self.endpoint, &self.topic).await {
                    Ok(socket) => self.socket = Some(socket),
                    Err(e) => {
                        self.failures += 1;
                        if self.failures == 1 {
                            warn!("Notifications unavailable, retrying in background: {}", e);
                        }
                        continue;
                    }
                }
            }

            let Some(socket) = self.socket.as_mut() else {
                continue;
            };

            match socket.recv().await {
                Ok(message) => {
                    self.failures = 0;
                    return Ok(to_frames(message));
                }
                Err(e) => {
                    warn!("Subscription receive failed on {}: {}", self.endpoint, e);
                    self.socket = None;
                    self.failures += 1;
                    return Err(TransportError::Receive {
                        endpoint: self.endpoint.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl SubscribeTransport for ZmqTransport {
    /// Connects on first poll, so a publisher that is not up yet never fails
    /// or blocks the caller.
    async fn subscribe(&self, endpoint: &str, topic: &str) -> Result<MessageStream, TransportError> {
        let subscription = Subscription {
            socket: None,
            endpoint: endpoint.to_string(),
            topic: topic.to_string(),
            failures: 0,
        };

        let stream = futures::stream::unfold(subscription, |mut subscription| async move {
            let item = subscription.next_message().await;
            Some((item, subscription))
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ControlCommand, ControlReply, RunState};
    use tokio::task::JoinHandle;
    use zeromq::{PubSocket, RepSocket};

    const WAIT: Duration = Duration::from_secs(10);

    fn frames(texts: &[&str]) -> Frames {
        texts.iter().map(|t| t.as_bytes().to_vec()).collect()
    }

    /// REP peer on an ephemeral port answering each request with the next
    /// scripted reply. Resolves to the requests it saw.
    async fn reply_server(replies: Vec<Frames>) -> (String, JoinHandle<Vec<Frames>>) {
        let mut socket = RepSocket::new();
        let endpoint = socket.bind("tcp://127.0.0.1:0").await.unwrap();

        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for reply in replies {
                let request = socket.recv().await.unwrap();
                seen.push(to_frames(request));
                socket.send(to_message(reply).unwrap()).await.unwrap();
            }
            seen
        });

        (endpoint.to_string(), handle)
    }

    /// Publish `messages` on `socket` every 50ms until aborted
    fn keep_publishing(mut socket: PubSocket, messages: Vec<&'static str>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                for message in &messages {
                    let _ = socket.send(to_message(frames(&[*message])).unwrap()).await;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
    }

    #[tokio::test]
    async fn test_request_round_trips_token_and_frames() {
        let (endpoint, server) = reply_server(vec![
            frames(&["paused"]),
            frames(&["a", "running"]),
        ])
        .await;
        let transport = ZmqTransport::new();

        let first = tokio::time::timeout(
            WAIT,
            transport.request(&endpoint, ControlCommand::Status.to_frames()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(first, frames(&["paused"]));

        // A second request goes out on a new socket
        let second = tokio::time::timeout(
            WAIT,
            transport.request(&endpoint, ControlCommand::Start.to_frames()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(second, frames(&["a", "running"]));
        assert_eq!(ControlReply::new(second).run_state(), RunState::Running);

        let seen = server.await.unwrap();
        assert_eq!(seen, vec![frames(&["STATUS"]), frames(&["START"])]);
    }

    #[tokio::test]
    async fn test_subscription_filters_by_topic() {
        let mut publisher = PubSocket::new();
        let endpoint = publisher.bind("tcp://127.0.0.1:0").await.unwrap().to_string();
        let publishing = keep_publishing(publisher, vec!["other/ignored", "sync/job done"]);

        let mut stream = ZmqTransport::new().subscribe(&endpoint, "sync").await.unwrap();
        for _ in 0..3 {
            let message = tokio::time::timeout(WAIT, stream.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            assert_eq!(message, frames(&["sync/job done"]));
        }

        publishing.abort();
    }

    #[tokio::test]
    async fn test_subscribe_before_publisher_binds() {
        // Reserve a port, then free it so nothing listens yet
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let endpoint = format!("tcp://127.0.0.1:{}", port);

        let mut stream = ZmqTransport::new().subscribe(&endpoint, "sync").await.unwrap();
        let receiver = tokio::spawn(async move { stream.next().await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut publisher = PubSocket::new();
        publisher.bind(&endpoint).await.unwrap();
        let publishing = keep_publishing(publisher, vec!["sync/late start"]);

        let message = tokio::time::timeout(WAIT, receiver)
            .await
            .unwrap()
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(message, frames(&["sync/late start"]));

        publishing.abort();
    }
}
