//! One-shot control requests

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::{ControlCommand, ControlReply};
use crate::transport::{ControlTransport, TransportError};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no reply to {command} after {after:?}")]
    Timeout {
        command: ControlCommand,
        after: Duration,
    },
}

/// A single request/reply round trip against the control endpoint.
///
/// Consumed by [`ControlClient::send`]; build a new one per request.
pub struct ControlClient {
    transport: Arc<dyn ControlTransport>,
    endpoint: String,
    timeout: Option<Duration>,
}

impl ControlClient {
    pub fn new(
        transport: Arc<dyn ControlTransport>,
        endpoint: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Send `command` and wait for the reply.
    ///
    /// Without a timeout this waits as long as the peer stays silent.
    pub async fn send(self, command: ControlCommand) -> Result<ControlReply, ControlError> {
        debug!("Sending {} to {}", command, self.endpoint);
        let request = self.transport.request(&self.endpoint, command.to_frames());

        let frames = match self.timeout {
            Some(after) => tokio::time::timeout(after, request)
                .await
                .map_err(|_| ControlError::Timeout { command, after })??,
            None => request.await?,
        };

        let reply = ControlReply::new(frames);
        if reply.is_empty() {
            warn!("Empty reply to {}, treating the job as paused", command);
        } else {
            debug!("Reply to {}: {}", command, reply.describe());
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RunState;
    use crate::transport::memory::ScriptedControl;

    #[tokio::test]
    async fn test_send_writes_token_and_parses_reply() {
        let transport = ScriptedControl::always(&["running"]);
        let client = ControlClient::new(Arc::new(transport.clone()), "tcp://127.0.0.1:5557", None);

        let reply = client.send(ControlCommand::Status).await.unwrap();

        assert_eq!(reply.run_state(), RunState::Running);
        assert_eq!(transport.sent_tokens(), vec!["STATUS"]);
        assert_eq!(transport.sent_endpoints(), vec!["tcp://127.0.0.1:5557"]);
    }

    #[tokio::test]
    async fn test_empty_reply_is_paused() {
        let transport = ScriptedControl::always(&[]);
        let client = ControlClient::new(Arc::new(transport), "tcp://127.0.0.1:5557", None);

        let reply = client.send(ControlCommand::Start).await.unwrap();
        assert!(reply.is_empty());
        assert_eq!(reply.run_state(), RunState::Paused);
    }

    #[tokio::test]
    async fn test_transport_error_is_reported() {
        let transport = ScriptedControl::new(|_| {
            Some(Err(TransportError::Connect {
                endpoint: "tcp://127.0.0.1:5557".to_string(),
                reason: "refused".to_string(),
            }))
        });
        let client = ControlClient::new(Arc::new(transport), "tcp://127.0.0.1:5557", None);

        let err = client.send(ControlCommand::Pause).await.unwrap_err();
        assert!(matches!(err, ControlError::Transport(TransportError::Connect { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let transport = ScriptedControl::silent();
        let client = ControlClient::new(
            Arc::new(transport),
            "tcp://127.0.0.1:5557",
            Some(Duration::from_secs(5)),
        );

        let err = client.send(ControlCommand::Status).await.unwrap_err();
        match err {
            ControlError::Timeout { command, after } => {
                assert_eq!(command, ControlCommand::Status);
                assert_eq!(after, Duration::from_secs(5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
