//! IPC client for communicating with the daemon
//!
//! Used by the CLI to submit requests and poll sessions over the Unix
//! Domain Socket.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;
use uuid::Uuid;

use crate::domain::SessionView;
use crate::normalizer::RawTripRequest;
use crate::service::SubmitReceipt;
use crate::state::PlannerMetrics;

use super::default_socket_path;
use super::messages::{PlannerMessage, PlannerResponse};

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum message size, matching the listener's bound
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct PlannerClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for PlannerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerClient {
    /// Create a client with the default socket path
    pub fn new() -> Self {
        Self {
            socket_path: default_socket_path(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a client with a custom socket path
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Submit a trip request, returning the accepted session id
    pub async fn submit(&self, request: &RawTripRequest) -> Result<SubmitReceipt> {
        debug!("PlannerClient: submitting trip request");
        let msg = PlannerMessage::Submit {
            request: request.clone(),
        };
        match self.send_message(msg).await? {
            PlannerResponse::Accepted { session_id, status } => Ok(SubmitReceipt { session_id, status }),
            PlannerResponse::Invalid { fields } => {
                let listing = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.field, f.reason))
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(eyre::eyre!("Invalid trip request: {listing}"))
            }
            PlannerResponse::Error { message } => Err(eyre::eyre!("Daemon error: {message}")),
            other => Err(eyre::eyre!("Unexpected response: {other:?}")),
        }
    }

    /// Fetch a session's current view
    pub async fn status(&self, session_id: Uuid) -> Result<SessionView> {
        debug!(%session_id, "PlannerClient: querying status");
        match self.send_message(PlannerMessage::Status { session_id }).await? {
            PlannerResponse::Session { view } => Ok(view),
            PlannerResponse::NotFound { session_id } => {
                Err(eyre::eyre!("Session not found: {session_id}"))
            }
            PlannerResponse::Error { message } => Err(eyre::eyre!("Daemon error: {message}")),
            other => Err(eyre::eyre!("Unexpected response: {other:?}")),
        }
    }

    /// Fetch session counts by status
    pub async fn metrics(&self) -> Result<PlannerMetrics> {
        debug!("PlannerClient: querying metrics");
        match self.send_message(PlannerMessage::Metrics).await? {
            PlannerResponse::Metrics { metrics } => Ok(metrics),
            PlannerResponse::Error { message } => Err(eyre::eyre!("Daemon error: {message}")),
            other => Err(eyre::eyre!("Unexpected response: {other:?}")),
        }
    }

    /// Check if the daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("PlannerClient: pinging daemon");
        match self.send_message(PlannerMessage::Ping).await? {
            PlannerResponse::Pong { version } => Ok(version),
            PlannerResponse::Error { message } => Err(eyre::eyre!("Daemon error: {message}")),
            other => Err(eyre::eyre!("Unexpected response: {other:?}")),
        }
    }

    /// Request graceful daemon shutdown
    pub async fn shutdown(&self) -> Result<()> {
        debug!("PlannerClient: requesting daemon shutdown");
        match self.send_message(PlannerMessage::Shutdown).await? {
            PlannerResponse::Ok => Ok(()),
            PlannerResponse::Error { message } => Err(eyre::eyre!("Daemon error: {message}")),
            other => Err(eyre::eyre!("Unexpected response: {other:?}")),
        }
    }

    /// Send a message to the daemon and wait for the response
    async fn send_message(&self, msg: PlannerMessage) -> Result<PlannerResponse> {
        debug!(?self.socket_path, "PlannerClient: sending message");

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")?;

        self.send_on_stream(stream, msg).await
    }

    async fn send_on_stream(&self, mut stream: UnixStream, msg: PlannerMessage) -> Result<PlannerResponse> {
        let msg_json = serde_json::to_string(&msg).context("Failed to serialize message")?;

        if msg_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", msg_json.len()));
        }

        tokio::time::timeout(self.timeout, async {
            stream
                .write_all(msg_json.as_bytes())
                .await
                .context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let mut reader = BufReader::new(&mut stream);
        let mut response_line = String::new();

        tokio::time::timeout(self.timeout, async {
            let bytes_read = reader
                .read_line(&mut response_line)
                .await
                .context("Failed to read response")?;

            if bytes_read > MAX_MESSAGE_SIZE {
                return Err(eyre::eyre!("Response too large: {} bytes", bytes_read));
            }

            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Read timeout")??;

        let response: PlannerResponse =
            serde_json::from_str(response_line.trim()).context("Failed to parse daemon response")?;

        debug!(?response, "PlannerClient: received response");
        Ok(response)
    }
}
