//! IPC listener and dispatch for the daemon side
//!
//! Helpers for creating and cleaning up the Unix Domain Socket plus the
//! serve loop that reads one message per connection and answers it from
//! the planner service.

use std::path::PathBuf;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::service::{PlannerService, SubmitError};
use crate::state::SessionError;
use crate::VERSION;

use super::default_socket_path;
use super::messages::{PlannerMessage, PlannerResponse};

/// Maximum message size; a submission with full preferences fits easily
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Create and bind the daemon's socket at the default path
pub fn create_listener() -> Result<(UnixListener, PathBuf)> {
    let socket_path = default_socket_path();
    create_listener_at(&socket_path)
}

/// Create a listener at a specific path
///
/// Handles creation of the parent directory and cleanup of stale socket
/// files from previous runs.
pub fn create_listener_at(socket_path: &PathBuf) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener: socket bound successfully");

    Ok((listener, socket_path.clone()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &PathBuf) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Accept and answer connections until shutdown
///
/// Returns when a `Shutdown` message arrives or the shutdown channel
/// fires. Connection-level errors are logged and never end the loop.
pub async fn serve(
    listener: UnixListener,
    service: PlannerService,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    info!("IPC listener serving");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((mut stream, _addr)) => {
                        match handle_connection(&mut stream, &service).await {
                            Ok(true) => {
                                info!("Shutdown requested via IPC");
                                break;
                            }
                            Ok(false) => {}
                            Err(e) => warn!(error = %e, "IPC connection error"),
                        }
                    }
                    Err(e) => warn!(error = %e, "IPC accept error"),
                }
            }

            _ = shutdown_rx.recv() => {
                debug!("serve: shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

/// Read one message, dispatch it, send the response
///
/// Returns true when the message asked the daemon to shut down.
pub async fn handle_connection(stream: &mut UnixStream, service: &PlannerService) -> Result<bool> {
    let msg = read_message(stream).await?;
    let (response, shutdown) = dispatch(service, msg).await;
    send_response(stream, response).await?;
    Ok(shutdown)
}

/// Map one request to its response
async fn dispatch(service: &PlannerService, msg: PlannerMessage) -> (PlannerResponse, bool) {
    debug!(?msg, "dispatch: called");
    match msg {
        PlannerMessage::Submit { request } => match service.submit(&request).await {
            Ok(receipt) => (
                PlannerResponse::Accepted {
                    session_id: receipt.session_id,
                    status: receipt.status,
                },
                false,
            ),
            Err(SubmitError::Invalid(invalid)) => (PlannerResponse::Invalid { fields: invalid.fields }, false),
            Err(e) => (PlannerResponse::Error { message: e.to_string() }, false),
        },

        PlannerMessage::Status { session_id } => match service.status(&session_id) {
            Ok(view) => (PlannerResponse::Session { view }, false),
            Err(SessionError::NotFound(id)) => (PlannerResponse::NotFound { session_id: id }, false),
            Err(e) => (PlannerResponse::Error { message: e.to_string() }, false),
        },

        PlannerMessage::Metrics => (
            PlannerResponse::Metrics {
                metrics: service.metrics(),
            },
            false,
        ),

        PlannerMessage::Ping => (
            PlannerResponse::Pong {
                version: VERSION.to_string(),
            },
            false,
        ),

        PlannerMessage::Shutdown => (PlannerResponse::Ok, true),
    }
}

/// Read a single newline-terminated message from the stream
pub async fn read_message(stream: &mut UnixStream) -> Result<PlannerMessage> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    let bytes_read = reader
        .read_line(&mut line)
        .await
        .context("Failed to read IPC message")?;

    if bytes_read > MAX_MESSAGE_SIZE {
        return Err(eyre::eyre!("Message too large: {} bytes", bytes_read));
    }

    if line.is_empty() {
        return Err(eyre::eyre!("Empty message received"));
    }

    let msg: PlannerMessage = serde_json::from_str(line.trim()).context("Failed to parse IPC message")?;
    Ok(msg)
}

/// Send a response on the stream
pub async fn send_response(stream: &mut UnixStream, response: PlannerResponse) -> Result<()> {
    let response_json = serde_json::to_string(&response).context("Failed to serialize response")?;
    stream
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush response")?;
    Ok(())
}
