//! IPC message types for daemon communication
//!
//! Simple JSON-over-newline protocol. Each message is a single line of
//! JSON followed by `\n`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::SessionStatus;
use crate::domain::SessionView;
use crate::normalizer::{FieldError, RawTripRequest};
use crate::state::PlannerMetrics;

/// Messages from the CLI to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlannerMessage {
    /// Submit a raw trip request
    Submit { request: RawTripRequest },

    /// Query a session's status
    Status { session_id: Uuid },

    /// Request session counts by status
    Metrics,

    /// Check the daemon is alive
    Ping,

    /// Request graceful daemon shutdown
    Shutdown,
}

/// Responses from the daemon to the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlannerResponse {
    /// A session was created and scheduled
    Accepted { session_id: Uuid, status: SessionStatus },

    /// Validation failed; every bad field is listed and no session exists
    Invalid { fields: Vec<FieldError> },

    /// Current view of a session
    Session { view: SessionView },

    /// No session with that identifier
    NotFound { session_id: Uuid },

    /// Session counts by status
    Metrics { metrics: PlannerMetrics },

    /// Pong response to ping
    Pong { version: String },

    /// Acknowledgment
    Ok,

    /// Error response
    Error { message: String },
}
