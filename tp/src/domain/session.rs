//! Session domain type
//!
//! Tracks the runtime state of one trip-planning request from submission
//! to its terminal state. The session store owns every Session; the
//! orchestrator only ever mutates one through the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sessionstore::Record;
use tracing::debug;
use uuid::Uuid;

use super::{TripPlan, TripSpec};

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, waiting for a worker to pick it up
    Queued,
    /// A worker is driving the stage pipeline
    Running,
    /// All stages finished and a TripPlan was assembled
    Completed,
    /// A hard failure ended the session
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One unit of the planning pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Recommendation,
    Flight,
    Hotel,
    Itinerary,
    Budget,
}

impl Stage {
    /// Canonical execution order
    pub const PIPELINE: [Stage; 5] = [
        Stage::Recommendation,
        Stage::Flight,
        Stage::Hotel,
        Stage::Itinerary,
        Stage::Budget,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recommendation => "recommendation",
            Self::Flight => "flight",
            Self::Hotel => "hotel",
            Self::Itinerary => "itinerary",
            Self::Budget => "budget",
        }
    }

    /// Stages whose results must exist before this stage may run
    ///
    /// Recommendation, flight and hotel read only the TripSpec, so they
    /// have no stage dependencies and flight/hotel may run concurrently.
    pub fn dependencies(self) -> &'static [Stage] {
        match self {
            Self::Recommendation | Self::Flight | Self::Hotel => &[],
            Self::Itinerary => &[Stage::Recommendation, Stage::Flight, Stage::Hotel],
            Self::Budget => &[Stage::Flight, Stage::Hotel, Stage::Itinerary],
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a stage result came from a live source or the synthetic fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Synthetic,
}

/// Opaque structured payload produced by one stage provider
///
/// The orchestrator never interprets `payload`; it only records it and
/// hands it to later stages per the dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub source: DataSource,
    pub payload: Value,
    pub completed_at: DateTime<Utc>,
}

impl StageResult {
    pub fn live(stage: Stage, payload: Value) -> Self {
        Self {
            stage,
            source: DataSource::Live,
            payload,
            completed_at: Utc::now(),
        }
    }

    pub fn synthetic(stage: Stage, payload: Value) -> Self {
        Self {
            stage,
            source: DataSource::Synthetic,
            payload,
            completed_at: Utc::now(),
        }
    }
}

/// Classification of session failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A stage was invoked against its declared dependency contract.
    /// This is an orchestration bug, not user error.
    StageContractViolation,
    /// The session exceeded its wall-clock deadline
    Timeout,
    /// The session was interrupted before completion
    Cancelled,
    /// Store malfunction or worker panic
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StageContractViolation => write!(f, "stage_contract_violation"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Error stored on a failed session and returned to polling clients
///
/// The message is human-readable. Raw upstream error bodies and
/// backtraces never end up here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub message: String,
}

impl ErrorRecord {
    pub fn contract(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::StageContractViolation,
            stage: Some(stage),
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            stage: None,
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            stage: None,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            stage: None,
            message: message.into(),
        }
    }
}

/// The mutable record of one trip-planning request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier, generated at creation (UUID v7, time-ordered;
    /// never reused within the process lifetime)
    pub id: Uuid,

    /// Current status
    pub status: SessionStatus,

    /// The normalized request this session is planning
    pub spec: TripSpec,

    /// Progress marker while running; reporting only, not a state
    pub current_stage: Option<Stage>,

    /// Results recorded so far, in execution order
    pub stage_results: Vec<StageResult>,

    /// Terminal artifact, present iff completed
    pub plan: Option<TripPlan>,

    /// Terminal error, present iff failed
    pub error: Option<ErrorRecord>,

    /// Cooperative cancellation flag, checked by the worker between stages
    pub cancel_requested: bool,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new queued session for a spec
    pub fn new(spec: TripSpec) -> Self {
        Self {
            id: Uuid::now_v7(),
            status: SessionStatus::Queued,
            spec,
            current_stage: None,
            stage_results: Vec::new(),
            plan: None,
            error: None,
            cancel_requested: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Whether the session reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Claim the session for a worker: queued -> running
    ///
    /// Returns true exactly once. A session that was already claimed (or
    /// already finished) returns false, so a worker can never pick it up
    /// twice.
    pub fn claim(&mut self) -> bool {
        debug!(%self.id, ?self.status, "Session::claim: called");
        if self.status == SessionStatus::Queued {
            self.status = SessionStatus::Running;
            self.started_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Advance the progress marker to the stage about to run
    pub fn begin_stage(&mut self, stage: Stage) {
        if self.status == SessionStatus::Running {
            self.current_stage = Some(stage);
        }
    }

    /// Record a finished stage's result
    ///
    /// Returns false (and records nothing) when the session is not
    /// running or the stage was already recorded.
    pub fn record_stage(&mut self, result: StageResult) -> bool {
        debug!(%self.id, stage = %result.stage, source = ?result.source, "Session::record_stage: called");
        if self.status != SessionStatus::Running {
            return false;
        }
        if self.stage_results.iter().any(|r| r.stage == result.stage) {
            return false;
        }
        self.stage_results.push(result);
        true
    }

    /// Terminal transition: running -> completed with the assembled plan
    pub fn complete(&mut self, plan: TripPlan) -> bool {
        debug!(%self.id, ?self.status, "Session::complete: called");
        if self.status != SessionStatus::Running {
            return false;
        }
        self.status = SessionStatus::Completed;
        self.current_stage = None;
        self.plan = Some(plan);
        self.error = None;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Terminal transition: queued|running -> failed with an error record
    pub fn fail(&mut self, error: ErrorRecord) -> bool {
        debug!(%self.id, ?self.status, kind = %error.kind, "Session::fail: called");
        if self.is_terminal() {
            return false;
        }
        self.status = SessionStatus::Failed;
        self.current_stage = None;
        self.error = Some(error);
        self.plan = None;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Ask the worker to stop between stages
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Look up a recorded stage result
    pub fn stage_result(&self, stage: Stage) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage == stage)
    }

    /// Project the session into its polling view
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            status: self.status,
            current_stage: if self.status == SessionStatus::Running {
                self.current_stage
            } else {
                None
            },
            stage_results: if self.status == SessionStatus::Running && !self.stage_results.is_empty()
            {
                Some(self.stage_results.clone())
            } else {
                None
            },
            trip_plan: self.plan.clone(),
            error: self.error.clone(),
        }
    }
}

impl Record for Session {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// What a polling client sees
///
/// Fields that do not apply to the current status are omitted from the
/// serialized form entirely: a queued session has neither results nor a
/// plan, a completed one carries the plan, a failed one the error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_results: Option<Vec<StageResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_plan: Option<TripPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}
