//! Session state management
//!
//! [`SessionStore`] wraps the generic keyed store with the session
//! domain's operations. It is the single source of truth for session
//! progress: the orchestrator and the status path both go through it,
//! and every mutation is an atomic closure under the session's own lock,
//! so a status poll racing a stage write can never observe a torn
//! session or lose an update.

use serde::{Deserialize, Serialize};
use sessionstore::{Store, StoreError};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    ErrorRecord, Session, SessionStatus, SessionView, Stage, StageResult, TripPlan, TripSpec,
};

/// Errors from session store operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(Uuid),

    #[error("session id collision: {0}")]
    Duplicate(Uuid),

    #[error("session store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Duplicate(id) => Self::Duplicate(id),
            StoreError::Poisoned => Self::Poisoned,
        }
    }
}

/// Session counts by status
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerMetrics {
    pub total_sessions: u64,
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Handle to the shared session registry
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Store<Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Store::new(),
        }
    }

    /// Create a new queued session for a normalized spec
    pub fn create(&self, spec: TripSpec) -> Result<Uuid, SessionError> {
        let session = Session::new(spec);
        debug!(session_id = %session.id, destination = %session.spec.destination, "SessionStore::create: called");
        Ok(self.sessions.insert(session)?)
    }

    /// Snapshot a session
    pub fn get(&self, id: &Uuid) -> Result<Session, SessionError> {
        Ok(self.sessions.get(id)?)
    }

    /// Project a session into its polling view
    pub fn view(&self, id: &Uuid) -> Result<SessionView, SessionError> {
        Ok(self.sessions.get(id)?.view())
    }

    /// Single-claim transition queued -> running
    ///
    /// Returns true for exactly one caller; a session can never be picked
    /// up by two workers.
    pub fn claim(&self, id: &Uuid) -> Result<bool, SessionError> {
        debug!(session_id = %id, "SessionStore::claim: called");
        Ok(self.sessions.update(id, Session::claim)?)
    }

    /// Advance the current-stage marker
    pub fn begin_stage(&self, id: &Uuid, stage: Stage) -> Result<(), SessionError> {
        debug!(session_id = %id, %stage, "SessionStore::begin_stage: called");
        Ok(self.sessions.update(id, |s| s.begin_stage(stage))?)
    }

    /// Record a finished stage's result
    pub fn record_stage(&self, id: &Uuid, result: StageResult) -> Result<bool, SessionError> {
        debug!(session_id = %id, stage = %result.stage, "SessionStore::record_stage: called");
        Ok(self.sessions.update(id, |s| s.record_stage(result))?)
    }

    /// Terminal transition to completed, writing the plan atomically
    pub fn complete(&self, id: &Uuid, plan: TripPlan) -> Result<bool, SessionError> {
        debug!(session_id = %id, "SessionStore::complete: called");
        Ok(self.sessions.update(id, |s| s.complete(plan))?)
    }

    /// Terminal transition to failed, writing the error atomically
    pub fn fail(&self, id: &Uuid, error: ErrorRecord) -> Result<bool, SessionError> {
        debug!(session_id = %id, kind = %error.kind, "SessionStore::fail: called");
        Ok(self.sessions.update(id, |s| s.fail(error))?)
    }

    /// Set the cooperative cancellation flag
    pub fn request_cancel(&self, id: &Uuid) -> Result<(), SessionError> {
        debug!(session_id = %id, "SessionStore::request_cancel: called");
        Ok(self.sessions.update(id, Session::request_cancel)?)
    }

    /// Whether cancellation was requested for a session
    pub fn is_cancel_requested(&self, id: &Uuid) -> Result<bool, SessionError> {
        Ok(self.sessions.get(id)?.cancel_requested)
    }

    /// Aggregate session counts by status
    pub fn metrics(&self) -> PlannerMetrics {
        let mut metrics = PlannerMetrics::default();
        for id in self.sessions.ids() {
            let Ok(session) = self.sessions.get(&id) else {
                continue;
            };
            metrics.total_sessions += 1;
            match session.status {
                SessionStatus::Queued => metrics.queued += 1,
                SessionStatus::Running => metrics.running += 1,
                SessionStatus::Completed => metrics.completed += 1,
                SessionStatus::Failed => metrics.failed += 1,
            }
        }
        metrics
    }
}
