//! Submission / status interface
//!
//! [`PlannerService`] is the narrow front door of the planner: `submit`
//! validates, creates the session and enqueues it; `status` is the
//! synchronous, never-blocking polling path. Neither ever executes a
//! stage inline.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{ErrorRecord, SessionStatus, SessionView};
use crate::normalizer::{normalize, InvalidInput, RawTripRequest};
use crate::orchestrator::OrchestratorHandle;
use crate::state::{PlannerMetrics, SessionError, SessionStore};

/// Submission failures
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Validation failed; no session was created
    #[error(transparent)]
    Invalid(#[from] InvalidInput),

    /// The daemon is shutting down and accepts no new work
    #[error("planner is not accepting new sessions")]
    Unavailable,

    #[error(transparent)]
    Store(#[from] SessionError),
}

/// Synchronous answer to a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

/// The planner's submission and status surface
#[derive(Clone)]
pub struct PlannerService {
    store: SessionStore,
    orchestrator: OrchestratorHandle,
}

impl PlannerService {
    pub fn new(store: SessionStore, orchestrator: OrchestratorHandle) -> Self {
        Self { store, orchestrator }
    }

    /// Validate a raw request, create its session and schedule it
    ///
    /// On validation failure the error is returned immediately and no
    /// session exists afterwards. On success the session id comes back
    /// synchronously while orchestration proceeds in the background.
    pub async fn submit(&self, raw: &RawTripRequest) -> Result<SubmitReceipt, SubmitError> {
        debug!("submit: called");
        let spec = normalize(raw)?;
        let session_id = self.store.create(spec)?;

        if self.orchestrator.schedule(session_id).await.is_err() {
            warn!(%session_id, "submit: orchestrator queue closed, failing session");
            let _ = self
                .store
                .fail(&session_id, ErrorRecord::cancelled("daemon shutting down"));
            return Err(SubmitError::Unavailable);
        }

        info!(%session_id, "Accepted trip request");
        Ok(SubmitReceipt {
            session_id,
            status: SessionStatus::Queued,
        })
    }

    /// Current view of a session; never waits for orchestration
    pub fn status(&self, session_id: &Uuid) -> Result<SessionView, SessionError> {
        debug!(%session_id, "status: called");
        self.store.view(session_id)
    }

    /// Session counts by status
    pub fn metrics(&self) -> PlannerMetrics {
        self.store.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::domain::SessionStatus;
    use crate::normalizer::RawPreferences;
    use crate::orchestrator::PlanManager;
    use crate::stages::testing::stub_set;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn valid_request() -> RawTripRequest {
        RawTripRequest {
            destination: Some("Paris".to_string()),
            origin: None,
            start_date: Some("2024-06-01".to_string()),
            end_date: Some("2024-06-04".to_string()),
            budget: Some(1500.0),
            travelers: Some(2),
            preferences: Some(RawPreferences {
                activities: Some(vec!["culture".to_string(), "food".to_string()]),
                pace: Some("moderate".to_string()),
                ..Default::default()
            }),
        }
    }

    fn service_with_manager(
        store: SessionStore,
    ) -> (PlannerService, tokio::task::JoinHandle<()>, mpsc::Sender<()>) {
        let (manager, handle) =
            PlanManager::new(OrchestratorConfig::default(), store.clone(), stub_set());
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let manager_task = tokio::spawn(manager.run(shutdown_rx));
        (PlannerService::new(store, handle), manager_task, shutdown_tx)
    }

    #[tokio::test]
    async fn test_submit_then_poll_until_completed() {
        let store = SessionStore::new();
        let (service, manager_task, shutdown_tx) = service_with_manager(store.clone());

        let receipt = service.submit(&valid_request()).await.unwrap();
        assert_eq!(receipt.status, SessionStatus::Queued);

        // The status path answers immediately, without a plan yet
        let first = service.status(&receipt.session_id).unwrap();
        assert!(matches!(
            first.status,
            SessionStatus::Queued | SessionStatus::Running | SessionStatus::Completed
        ));

        let mut terminal = None;
        for _ in 0..100 {
            let view = service.status(&receipt.session_id).unwrap();
            if matches!(view.status, SessionStatus::Completed | SessionStatus::Failed) {
                terminal = Some(view);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let view = terminal.expect("session never became terminal");
        assert_eq!(view.status, SessionStatus::Completed);
        let plan = view.trip_plan.unwrap();
        assert_eq!(plan.stage_results.len(), 5);
        assert_eq!(plan.duration, 3);
        assert!(plan.total_cost >= 0.0);

        shutdown_tx.send(()).await.unwrap();
        manager_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_submission_creates_no_session() {
        let store = SessionStore::new();
        let (service, manager_task, shutdown_tx) = service_with_manager(store.clone());

        let mut raw = valid_request();
        raw.destination = None;
        raw.budget = None;

        let err = service.submit(&raw).await.unwrap_err();
        let SubmitError::Invalid(invalid) = err else {
            panic!("expected InvalidInput");
        };
        let fields: Vec<&str> = invalid.fields.iter().map(|f| f.field.as_str()).collect();
        assert!(fields.contains(&"destination"));
        assert!(fields.contains(&"budget"));

        // No session was created
        assert_eq!(service.metrics().total_sessions, 0);
        let phantom = Uuid::now_v7();
        assert_eq!(
            service.status(&phantom).unwrap_err(),
            SessionError::NotFound(phantom)
        );

        shutdown_tx.send(()).await.unwrap();
        manager_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_unavailable() {
        let store = SessionStore::new();
        let (service, manager_task, shutdown_tx) = service_with_manager(store.clone());

        shutdown_tx.send(()).await.unwrap();
        manager_task.await.unwrap();

        let err = service.submit(&valid_request()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Unavailable));

        // The orphaned session was failed, not left queued
        let metrics = service.metrics();
        assert_eq!(metrics.failed, metrics.total_sessions);
        assert_eq!(metrics.failed, 1);
    }
}
