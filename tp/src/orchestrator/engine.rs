//! PlanEngine - runs the stage pipeline for one session
//!
//! Claims the session exactly once, executes stages in dependency order
//! (flight and hotel concurrently), records each result before the next
//! stage starts, and ends the session in exactly one terminal state.
//! External-source failures never reach this layer; the only failures it
//! handles are broken stage contracts, the session deadline, cooperative
//! cancellation, and store malfunctions.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{ErrorRecord, PlanError, Stage, TripPlan};
use crate::stages::{ProviderSet, StageInput};
use crate::state::{SessionError, SessionStore};

/// Outcome of one engine run
#[derive(Debug)]
pub enum EngineOutcome {
    /// Session finished with a plan
    Completed { session_id: Uuid },
    /// Session ended in the failed state
    Failed { session_id: Uuid, error: ErrorRecord },
    /// Session was already claimed (or gone); nothing ran
    Skipped { session_id: Uuid },
}

/// Engine for one session
pub struct PlanEngine {
    session_id: Uuid,
    store: SessionStore,
    providers: ProviderSet,
    deadline: Duration,
}

impl PlanEngine {
    pub fn new(session_id: Uuid, store: SessionStore, providers: ProviderSet, deadline: Duration) -> Self {
        Self {
            session_id,
            store,
            providers,
            deadline,
        }
    }

    /// Run the session to a terminal state
    pub async fn run(self) -> EngineOutcome {
        debug!(session_id = %self.session_id, "run: called");

        match self.store.claim(&self.session_id) {
            Ok(true) => {}
            Ok(false) => {
                debug!(session_id = %self.session_id, "run: already claimed or terminal, skipping");
                return EngineOutcome::Skipped {
                    session_id: self.session_id,
                };
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "run: claim failed");
                return EngineOutcome::Skipped {
                    session_id: self.session_id,
                };
            }
        }
        info!(session_id = %self.session_id, "Session claimed, starting pipeline");

        let error = match tokio::time::timeout(self.deadline, self.run_pipeline()).await {
            Ok(Ok(())) => match self.assemble_and_complete() {
                Ok(()) => {
                    info!(session_id = %self.session_id, "Session completed");
                    return EngineOutcome::Completed {
                        session_id: self.session_id,
                    };
                }
                Err(record) => record,
            },
            Ok(Err(record)) => record,
            Err(_) => ErrorRecord::timeout(format!(
                "session exceeded its {}s deadline",
                self.deadline.as_secs()
            )),
        };

        error!(
            session_id = %self.session_id,
            kind = %error.kind,
            message = %error.message,
            "Session failed"
        );
        if let Err(e) = self.store.fail(&self.session_id, error.clone()) {
            warn!(session_id = %self.session_id, error = %e, "run: could not record failure");
        }
        EngineOutcome::Failed {
            session_id: self.session_id,
            error,
        }
    }

    async fn run_pipeline(&self) -> Result<(), ErrorRecord> {
        self.check_cancel()?;
        self.execute_stage(Stage::Recommendation).await?;

        self.check_cancel()?;
        // Flight and hotel read only the trip spec, so they may run
        // concurrently. This is the pipeline's only parallelism.
        let (flight, hotel) = tokio::join!(
            self.execute_stage(Stage::Flight),
            self.execute_stage(Stage::Hotel),
        );
        flight?;
        hotel?;

        self.check_cancel()?;
        self.execute_stage(Stage::Itinerary).await?;

        self.check_cancel()?;
        self.execute_stage(Stage::Budget).await?;

        Ok(())
    }

    async fn execute_stage(&self, stage: Stage) -> Result<(), ErrorRecord> {
        debug!(session_id = %self.session_id, %stage, "execute_stage: called");
        self.store
            .begin_stage(&self.session_id, stage)
            .map_err(store_failure)?;

        let session = self.store.get(&self.session_id).map_err(store_failure)?;
        let input = StageInput::new(session.spec, session.stage_results);

        match self.providers.get(stage).run(&input).await {
            Ok(result) => {
                // The result lands in the store before the next stage
                // starts, so a concurrent status read never observes a
                // running session missing a finished stage's output.
                self.store
                    .record_stage(&self.session_id, result)
                    .map_err(store_failure)?;
                info!(session_id = %self.session_id, %stage, "Stage complete");
                Ok(())
            }
            Err(e) => Err(ErrorRecord::contract(stage, e.to_string())),
        }
    }

    fn check_cancel(&self) -> Result<(), ErrorRecord> {
        match self.store.is_cancel_requested(&self.session_id) {
            Ok(false) => Ok(()),
            Ok(true) => {
                debug!(session_id = %self.session_id, "check_cancel: cancellation requested");
                Err(ErrorRecord::cancelled("cancellation requested between stages"))
            }
            Err(e) => Err(store_failure(e)),
        }
    }

    fn assemble_and_complete(&self) -> Result<(), ErrorRecord> {
        let session = self.store.get(&self.session_id).map_err(store_failure)?;
        let plan = TripPlan::assemble(&session.spec, &session.stage_results, Utc::now())
            .map_err(|e| match e {
                PlanError::MissingStage(stage) => ErrorRecord::contract(stage, e.to_string()),
                PlanError::MalformedSummary(_) => ErrorRecord::contract(Stage::Budget, e.to_string()),
            })?;

        if !self.store.complete(&self.session_id, plan).map_err(store_failure)? {
            // Terminal already; nothing to do but keep the invariant
            warn!(session_id = %self.session_id, "assemble_and_complete: session no longer running");
        }
        Ok(())
    }
}

fn store_failure(err: SessionError) -> ErrorRecord {
    ErrorRecord::internal(err.to_string())
}
