//! Stage input context
//!
//! What a provider sees: the trip spec plus every stage result recorded
//! so far. Dependency validation lives here as a plain reusable check
//! rather than behavior inherited from some provider base.

use serde_json::Value;

use crate::domain::{Stage, StageResult, TripSpec};

use super::StageError;

/// Input handed to a stage provider
#[derive(Debug, Clone)]
pub struct StageInput {
    pub spec: TripSpec,
    prior: Vec<StageResult>,
}

impl StageInput {
    pub fn new(spec: TripSpec, prior: Vec<StageResult>) -> Self {
        Self { spec, prior }
    }

    /// Look up a prior stage's result, if recorded
    pub fn result(&self, stage: Stage) -> Option<&StageResult> {
        self.prior.iter().find(|r| r.stage == stage)
    }

    /// Fetch a dependency payload that the stage contract guarantees
    ///
    /// A miss means the orchestrator invoked this provider out of order,
    /// which is a hard, non-retryable failure.
    pub fn require(&self, stage: Stage) -> Result<&Value, StageError> {
        self.result(stage)
            .map(|r| &r.payload)
            .ok_or(StageError::MissingDependency(stage))
    }
}
