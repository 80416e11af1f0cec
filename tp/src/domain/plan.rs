//! TripPlan domain type
//!
//! The terminal artifact of a completed session: the trip spec, every
//! stage result, and the derived totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Stage, StageResult, TripSpec};

/// Failures while assembling a plan from stage results
///
/// Both variants indicate a broken stage contract: either the pipeline
/// finished without producing a stage's result, or the budget stage
/// payload lacks the summary it is required to publish.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("stage result missing from completed pipeline: {0}")]
    MissingStage(Stage),

    #[error("budget summary missing or malformed: {0}")]
    MalformedSummary(&'static str),
}

/// Final aggregated output of a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPlan {
    pub spec: TripSpec,
    pub stage_results: Vec<StageResult>,
    /// Trip length in whole days
    pub duration: i64,
    /// Canonical total: the budget stage's summed stage costs
    pub total_cost: f64,
    pub budget_remaining: f64,
    pub completed_at: DateTime<Utc>,
}

impl TripPlan {
    /// Assemble the plan from a finished pipeline
    ///
    /// Requires all five stage results. The totals come from the budget
    /// stage's `summary` record, which its provider guarantees for both
    /// live and synthetic payloads; anything else is a contract breach.
    pub fn assemble(
        spec: &TripSpec,
        results: &[StageResult],
        completed_at: DateTime<Utc>,
    ) -> Result<Self, PlanError> {
        for stage in Stage::PIPELINE {
            if !results.iter().any(|r| r.stage == stage) {
                return Err(PlanError::MissingStage(stage));
            }
        }

        let budget = results
            .iter()
            .find(|r| r.stage == Stage::Budget)
            .ok_or(PlanError::MissingStage(Stage::Budget))?;
        let summary = budget
            .payload
            .get("summary")
            .ok_or(PlanError::MalformedSummary("summary"))?;
        let total_cost = summary
            .get("total_cost")
            .and_then(|v| v.as_f64())
            .ok_or(PlanError::MalformedSummary("summary.total_cost"))?;
        let budget_remaining = summary
            .get("remaining")
            .and_then(|v| v.as_f64())
            .ok_or(PlanError::MalformedSummary("summary.remaining"))?;

        Ok(Self {
            spec: spec.clone(),
            stage_results: results.to_vec(),
            duration: spec.duration_days(),
            total_cost,
            budget_remaining,
            completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PreferenceSet;
    use chrono::NaiveDate;
    use serde_json::json;

    fn test_spec() -> TripSpec {
        TripSpec {
            destination: "Paris".to_string(),
            origin: None,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            travelers: 2,
            budget: 1500.0,
            preferences: PreferenceSet::default(),
        }
    }

    fn full_results() -> Vec<StageResult> {
        Stage::PIPELINE
            .iter()
            .map(|&stage| {
                let payload = if stage == Stage::Budget {
                    json!({"summary": {"total_cost": 1234.5, "remaining": 265.5}})
                } else {
                    json!({})
                };
                StageResult::synthetic(stage, payload)
            })
            .collect()
    }

    #[test]
    fn test_assemble_reads_budget_summary() {
        let spec = test_spec();
        let plan = TripPlan::assemble(&spec, &full_results(), Utc::now()).unwrap();
        assert_eq!(plan.duration, 3);
        assert_eq!(plan.total_cost, 1234.5);
        assert_eq!(plan.budget_remaining, 265.5);
        assert_eq!(plan.stage_results.len(), 5);
    }

    #[test]
    fn test_assemble_missing_stage() {
        let spec = test_spec();
        let results: Vec<StageResult> = full_results()
            .into_iter()
            .filter(|r| r.stage != Stage::Hotel)
            .collect();
        assert_eq!(
            TripPlan::assemble(&spec, &results, Utc::now()),
            Err(PlanError::MissingStage(Stage::Hotel))
        );
    }

    #[test]
    fn test_assemble_malformed_summary() {
        let spec = test_spec();
        let mut results = full_results();
        for result in &mut results {
            if result.stage == Stage::Budget {
                result.payload = json!({"summary": {"total_cost": "oops"}});
            }
        }
        assert_eq!(
            TripPlan::assemble(&spec, &results, Utc::now()),
            Err(PlanError::MalformedSummary("summary.total_cost"))
        );
    }
}
