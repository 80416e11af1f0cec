//! Stage provider errors

use thiserror::Error;

use crate::domain::Stage;

/// Hard failures a provider may raise past its boundary
///
/// Only structurally invalid input qualifies: a dependency result that
/// should already exist, or one whose payload breaks its declared shape.
/// Either means the orchestration itself is buggy, so the orchestrator
/// treats these as non-retryable. External-source failures never appear
/// here; they are absorbed inside the provider by the degradation
/// contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("missing dependency result: {0}")]
    MissingDependency(Stage),

    #[error("malformed {stage} payload: {detail}")]
    MalformedDependency { stage: Stage, detail: String },
}

/// Failures of a live external call
///
/// Internal to a provider: every variant is recovered by falling back to
/// synthetic data, logged at warn level, and never escapes `run`.
#[derive(Debug, Error)]
pub enum ProviderCallError {
    #[error("credentials not configured: {0} is unset")]
    MissingCredentials(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("unexpected upstream payload: {0}")]
    UnexpectedPayload(String),
}
