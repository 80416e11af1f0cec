//! Tripdaemon - multi-stage trip planning daemon
//!
//! Plans a multi-day trip by running a fixed pipeline of stages
//! (recommendation, flight, hotel, itinerary, budget) against each
//! submitted request and assembling their outputs into a single trip
//! plan. A session records the progress of one request; clients poll it
//! until it reaches a terminal state.
//!
//! # Core properties
//!
//! - **Graceful degradation**: a stage whose external data source fails
//!   substitutes synthetic data of the same shape and the session still
//!   completes; degradation is a diagnostic, not an error.
//! - **Single claim**: every session is picked up by exactly one worker.
//! - **Per-session isolation**: sessions share only the session store,
//!   which synchronizes per key; a failure is fatal to its session only.
//!
//! # Modules
//!
//! - [`domain`] - TripSpec, Session, StageResult, TripPlan
//! - [`normalizer`] - raw request validation and canonicalization
//! - [`stages`] - stage providers and the degradation contract
//! - [`state`] - the session store
//! - [`orchestrator`] - the per-session engine and the worker pool
//! - [`service`] - the submission/status interface
//! - [`ipc`] - Unix-socket protocol between CLI and daemon
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod ipc;
pub mod normalizer;
pub mod orchestrator;
pub mod service;
pub mod stages;
pub mod state;

// Re-export commonly used types
pub use config::{Config, FlightApiConfig, IpcConfig, OrchestratorConfig, PlacesApiConfig, ProvidersConfig};
pub use domain::{
    AccommodationStyle, ActivityTag, DataSource, DiningPreference, ErrorKind, ErrorRecord, Pace,
    PlanError, PreferenceSet, Session, SessionStatus, SessionView, Stage, StageResult, TripPlan,
    TripSpec,
};
pub use ipc::{PlannerClient, PlannerMessage, PlannerResponse};
pub use normalizer::{normalize, FieldError, InvalidInput, RawPreferences, RawTripRequest};
pub use orchestrator::{EngineOutcome, OrchestratorHandle, PlanEngine, PlanManager, QueueClosed};
pub use service::{PlannerService, SubmitError, SubmitReceipt};
pub use stages::{
    BudgetAnalyzer, FlightProvider, HotelProvider, ItineraryBuilder, ProviderCallError,
    ProviderSet, RecommendationProvider, StageError, StageInput, StageProvider,
};
pub use state::{PlannerMetrics, SessionError, SessionStore};

/// Daemon version reported over IPC
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
