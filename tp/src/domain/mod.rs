//! Domain types for tripdaemon
//!
//! Core domain types: TripSpec, Session, StageResult, TripPlan.
//! Session implements the sessionstore Record trait so the store can key
//! it by id.

mod plan;
mod session;
mod spec;

pub use plan::{PlanError, TripPlan};
pub use session::{
    DataSource, ErrorKind, ErrorRecord, Session, SessionStatus, SessionView, Stage, StageResult,
};
pub use spec::{AccommodationStyle, ActivityTag, DiningPreference, Pace, PreferenceSet, TripSpec};

// Re-export sessionstore types for convenience
pub use sessionstore::{Record, Store, StoreError};
