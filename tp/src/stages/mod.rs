//! Stage providers
//!
//! Each pipeline stage implements the single [`StageProvider`] capability:
//! `run(input) -> StageResult`. Providers that consult an external data
//! source honor the graceful-degradation contract: any live-call failure
//! is logged and replaced by a synthetic payload with the same field
//! shape, so the orchestrator never sees an external error. The only
//! error a provider raises is a broken input contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProvidersConfig;
use crate::domain::{Stage, StageResult};

mod budget;
mod context;
mod error;
mod flight;
mod hotel;
mod itinerary;
mod recommendation;

pub use budget::BudgetAnalyzer;
pub use context::StageInput;
pub use error::{ProviderCallError, StageError};
pub use flight::FlightProvider;
pub use hotel::HotelProvider;
pub use itinerary::ItineraryBuilder;
pub use recommendation::RecommendationProvider;

/// Capability interface implemented by every stage
#[async_trait]
pub trait StageProvider: Send + Sync {
    /// Which pipeline stage this provider implements
    fn stage(&self) -> Stage;

    /// Produce this stage's result
    ///
    /// Never fails for external reasons; the only error is structurally
    /// invalid input (a violated dependency contract).
    async fn run(&self, input: &StageInput) -> Result<StageResult, StageError>;
}

/// The full set of providers the orchestrator drives
#[derive(Clone)]
pub struct ProviderSet {
    recommendation: Arc<dyn StageProvider>,
    flight: Arc<dyn StageProvider>,
    hotel: Arc<dyn StageProvider>,
    itinerary: Arc<dyn StageProvider>,
    budget: Arc<dyn StageProvider>,
}

impl ProviderSet {
    /// Build the production providers from configuration
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ProviderCallError> {
        Ok(Self::new(
            Arc::new(RecommendationProvider::new(&config.places)?),
            Arc::new(FlightProvider::new(&config.flight)?),
            Arc::new(HotelProvider::new(&config.places)?),
            Arc::new(ItineraryBuilder::new()),
            Arc::new(BudgetAnalyzer::new()),
        ))
    }

    /// Assemble a set from individual providers (tests swap stubs in here)
    pub fn new(
        recommendation: Arc<dyn StageProvider>,
        flight: Arc<dyn StageProvider>,
        hotel: Arc<dyn StageProvider>,
        itinerary: Arc<dyn StageProvider>,
        budget: Arc<dyn StageProvider>,
    ) -> Self {
        Self {
            recommendation,
            flight,
            hotel,
            itinerary,
            budget,
        }
    }

    pub fn get(&self, stage: Stage) -> &Arc<dyn StageProvider> {
        match stage {
            Stage::Recommendation => &self.recommendation,
            Stage::Flight => &self.flight,
            Stage::Hotel => &self.hotel,
            Stage::Itinerary => &self.itinerary,
            Stage::Budget => &self.budget,
        }
    }
}
