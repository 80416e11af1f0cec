//! Recommendation stage
//!
//! Looks up activities for each requested activity tag via a places
//! text-search, with cost estimates derived from the tag and dining
//! preference. Falls back to template-based synthetic recommendations
//! with the same payload shape.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::PlacesApiConfig;
use crate::domain::{ActivityTag, DiningPreference, Stage, StageResult, TripSpec};

use super::{ProviderCallError, StageError, StageInput, StageProvider};

/// Recommendations kept per activity category
const PER_CATEGORY: usize = 5;

/// Recommendation provider
pub struct RecommendationProvider {
    http: Client,
    api_key_env: String,
    base_url: String,
}

impl RecommendationProvider {
    pub fn new(config: &PlacesApiConfig) -> Result<Self, ProviderCallError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            api_key_env: config.api_key_env.clone(),
            base_url: config.base_url.clone(),
        })
    }

    async fn live_recommendations(&self, spec: &TripSpec) -> Result<Value, ProviderCallError> {
        debug!(destination = %spec.destination, "live_recommendations: called");
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderCallError::MissingCredentials(self.api_key_env.clone()))?;

        let mut categories = Map::new();
        for &tag in &spec.preferences.activities {
            let places = self.search_places(&api_key, tag, &spec.destination).await?;
            let entries = places_to_entries(&places, tag, spec);
            categories.insert(tag.as_str().to_string(), Value::Array(entries));
        }

        Ok(build_payload(spec, categories))
    }

    async fn search_places(
        &self,
        api_key: &str,
        tag: ActivityTag,
        destination: &str,
    ) -> Result<Vec<Value>, ProviderCallError> {
        let url = format!("{}/textsearch/json", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", format!("{tag} in {destination}")),
                ("key", api_key.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderCallError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        body.get("results")
            .and_then(|v| v.as_array())
            .cloned()
            .ok_or_else(|| ProviderCallError::UnexpectedPayload("results missing".to_string()))
    }

    /// Template-based recommendations with the same shape as live ones
    fn synthetic(&self, spec: &TripSpec) -> Value {
        let mut rng = rand::rng();
        let mut categories = Map::new();

        for &tag in &spec.preferences.activities {
            let entries: Vec<Value> = activity_templates(tag, &spec.destination)
                .into_iter()
                .take(PER_CATEGORY)
                .map(|name| {
                    let (low, high) = cost_range(tag, spec.preferences.dining_preference);
                    entry(
                        &name,
                        tag,
                        rng.random_range(low..high),
                        rng.random_range(1..=3),
                        round1(rng.random_range(4.0..5.0)),
                        &format!("Experience {} in {}", tag, spec.destination),
                    )
                })
                .collect();
            categories.insert(tag.as_str().to_string(), Value::Array(entries));
        }

        build_payload(spec, categories)
    }
}

#[async_trait]
impl StageProvider for RecommendationProvider {
    fn stage(&self) -> Stage {
        Stage::Recommendation
    }

    async fn run(&self, input: &StageInput) -> Result<StageResult, StageError> {
        let spec = &input.spec;
        match self.live_recommendations(spec).await {
            Ok(payload) => Ok(StageResult::live(Stage::Recommendation, payload)),
            Err(e) => {
                warn!(error = %e, destination = %spec.destination, "recommendation lookup degraded to synthetic data");
                Ok(StageResult::synthetic(Stage::Recommendation, self.synthetic(spec)))
            }
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Cost band per activity tag, adjusted by dining preference for food
fn cost_range(tag: ActivityTag, dining: DiningPreference) -> (f64, f64) {
    match tag {
        ActivityTag::Culture => (10.0, 30.0),
        ActivityTag::Adventure => (50.0, 150.0),
        ActivityTag::Relaxation => (20.0, 100.0),
        ActivityTag::Food => {
            let factor = match dining {
                DiningPreference::FineDining => 1.5,
                DiningPreference::StreetFood => 0.7,
                _ => 1.0,
            };
            (30.0 * factor, 80.0 * factor)
        }
        ActivityTag::Shopping => (20.0, 100.0),
        ActivityTag::Nature => (10.0, 40.0),
    }
}

fn entry(name: &str, tag: ActivityTag, cost: f64, hours: u32, rating: f64, description: &str) -> Value {
    json!({
        "name": name,
        "type": tag.as_str(),
        "estimated_cost": cost,
        "duration": format!("{hours}h"),
        "rating": rating,
        "description": description,
        "tips": tip_for(tag),
    })
}

fn tip_for(tag: ActivityTag) -> &'static str {
    match tag {
        ActivityTag::Culture => "Best visited in the morning to avoid crowds",
        ActivityTag::Adventure => "Book in advance and check weather conditions",
        ActivityTag::Relaxation => "Best enjoyed during quieter hours",
        ActivityTag::Food => "Reservations recommended for popular spots",
        ActivityTag::Shopping => "Bargaining is common in local markets",
        ActivityTag::Nature => "Best visited early morning or late afternoon",
    }
}

fn places_to_entries(places: &[Value], tag: ActivityTag, spec: &TripSpec) -> Vec<Value> {
    let mut rng = rand::rng();
    places
        .iter()
        .take(PER_CATEGORY)
        .filter_map(|place| {
            let name = place.get("name")?.as_str()?;
            let rating = place.get("rating").and_then(|v| v.as_f64()).unwrap_or(4.0);
            let (low, high) = cost_range(tag, spec.preferences.dining_preference);
            let description = place
                .get("formatted_address")
                .and_then(|v| v.as_str())
                .unwrap_or(&spec.destination)
                .to_string();
            Some(entry(
                name,
                tag,
                rng.random_range(low..high),
                rng.random_range(1..=3),
                rating,
                &description,
            ))
        })
        .collect()
}

fn activity_templates(tag: ActivityTag, destination: &str) -> Vec<String> {
    match tag {
        ActivityTag::Culture => vec![
            format!("Visit the {destination} Museum of Art"),
            format!("Explore the {destination} Historical District"),
            format!("Tour the {destination} Cathedral"),
            format!("Visit the {destination} Cultural Center"),
            format!("Attend a performance at {destination} Opera House"),
            format!("Visit the {destination} National Gallery"),
        ],
        ActivityTag::Adventure => vec![
            format!("Go hiking in {destination} National Park"),
            format!("Try rock climbing at {destination} Cliffs"),
            format!("Go kayaking on {destination} River"),
            format!("Take a zip-lining tour in {destination}"),
            format!("Go mountain biking in {destination}"),
        ],
        ActivityTag::Relaxation => vec![
            format!("Visit {destination} Botanical Gardens"),
            format!("Relax at {destination} Spa Resort"),
            format!("Walk along {destination} Beach"),
            format!("Take a yoga class in {destination}"),
            format!("Enjoy a sunset cruise from {destination}"),
        ],
        ActivityTag::Food => vec![
            format!("Take a food tour of {destination}"),
            format!("Visit {destination} Food Market"),
            format!("Try traditional {destination} cuisine"),
            format!("Take a cooking class in {destination}"),
            format!("Go wine tasting in {destination}"),
        ],
        ActivityTag::Shopping => vec![
            format!("Visit {destination} Central Market"),
            format!("Explore {destination} Shopping District"),
            format!("Shop at {destination} Craft Market"),
            format!("Explore {destination} Boutique District"),
            format!("Visit {destination} Artisan Market"),
        ],
        ActivityTag::Nature => vec![
            format!("Visit {destination} National Park"),
            format!("Explore {destination} Wildlife Reserve"),
            format!("Take a nature walk in {destination}"),
            format!("Go bird watching in {destination}"),
            format!("Visit {destination} Nature Center"),
        ],
    }
}

fn build_payload(spec: &TripSpec, categories: Map<String, Value>) -> Value {
    let total: usize = categories
        .values()
        .filter_map(|v| v.as_array())
        .map(Vec::len)
        .sum();

    json!({
        "destination": spec.destination,
        "activity_recommendations": categories,
        "general_recommendations": [
            {
                "name": format!("Best time to visit {}", spec.destination),
                "description": "Spring and fall offer the best weather and fewer crowds",
                "type": "general",
            },
            {
                "name": format!("Getting around {}", spec.destination),
                "description": "Public transportation is efficient and affordable",
                "type": "general",
            },
            {
                "name": format!("Local customs in {}", spec.destination),
                "description": "Learn a few basic phrases in the local language",
                "type": "general",
            },
        ],
        "budget_considerations": [
            {
                "name": "Budget tips",
                "description": format!(
                    "With a budget of ${:.0}, consider mixing free and paid activities",
                    spec.budget
                ),
                "type": "budget",
            },
        ],
        "total_recommendations": total,
    })
}
