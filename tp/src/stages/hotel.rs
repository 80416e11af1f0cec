//! Hotel search stage
//!
//! Queries a places text-search API for lodging, scores candidates
//! against the traveler's accommodation style and rating, and keeps the
//! options that fit the accommodation share of the budget. Falls back to
//! synthetic hotels shaped like the live results.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::PlacesApiConfig;
use crate::domain::{AccommodationStyle, Stage, StageResult, TripSpec};

use super::{ProviderCallError, StageError, StageInput, StageProvider};

/// Share of the total budget assumed available for accommodation
const BUDGET_SHARE: f64 = 0.4;

const AMENITIES: [&str; 6] = ["WiFi", "Pool", "Gym", "Restaurant", "Spa", "Parking"];

/// Hotel search provider
pub struct HotelProvider {
    http: Client,
    api_key_env: String,
    base_url: String,
}

impl HotelProvider {
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

    async fn live_search(&self, spec: &TripSpec) -> Result<Value, ProviderCallError> {
        debug!(destination = %spec.destination, "live_search: called");
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderCallError::MissingCredentials(self.api_key_env.clone()))?;

        let url = format!("{}/textsearch/json", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", format!("hotels in {}", spec.destination)),
                ("type", "lodging".to_string()),
                ("key", api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderCallError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        let places = body
            .get("results")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderCallError::UnexpectedPayload("results missing".to_string()))?;

        let nights = spec.duration_days().max(1) as f64;
        let mut hotels: Vec<Value> = places.iter().filter_map(|p| live_hotel(p, spec, nights)).collect();
        rank_and_filter(&mut hotels, spec.budget);

        Ok(build_payload(spec, hotels))
    }

    /// Synthetic hotels with the same shape as scored live results
    fn synthetic(&self, spec: &TripSpec) -> Value {
        let mut rng = rand::rng();
        let nights = spec.duration_days().max(1) as f64;
        let travelers = f64::from(spec.travelers);

        let names = [
            format!("Grand {} Hotel", spec.destination),
            format!("{} Plaza Hotel", spec.destination),
            format!("Comfort Inn {}", spec.destination),
            format!("{} Boutique Hotel", spec.destination),
            format!("Travelodge {}", spec.destination),
            format!("{} Resort & Spa", spec.destination),
            format!("Best Western {}", spec.destination),
            format!("{} City Hotel", spec.destination),
        ];

        let mut hotels = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let price_level = rng.random_range(1..=4);
            let price_per_night = price_level_rate(price_level);
            let estimated_price = price_per_night * nights * travelers;

            let amenity_count = rng.random_range(2..=4);
            let amenities: Vec<&str> = AMENITIES
                .choose_multiple(&mut rng, amenity_count)
                .copied()
                .collect();

            hotels.push(json!({
                "id": format!("hotel_{i}"),
                "name": name,
                "address": format!("{} Main St, {}", rng.random_range(100..1000), spec.destination),
                "rating": round1(rng.random_range(3.5..5.0)),
                "price_level": price_level,
                "price_per_night": price_per_night,
                "estimated_price": estimated_price,
                "amenities": amenities,
                "score": rng.random_range(70.0..95.0),
            }));
        }

        rank_and_filter(&mut hotels, spec.budget);
        build_payload(spec, hotels)
    }
}

#[async_trait]
impl StageProvider for HotelProvider {
    fn stage(&self) -> Stage {
        Stage::Hotel
    }

    async fn run(&self, input: &StageInput) -> Result<StageResult, StageError> {
        let spec = &input.spec;
        match self.live_search(spec).await {
            Ok(payload) => Ok(StageResult::live(Stage::Hotel, payload)),
            Err(e) => {
                warn!(error = %e, destination = %spec.destination, "hotel search degraded to synthetic data");
                Ok(StageResult::synthetic(Stage::Hotel, self.synthetic(spec)))
            }
        }
    }
}

/// Nightly base rate for a places-style price level
fn price_level_rate(level: u64) -> f64 {
    match level {
        1 => 50.0,
        2 => 100.0,
        3 => 200.0,
        4 => 400.0,
        _ => 100.0,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Map one places result to the hotel record later stages consume
fn live_hotel(place: &Value, spec: &TripSpec, nights: f64) -> Option<Value> {
    let price_level = place.get("price_level").and_then(|v| v.as_u64()).unwrap_or(2);
    let rating = place.get("rating").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let price_per_night = price_level_rate(price_level);
    let estimated_price = price_per_night * nights * f64::from(spec.travelers);

    Some(json!({
        "id": place.get("place_id")?.as_str()?,
        "name": place.get("name")?.as_str()?,
        "address": place.get("formatted_address").and_then(|v| v.as_str()).unwrap_or_default(),
        "rating": rating,
        "price_level": price_level,
        "price_per_night": price_per_night,
        "estimated_price": estimated_price,
        "amenities": [],
        "score": score_hotel(rating, price_level, spec.preferences.accommodation_style),
    }))
}

/// Rating plus a bonus when the price level matches the requested style
fn score_hotel(rating: f64, price_level: u64, style: AccommodationStyle) -> f64 {
    let mut score = rating * 10.0;
    let style_match = match style {
        AccommodationStyle::Budget | AccommodationStyle::Hostel => price_level <= 2,
        AccommodationStyle::Luxury | AccommodationStyle::Boutique => price_level >= 3,
        AccommodationStyle::Moderate | AccommodationStyle::Apartment => price_level == 2,
    };
    if style_match {
        score += 20.0;
    }
    score + 10.0
}

/// Drop options beyond the accommodation budget share, best score first
fn rank_and_filter(hotels: &mut Vec<Value>, budget: f64) {
    hotels.retain(|h| h["estimated_price"].as_f64().unwrap_or(f64::MAX) <= budget * BUDGET_SHARE);
    hotels.sort_by(|a, b| {
        let sa = a["score"].as_f64().unwrap_or(0.0);
        let sb = b["score"].as_f64().unwrap_or(0.0);
        sb.total_cmp(&sa)
    });
    hotels.truncate(10);
}

fn build_payload(spec: &TripSpec, hotels: Vec<Value>) -> Value {
    json!({
        "search_criteria": {
            "destination": spec.destination,
            "check_in": spec.start_date.format("%Y-%m-%d").to_string(),
            "check_out": spec.end_date.format("%Y-%m-%d").to_string(),
            "duration": spec.duration_days(),
            "budget": spec.budget,
            "travelers": spec.travelers,
        },
        "total_options": hotels.len(),
        "hotel_options": hotels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataSource, PreferenceSet};
    use chrono::NaiveDate;
    use serial_test::serial;

    fn spec() -> TripSpec {
        TripSpec {
            destination: "Lisbon".to_string(),
            origin: None,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            travelers: 2,
            budget: 4000.0,
            preferences: PreferenceSet::default(),
        }
    }

    fn provider() -> HotelProvider {
        HotelProvider::new(&PlacesApiConfig {
            api_key_env: "TEST_PLACES_KEY_UNSET".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_key_degrades_to_synthetic() {
        let result = provider().run(&StageInput::new(spec(), vec![])).await.unwrap();
        assert_eq!(result.stage, Stage::Hotel);
        assert_eq!(result.source, DataSource::Synthetic);
    }

    #[tokio::test]
    #[serial]
    async fn test_synthetic_payload_shape() {
        let result = provider().run(&StageInput::new(spec(), vec![])).await.unwrap();
        let payload = &result.payload;

        let criteria = &payload["search_criteria"];
        assert_eq!(criteria["destination"], "Lisbon");
        assert_eq!(criteria["duration"], 3);
        assert_eq!(criteria["check_in"], "2024-06-01");

        let options = payload["hotel_options"].as_array().unwrap();
        assert_eq!(payload["total_options"], options.len() as u64);
        for hotel in options {
            assert!(hotel["name"].is_string());
            assert!(hotel["rating"].is_f64());
            assert!(hotel["price_per_night"].is_f64());
            // Every surviving option fits the accommodation budget share
            assert!(hotel["estimated_price"].as_f64().unwrap() <= 4000.0 * BUDGET_SHARE);
            assert!(hotel["score"].is_f64());
        }
    }

    #[test]
    fn test_score_hotel_style_match() {
        let base = score_hotel(4.0, 2, AccommodationStyle::Luxury);
        let matched = score_hotel(4.0, 4, AccommodationStyle::Luxury);
        assert_eq!(matched - base, 20.0);

        assert!(score_hotel(4.0, 1, AccommodationStyle::Budget) > score_hotel(4.0, 4, AccommodationStyle::Budget));
    }

    #[test]
    fn test_rank_and_filter_orders_by_score() {
        let mut hotels = vec![
            json!({"estimated_price": 100.0, "score": 50.0}),
            json!({"estimated_price": 100.0, "score": 90.0}),
            json!({"estimated_price": 99999.0, "score": 99.0}),
        ];
        rank_and_filter(&mut hotels, 1000.0);
        assert_eq!(hotels.len(), 2);
        assert_eq!(hotels[0]["score"], 90.0);
    }

    #[test]
    fn test_price_level_rates() {
        assert_eq!(price_level_rate(1), 50.0);
        assert_eq!(price_level_rate(4), 400.0);
        assert_eq!(price_level_rate(9), 100.0);
    }
}
