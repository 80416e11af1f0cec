//! Flight search stage
//!
//! Queries a flight-offers API (OAuth client-credentials token, then one
//! offers search per direction), combines outbound and return legs into
//! ranked round-trip options, and falls back to synthetic options when
//! the live source is unavailable.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::FlightApiConfig;
use crate::domain::{Stage, StageResult, TripSpec};

use super::{ProviderCallError, StageError, StageInput, StageProvider};

/// Origin used when the request does not name one
const DEFAULT_ORIGIN: &str = "JFK";

const AIRLINES: [&str; 6] = ["AA", "UA", "DL", "BA", "LH", "AF"];

/// Flight search provider
pub struct FlightProvider {
    http: Client,
    client_id_env: String,
    client_secret_env: String,
    base_url: String,
}

impl FlightProvider {
    pub fn new(config: &FlightApiConfig) -> Result<Self, ProviderCallError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            client_id_env: config.client_id_env.clone(),
            client_secret_env: config.client_secret_env.clone(),
            base_url: config.base_url.clone(),
        })
    }

    async fn live_search(&self, spec: &TripSpec) -> Result<Value, ProviderCallError> {
        debug!(destination = %spec.destination, "live_search: called");
        let client_id = read_env(&self.client_id_env)?;
        let client_secret = read_env(&self.client_secret_env)?;

        let token = self.fetch_token(&client_id, &client_secret).await?;

        let origin = spec.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        let outbound = self
            .fetch_offers(&token, origin, &spec.destination, spec.start_date)
            .await?;
        let inbound = self
            .fetch_offers(&token, &spec.destination, origin, spec.end_date)
            .await?;

        Ok(build_payload(
            spec,
            origin,
            combine_options(&outbound, &inbound, spec.budget, spec.travelers),
        ))
    }

    async fn fetch_token(&self, client_id: &str, client_secret: &str) -> Result<String, ProviderCallError> {
        let url = format!("{}/v1/security/oauth2/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderCallError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        body.get("access_token")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ProviderCallError::UnexpectedPayload("access_token missing".to_string()))
    }

    async fn fetch_offers(
        &self,
        token: &str,
        origin: &str,
        destination: &str,
        date: chrono::NaiveDate,
    ) -> Result<Vec<Value>, ProviderCallError> {
        let url = format!("{}/v1/shopping/flight-offers", self.base_url);
        let query: Vec<(&str, String)> = vec![
            ("originLocationCode", origin.to_string()),
            ("destinationLocationCode", destination.to_string()),
            ("departureDate", date.format("%Y-%m-%d").to_string()),
            ("adults", "1".to_string()),
            ("max", "10".to_string()),
            ("currencyCode", "USD".to_string()),
        ];

        let response = self.http.get(&url).bearer_auth(token).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(ProviderCallError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        Ok(body
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    /// Synthetic round-trip options with the same shape as the live payload
    fn synthetic(&self, spec: &TripSpec) -> Value {
        let mut rng = rand::rng();
        let origin = spec.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        let travelers = f64::from(spec.travelers);
        let mut options = Vec::new();

        for i in 0..5 {
            let outbound_price: f64 = rng.random_range(200.0..400.0);
            let return_price: f64 = rng.random_range(200.0..400.0);
            let total_price = (outbound_price + return_price) * travelers;

            if total_price > spec.budget {
                continue;
            }

            options.push(json!({
                "id": format!("synthetic_flight_{i}"),
                "outbound": synthetic_leg(
                    &mut rng,
                    &format!("outbound_{i}"),
                    origin,
                    &spec.destination,
                    &format!("{}T08:00:00", spec.start_date),
                    &format!("{}T10:30:00", spec.start_date),
                    outbound_price,
                ),
                "return": synthetic_leg(
                    &mut rng,
                    &format!("return_{i}"),
                    &spec.destination,
                    origin,
                    &format!("{}T18:00:00", spec.end_date),
                    &format!("{}T20:30:00", spec.end_date),
                    return_price,
                ),
                "total_price": total_price,
                "price_per_person": total_price / travelers,
                "airlines": [pick_airline(&mut rng), pick_airline(&mut rng)],
            }));
        }

        options.sort_by(|a, b| {
            let pa = a["total_price"].as_f64().unwrap_or(f64::MAX);
            let pb = b["total_price"].as_f64().unwrap_or(f64::MAX);
            pa.total_cmp(&pb)
        });

        build_payload(spec, origin, options)
    }
}

#[async_trait]
impl StageProvider for FlightProvider {
    fn stage(&self) -> Stage {
        Stage::Flight
    }

    async fn run(&self, input: &StageInput) -> Result<StageResult, StageError> {
        let spec = &input.spec;
        match self.live_search(spec).await {
            Ok(payload) => Ok(StageResult::live(Stage::Flight, payload)),
            Err(e) => {
                warn!(error = %e, destination = %spec.destination, "flight search degraded to synthetic data");
                Ok(StageResult::synthetic(Stage::Flight, self.synthetic(spec)))
            }
        }
    }
}

fn read_env(name: &str) -> Result<String, ProviderCallError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProviderCallError::MissingCredentials(name.to_string()))
}

fn pick_airline(rng: &mut impl Rng) -> &'static str {
    AIRLINES.choose(rng).copied().unwrap_or("AA")
}

fn synthetic_leg(
    rng: &mut impl Rng,
    id: &str,
    from: &str,
    to: &str,
    departs: &str,
    arrives: &str,
    price: f64,
) -> Value {
    json!({
        "id": id,
        "airline": pick_airline(rng),
        "departure": {"airport": from, "time": departs},
        "arrival": {"airport": to, "time": arrives},
        "duration": "PT2H30M",
        "stops": rng.random_range(0..=1),
        "price": price,
    })
}

fn build_payload(spec: &TripSpec, origin: &str, options: Vec<Value>) -> Value {
    json!({
        "search_criteria": {
            "origin": origin,
            "destination": spec.destination,
            "start_date": spec.start_date.format("%Y-%m-%d").to_string(),
            "end_date": spec.end_date.format("%Y-%m-%d").to_string(),
            "budget": spec.budget,
            "travelers": spec.travelers,
        },
        "total_options": options.len(),
        "flight_options": options,
    })
}

/// Pair up outbound and return offers into round-trip options
///
/// Takes the top few offers per direction, prices the pair for the whole
/// party, keeps pairs inside the budget, and ranks by total price.
fn combine_options(outbound: &[Value], inbound: &[Value], budget: f64, travelers: u32) -> Vec<Value> {
    let travelers = f64::from(travelers);
    let mut options = Vec::new();

    for out in outbound.iter().take(5) {
        for ret in inbound.iter().take(5) {
            let (Some(out_leg), Some(ret_leg)) = (format_leg(out), format_leg(ret)) else {
                continue;
            };
            let total_price =
                (out_leg["price"].as_f64().unwrap_or(0.0) + ret_leg["price"].as_f64().unwrap_or(0.0)) * travelers;
            if total_price > budget {
                continue;
            }

            let airlines: Vec<Value> = [&out_leg, &ret_leg]
                .iter()
                .filter_map(|leg| leg.get("airline").cloned())
                .collect();

            options.push(json!({
                "id": format!(
                    "{}_{}",
                    out.get("id").and_then(|v| v.as_str()).unwrap_or("out"),
                    ret.get("id").and_then(|v| v.as_str()).unwrap_or("ret"),
                ),
                "outbound": out_leg,
                "return": ret_leg,
                "total_price": total_price,
                "price_per_person": total_price / travelers,
                "airlines": airlines,
            }));
        }
    }

    options.sort_by(|a, b| {
        let pa = a["total_price"].as_f64().unwrap_or(f64::MAX);
        let pb = b["total_price"].as_f64().unwrap_or(f64::MAX);
        pa.total_cmp(&pb)
    });
    options.truncate(10);
    options
}

/// Flatten one upstream offer into the leg record later stages consume
fn format_leg(offer: &Value) -> Option<Value> {
    let price: f64 = offer.get("price")?.get("total")?.as_str()?.parse().ok()?;
    let airline = offer.get("validatingAirlineCodes")?.get(0)?.as_str()?;
    let itinerary = offer.get("itineraries")?.get(0)?;
    let segments = itinerary.get("segments")?.as_array()?;
    let first = segments.first()?;
    let last = segments.last()?;

    Some(json!({
        "id": offer.get("id").and_then(|v| v.as_str()).unwrap_or_default(),
        "airline": airline,
        "departure": {
            "airport": first.get("departure")?.get("iataCode")?.as_str()?,
            "time": first.get("departure")?.get("at")?.as_str()?,
        },
        "arrival": {
            "airport": last.get("arrival")?.get("iataCode")?.as_str()?,
            "time": last.get("arrival")?.get("at")?.as_str()?,
        },
        "duration": itinerary.get("duration").and_then(|v| v.as_str()).unwrap_or_default(),
        "stops": segments.len().saturating_sub(1),
        "price": price,
    }))
}
