//! Itinerary synthesis stage
//!
//! Pure computation over the trip spec and the recommendation, flight
//! and hotel results: one plan per trip day with activity slots, meals
//! and transportation, plus trip-level cost breakdowns. Raises a hard
//! failure only when invoked without its declared dependencies.

use async_trait::async_trait;
use chrono::{Days, Utc};
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::domain::{ActivityTag, DiningPreference, Pace, Stage, StageResult, TripSpec};

use super::{StageError, StageInput, StageProvider};

/// Itinerary builder
#[derive(Default)]
pub struct ItineraryBuilder;

impl ItineraryBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageProvider for ItineraryBuilder {
    fn stage(&self) -> Stage {
        Stage::Itinerary
    }

    async fn run(&self, input: &StageInput) -> Result<StageResult, StageError> {
        let recommendations = input.require(Stage::Recommendation)?;
        let flights = input.require(Stage::Flight)?;
        let hotels = input.require(Stage::Hotel)?;
        let spec = &input.spec;
        debug!(destination = %spec.destination, "ItineraryBuilder::run: called");

        let categories = match recommendations.get("activity_recommendations") {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(StageError::MalformedDependency {
                    stage: Stage::Recommendation,
                    detail: "activity_recommendations is not an object".to_string(),
                });
            }
        };

        let mut rng = rand::rng();
        let duration = spec.duration_days();
        let mut daily_plans = Vec::new();
        let mut total_activities = 0.0;
        let mut total_meals = 0.0;
        let mut total_transport = 0.0;

        for day in 0..duration {
            let date = spec.start_date + Days::new(day as u64);
            let activities = select_daily_activities(spec, &categories, day, &mut rng);
            let slots = time_slots(&activities, spec.preferences.pace);
            let meals = plan_meals(spec.preferences.dining_preference, &mut rng);

            let activity_cost: f64 = slots
                .iter()
                .filter_map(|s| s["estimated_cost"].as_f64())
                .sum();
            let meal_cost: f64 = meals
                .values()
                .filter_map(|m| m["estimated_cost"].as_f64())
                .sum();
            let transport_cost: f64 = rng.random_range(5.0..20.0);

            total_activities += activity_cost;
            total_meals += meal_cost;
            total_transport += transport_cost;

            daily_plans.push(json!({
                "day": day + 1,
                "date": date.format("%Y-%m-%d").to_string(),
                "activities": slots,
                "meals": meals,
                "transportation": {
                    "primary_mode": "Walking and public transport",
                    "estimated_cost": transport_cost,
                },
                "estimated_cost": {
                    "activities": activity_cost,
                    "meals": meal_cost,
                    "transportation": transport_cost,
                    "total": activity_cost + meal_cost + transport_cost,
                },
            }));
        }

        let best_flight = flights
            .get("flight_options")
            .and_then(|v| v.get(0))
            .cloned()
            .unwrap_or_else(|| json!({}));
        let lodging = hotels
            .get("hotel_options")
            .and_then(|v| v.get(0))
            .cloned()
            .unwrap_or_else(|| json!({}));

        let payload = json!({
            "destination": spec.destination,
            "start_date": spec.start_date.format("%Y-%m-%d").to_string(),
            "end_date": spec.end_date.format("%Y-%m-%d").to_string(),
            "duration": duration,
            "daily_plans": daily_plans,
            "lodging": lodging,
            "transportation": {
                "arrival": {"type": "flight", "details": best_flight.clone()},
                "departure": {"type": "flight", "details": best_flight},
                "local_transportation": "Mix of public transport and walking",
                "estimated_daily_cost": rng.random_range(10.0..30.0),
            },
            "budget_breakdown": {
                "activities": total_activities,
                "meals": total_meals,
                "transportation": total_transport,
                "total": total_activities + total_meals + total_transport,
            },
            "created_at": Utc::now().to_rfc3339(),
        });

        Ok(StageResult::live(Stage::Itinerary, payload))
    }
}

/// Pick the day's activities: one per requested tag from the
/// recommendations (rotated by day for variety), topped up with generic
/// templates until the pace quota is met.
fn select_daily_activities(
    spec: &TripSpec,
    categories: &Map<String, Value>,
    day: i64,
    rng: &mut impl Rng,
) -> Vec<(String, f64)> {
    let quota = spec.preferences.pace.activities_per_day();
    let mut selected: Vec<(String, f64)> = Vec::new();

    for tag in &spec.preferences.activities {
        if selected.len() >= quota {
            break;
        }
        let Some(entries) = categories.get(tag.as_str()).and_then(|v| v.as_array()) else {
            continue;
        };
        if entries.is_empty() {
            continue;
        }
        let entry = &entries[(day as usize) % entries.len()];
        let name = entry
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("Explore the area")
            .to_string();
        let cost = entry.get("estimated_cost").and_then(|v| v.as_f64()).unwrap_or(0.0);
        selected.push((name, cost));
    }

    let mut fallback_index = 0;
    while selected.len() < quota {
        let name = generic_activity(&spec.preferences.activities, day, fallback_index, &spec.destination);
        if selected.iter().all(|(existing, _)| existing != &name) {
            let cost = rng.random_range(15.0..50.0);
            selected.push((name, cost));
        }
        fallback_index += 1;
        if fallback_index > quota * 4 {
            break;
        }
    }

    selected
}

fn generic_activity(tags: &[ActivityTag], day: i64, index: usize, destination: &str) -> String {
    const FALLBACKS: [&str; 4] = [
        "Explore the old town",
        "Visit a local landmark",
        "Walk through a city park",
        "Browse a neighborhood market",
    ];

    if tags.is_empty() {
        return format!("{} in {destination}", FALLBACKS[index % FALLBACKS.len()]);
    }

    let tag = tags[(day as usize + index) % tags.len()];
    let templates: &[&str] = match tag {
        ActivityTag::Culture => &["Visit a local museum", "Explore the historical district", "Tour an art gallery"],
        ActivityTag::Adventure => &["Go hiking in nature", "Try water sports", "Explore outdoor trails"],
        ActivityTag::Relaxation => &["Visit a local park", "Relax at a spa", "Walk along the waterfront"],
        ActivityTag::Food => &["Try a local restaurant", "Visit a food market", "Take a cooking class"],
        ActivityTag::Shopping => &["Visit a local market", "Explore the shopping district", "Go souvenir shopping"],
        ActivityTag::Nature => &["Visit a national park", "Walk in the botanical gardens", "Visit a nature center"],
    };
    templates[index % templates.len()].to_string()
}

/// Lay activities out over the day; earlier start and shorter slots at a
/// faster pace.
fn time_slots(activities: &[(String, f64)], pace: Pace) -> Vec<Value> {
    let (start_hour, slot_hours) = match pace {
        Pace::Relaxed => (10, 2.0),
        Pace::Moderate => (9, 1.5),
        Pace::Fast => (8, 1.0),
    };

    activities
        .iter()
        .enumerate()
        .map(|(i, (activity, cost))| {
            json!({
                "time": format!("{:02}:00", start_hour + i * 2),
                "duration": format!("{slot_hours:.1}h"),
                "activity": activity,
                "estimated_cost": cost,
            })
        })
        .collect()
}

fn plan_meals(dining: DiningPreference, rng: &mut impl Rng) -> Map<String, Value> {
    let mut meals = Map::new();
    for (meal, time, low, high) in [
        ("breakfast", "08:00", 15.0, 30.0),
        ("lunch", "13:00", 20.0, 50.0),
        ("dinner", "19:00", 30.0, 80.0),
    ] {
        meals.insert(
            meal.to_string(),
            json!({
                "time": time,
                "type": meal,
                "suggestion": meal_suggestion(meal, dining),
                "estimated_cost": rng.random_range(low..high),
            }),
        );
    }
    meals
}

fn meal_suggestion(meal: &str, dining: DiningPreference) -> &'static str {
    match (meal, dining) {
        ("breakfast", DiningPreference::FineDining) => "Upscale breakfast at a hotel restaurant",
        ("breakfast", DiningPreference::StreetFood) => "Street food breakfast market",
        ("breakfast", DiningPreference::LocalCuisine) => "Traditional local breakfast",
        ("breakfast", _) => "Local cafe or breakfast spot",
        ("lunch", DiningPreference::FineDining) => "Upscale restaurant lunch",
        ("lunch", DiningPreference::StreetFood) => "Street food lunch",
        ("lunch", DiningPreference::LocalCuisine) => "Traditional local restaurant",
        ("lunch", _) => "Casual dining restaurant",
        (_, DiningPreference::FineDining) => "Fine dining restaurant",
        (_, DiningPreference::StreetFood) => "Evening street food",
        (_, DiningPreference::LocalCuisine) => "Traditional local dinner",
        (_, _) => "Mix of dining experiences",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PreferenceSet, TripSpec};
    use chrono::NaiveDate;

    fn spec(pace: Pace) -> TripSpec {
        TripSpec {
            destination: "Rome".to_string(),
            origin: None,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            travelers: 2,
            budget: 2000.0,
            preferences: PreferenceSet {
                activities: vec![ActivityTag::Culture, ActivityTag::Food],
                pace,
                ..Default::default()
            },
        }
    }

    fn dependencies() -> Vec<StageResult> {
        vec![
            StageResult::synthetic(
                Stage::Recommendation,
                json!({
                    "activity_recommendations": {
                        "culture": [
                            {"name": "Colosseum tour", "estimated_cost": 25.0},
                            {"name": "Vatican museums", "estimated_cost": 30.0},
                        ],
                        "food": [
                            {"name": "Trastevere food walk", "estimated_cost": 60.0},
                        ],
                    },
                }),
            ),
            StageResult::synthetic(
                Stage::Flight,
                json!({"flight_options": [{"id": "f0", "total_price": 640.0}]}),
            ),
            StageResult::synthetic(
                Stage::Hotel,
                json!({"hotel_options": [{"id": "h0", "name": "Hotel Roma", "estimated_price": 600.0}]}),
            ),
        ]
    }

    #[tokio::test]
    async fn test_builds_one_plan_per_day() {
        let input = StageInput::new(spec(Pace::Moderate), dependencies());
        let result = ItineraryBuilder::new().run(&input).await.unwrap();
        let payload = &result.payload;

        assert_eq!(payload["duration"], 3);
        let plans = payload["daily_plans"].as_array().unwrap();
        assert_eq!(plans.len(), 3);

        for (i, plan) in plans.iter().enumerate() {
            assert_eq!(plan["day"], (i + 1) as u64);
            // Moderate pace schedules three activities per day
            assert_eq!(plan["activities"].as_array().unwrap().len(), 3);
            let meals = plan["meals"].as_object().unwrap();
            assert!(meals.contains_key("breakfast"));
            assert!(meals.contains_key("lunch"));
            assert!(meals.contains_key("dinner"));

            let cost = &plan["estimated_cost"];
            let total = cost["activities"].as_f64().unwrap()
                + cost["meals"].as_f64().unwrap()
                + cost["transportation"].as_f64().unwrap();
            assert!((cost["total"].as_f64().unwrap() - total).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_budget_breakdown_sums_daily_costs() {
        let input = StageInput::new(spec(Pace::Relaxed), dependencies());
        let result = ItineraryBuilder::new().run(&input).await.unwrap();
        let payload = &result.payload;

        let plans = payload["daily_plans"].as_array().unwrap();
        let daily_total: f64 = plans
            .iter()
            .map(|p| p["estimated_cost"]["total"].as_f64().unwrap())
            .sum();
        let breakdown_total = payload["budget_breakdown"]["total"].as_f64().unwrap();
        assert!((daily_total - breakdown_total).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_recommended_activities_rotate_by_day() {
        let input = StageInput::new(spec(Pace::Moderate), dependencies());
        let result = ItineraryBuilder::new().run(&input).await.unwrap();
        let plans = result.payload["daily_plans"].as_array().unwrap().clone();

        let first = plans[0]["activities"][0]["activity"].as_str().unwrap().to_string();
        let second = plans[1]["activities"][0]["activity"].as_str().unwrap().to_string();
        assert_eq!(first, "Colosseum tour");
        assert_eq!(second, "Vatican museums");
    }

    #[tokio::test]
    async fn test_missing_flight_is_contract_violation() {
        let deps: Vec<StageResult> = dependencies()
            .into_iter()
            .filter(|r| r.stage != Stage::Flight)
            .collect();
        let input = StageInput::new(spec(Pace::Moderate), deps);

        let err = ItineraryBuilder::new().run(&input).await.unwrap_err();
        assert_eq!(err, StageError::MissingDependency(Stage::Flight));
    }

    #[tokio::test]
    async fn test_malformed_recommendations_rejected() {
        let mut deps = dependencies();
        deps[0] = StageResult::synthetic(
            Stage::Recommendation,
            json!({"activity_recommendations": 42}),
        );
        let input = StageInput::new(spec(Pace::Moderate), deps);

        let err = ItineraryBuilder::new().run(&input).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::MalformedDependency { stage: Stage::Recommendation, .. }
        ));
    }

    #[tokio::test]
    async fn test_zero_day_trip_has_empty_plans() {
        let mut zero = spec(Pace::Moderate);
        zero.end_date = zero.start_date;
        let input = StageInput::new(zero, dependencies());

        let result = ItineraryBuilder::new().run(&input).await.unwrap();
        assert_eq!(result.payload["duration"], 0);
        assert!(result.payload["daily_plans"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_meal_suggestions_follow_dining_preference() {
        assert_eq!(
            meal_suggestion("dinner", DiningPreference::FineDining),
            "Fine dining restaurant"
        );
        assert_eq!(
            meal_suggestion("breakfast", DiningPreference::StreetFood),
            "Street food breakfast market"
        );
        assert_eq!(
            meal_suggestion("lunch", DiningPreference::Mixed),
            "Casual dining restaurant"
        );
    }
}
