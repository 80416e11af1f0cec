//! Budget analysis stage
//!
//! Pure computation over the flight, hotel and itinerary results plus
//! the trip budget. Sums actual stage costs, compares them to a
//! recommended allocation, and publishes the `summary` record that the
//! trip plan's totals are derived from. That summary is part of this
//! stage's output contract: it is present in every payload this
//! provider produces.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::domain::{Stage, StageResult};

use super::{StageError, StageInput, StageProvider};

/// Recommended budget allocation by category
const ALLOCATION: [(&str, f64); 5] = [
    ("flights", 0.40),
    ("accommodation", 0.30),
    ("activities", 0.15),
    ("meals", 0.10),
    ("transportation", 0.05),
];

/// Budget analyzer
#[derive(Default)]
pub struct BudgetAnalyzer;

impl BudgetAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageProvider for BudgetAnalyzer {
    fn stage(&self) -> Stage {
        Stage::Budget
    }

    async fn run(&self, input: &StageInput) -> Result<StageResult, StageError> {
        let flights = input.require(Stage::Flight)?;
        let hotels = input.require(Stage::Hotel)?;
        let itinerary = input.require(Stage::Itinerary)?;
        let total_budget = input.spec.budget;
        debug!(total_budget, "BudgetAnalyzer::run: called");

        let actual = actual_costs(flights, hotels, itinerary);
        let total_cost = actual.values().filter_map(Value::as_f64).sum::<f64>();

        let mut allocation = Map::new();
        let mut analysis = Map::new();
        for (category, share) in ALLOCATION {
            let recommended = total_budget * share;
            let spent = actual.get(category).and_then(Value::as_f64).unwrap_or(0.0);
            let percentage_used = if recommended > 0.0 {
                spent / recommended * 100.0
            } else {
                0.0
            };

            allocation.insert(
                category.to_string(),
                json!({"recommended": recommended, "percentage": share * 100.0}),
            );
            analysis.insert(
                category.to_string(),
                json!({
                    "actual": spent,
                    "recommended": recommended,
                    "percentage_used": percentage_used,
                    "status": budget_status(percentage_used),
                    "difference": spent - recommended,
                }),
            );
        }

        let overall_pct = if total_budget > 0.0 {
            total_cost / total_budget * 100.0
        } else {
            0.0
        };
        let remaining = total_budget - total_cost;
        let overall_status = budget_status(overall_pct);

        let mut category_summary = Map::new();
        for (category, record) in &analysis {
            category_summary.insert(
                category.clone(),
                json!({
                    "cost": record["actual"],
                    "percentage": record["percentage_used"],
                    "status": record["status"],
                }),
            );
        }

        let mut actual_with_total = actual.clone();
        actual_with_total.insert("total".to_string(), json!(total_cost));

        let payload = json!({
            "total_budget": total_budget,
            "actual_costs": actual_with_total,
            "budget_allocation": allocation,
            "analysis": {
                "categories": analysis,
                "overall": {
                    "actual": total_cost,
                    "budget": total_budget,
                    "percentage_used": overall_pct,
                    "status": overall_status,
                    "remaining": remaining,
                },
            },
            "recommendations": advisories(overall_status, remaining, &analysis),
            "summary": {
                "total_cost": total_cost,
                "total_budget": total_budget,
                "remaining": remaining,
                "status": overall_status,
                "percentage_used": overall_pct,
                "categories": category_summary,
            },
        });

        Ok(StageResult::live(Stage::Budget, payload))
    }
}

/// Sum the costs the earlier stages actually produced
///
/// Missing options mean a category simply cost nothing, mirroring the
/// degraded-but-complete sessions where a search came back empty.
fn actual_costs(flights: &Value, hotels: &Value, itinerary: &Value) -> Map<String, Value> {
    let flight_cost = flights
        .get("flight_options")
        .and_then(|v| v.get(0))
        .and_then(|best| best.get("total_price"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let hotel_cost = hotels
        .get("hotel_options")
        .and_then(|v| v.get(0))
        .and_then(|best| best.get("estimated_price"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let mut activities = 0.0;
    let mut meals = 0.0;
    let mut transportation = 0.0;
    if let Some(days) = itinerary.get("daily_plans").and_then(Value::as_array) {
        for day in days {
            let cost = &day["estimated_cost"];
            activities += cost.get("activities").and_then(Value::as_f64).unwrap_or(0.0);
            meals += cost.get("meals").and_then(Value::as_f64).unwrap_or(0.0);
            transportation += cost.get("transportation").and_then(Value::as_f64).unwrap_or(0.0);
        }
    }

    let mut costs = Map::new();
    costs.insert("flights".to_string(), json!(flight_cost));
    costs.insert("accommodation".to_string(), json!(hotel_cost));
    costs.insert("activities".to_string(), json!(activities));
    costs.insert("meals".to_string(), json!(meals));
    costs.insert("transportation".to_string(), json!(transportation));
    costs
}

fn budget_status(percentage_used: f64) -> &'static str {
    if percentage_used < 80.0 {
        "under_budget"
    } else if percentage_used <= 100.0 {
        "within_budget"
    } else if percentage_used <= 120.0 {
        "over_budget"
    } else {
        "significantly_over_budget"
    }
}

fn advisories(overall_status: &str, remaining: f64, analysis: &Map<String, Value>) -> Vec<Value> {
    let mut recommendations = Vec::new();

    match overall_status {
        "under_budget" if remaining > 100.0 => recommendations.push(json!({
            "type": "suggestion",
            "category": "overall",
            "message": format!(
                "You have ${remaining:.2} remaining. Consider upgrading your accommodation or adding premium activities."
            ),
            "priority": "low",
        })),
        "over_budget" => recommendations.push(json!({
            "type": "warning",
            "category": "overall",
            "message": format!("You are ${:.2} over budget. Consider cost-saving alternatives.", remaining.abs()),
            "priority": "high",
        })),
        "significantly_over_budget" => recommendations.push(json!({
            "type": "critical",
            "category": "overall",
            "message": format!("You are significantly over budget by ${:.2}. Major adjustments needed.", remaining.abs()),
            "priority": "critical",
        })),
        _ => {}
    }

    for (category, record) in analysis {
        let status = record["status"].as_str().unwrap_or_default();
        let difference = record["difference"].as_f64().unwrap_or(0.0);

        if status == "over_budget" || status == "significantly_over_budget" {
            recommendations.push(json!({
                "type": "warning",
                "category": category,
                "message": format!("{category} is ${difference:.2} over the recommended budget."),
                "priority": "medium",
            }));
        } else if status == "under_budget" && difference < -50.0 {
            recommendations.push(json!({
                "type": "suggestion",
                "category": category,
                "message": format!("{category} is ${:.2} under budget. You could upgrade this category.", difference.abs()),
                "priority": "low",
            }));
        }
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PreferenceSet, TripSpec};
    use chrono::NaiveDate;

    fn spec(budget: f64) -> TripSpec {
        TripSpec {
            destination: "Rome".to_string(),
            origin: None,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            travelers: 2,
            budget,
            preferences: PreferenceSet::default(),
        }
    }

    fn dependencies() -> Vec<StageResult> {
        vec![
            StageResult::synthetic(
                Stage::Flight,
                json!({"flight_options": [{"total_price": 600.0}, {"total_price": 900.0}]}),
            ),
            StageResult::synthetic(
                Stage::Hotel,
                json!({"hotel_options": [{"estimated_price": 450.0}]}),
            ),
            StageResult::synthetic(
                Stage::Itinerary,
                json!({"daily_plans": [
                    {"estimated_cost": {"activities": 50.0, "meals": 80.0, "transportation": 10.0}},
                    {"estimated_cost": {"activities": 70.0, "meals": 90.0, "transportation": 15.0}},
                ]}),
            ),
        ]
    }

    #[tokio::test]
    async fn test_summary_totals_sum_stage_costs() {
        let input = StageInput::new(spec(2000.0), dependencies());
        let result = BudgetAnalyzer::new().run(&input).await.unwrap();
        let summary = &result.payload["summary"];

        // 600 flight + 450 hotel + 120 activities + 170 meals + 25 transport
        assert!((summary["total_cost"].as_f64().unwrap() - 1365.0).abs() < 1e-9);
        assert!((summary["remaining"].as_f64().unwrap() - 635.0).abs() < 1e-9);
        assert_eq!(summary["total_budget"], 2000.0);
        assert_eq!(summary["status"], "under_budget");
        assert!(summary["categories"]["flights"]["cost"].as_f64().is_some());
    }

    #[tokio::test]
    async fn test_status_thresholds() {
        assert_eq!(budget_status(50.0), "under_budget");
        assert_eq!(budget_status(80.0), "within_budget");
        assert_eq!(budget_status(100.0), "within_budget");
        assert_eq!(budget_status(110.0), "over_budget");
        assert_eq!(budget_status(150.0), "significantly_over_budget");

        // 1365 cost against a 1200 budget: ~114% used
        let input = StageInput::new(spec(1200.0), dependencies());
        let result = BudgetAnalyzer::new().run(&input).await.unwrap();
        assert_eq!(result.payload["summary"]["status"], "over_budget");
    }

    #[tokio::test]
    async fn test_over_budget_produces_warning() {
        let input = StageInput::new(spec(1200.0), dependencies());
        let result = BudgetAnalyzer::new().run(&input).await.unwrap();

        let recommendations = result.payload["recommendations"].as_array().unwrap();
        assert!(recommendations.iter().any(|r| r["category"] == "overall" && r["type"] == "warning"));
    }

    #[tokio::test]
    async fn test_empty_options_cost_nothing() {
        let deps = vec![
            StageResult::synthetic(Stage::Flight, json!({"flight_options": []})),
            StageResult::synthetic(Stage::Hotel, json!({"hotel_options": []})),
            StageResult::synthetic(Stage::Itinerary, json!({"daily_plans": []})),
        ];
        let input = StageInput::new(spec(1000.0), deps);
        let result = BudgetAnalyzer::new().run(&input).await.unwrap();

        let summary = &result.payload["summary"];
        assert_eq!(summary["total_cost"], 0.0);
        assert_eq!(summary["remaining"], 1000.0);
        assert_eq!(summary["status"], "under_budget");
    }

    #[tokio::test]
    async fn test_missing_itinerary_is_contract_violation() {
        let deps: Vec<StageResult> = dependencies()
            .into_iter()
            .filter(|r| r.stage != Stage::Itinerary)
            .collect();
        let input = StageInput::new(spec(2000.0), deps);

        let err = BudgetAnalyzer::new().run(&input).await.unwrap_err();
        assert_eq!(err, StageError::MissingDependency(Stage::Itinerary));
    }

    #[tokio::test]
    async fn test_allocation_table() {
        let input = StageInput::new(spec(1000.0), dependencies());
        let result = BudgetAnalyzer::new().run(&input).await.unwrap();
        let allocation = result.payload["budget_allocation"].as_object().unwrap();

        assert_eq!(allocation["flights"]["recommended"], 400.0);
        assert_eq!(allocation["accommodation"]["recommended"], 300.0);
        assert_eq!(allocation["activities"]["recommended"], 150.0);
        assert_eq!(allocation["meals"]["recommended"], 100.0);
        assert_eq!(allocation["transportation"]["recommended"], 50.0);
    }
}
