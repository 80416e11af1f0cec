//! Preference Normalizer
//!
//! Turns a raw, loosely-typed trip request into a validated [`TripSpec`],
//! or rejects it with every missing/malformed field listed at once.
//!
//! Structural fields (destination, dates, budget, preferences record,
//! traveler count) hard-fail. Enumerated preference values outside their
//! vocabulary do not: unknown activity tags are dropped and unknown
//! style/dining/pace values substitute the documented defaults, keeping
//! the legacy silent-correction behavior for enum fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{
    AccommodationStyle, ActivityTag, DiningPreference, Pace, PreferenceSet, TripSpec,
};

/// Raw submission payload, before any validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTripRequest {
    pub destination: Option<String>,
    pub origin: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: Option<f64>,
    pub travelers: Option<i64>,
    pub preferences: Option<RawPreferences>,
}

/// Raw nested preferences record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPreferences {
    pub activities: Option<Vec<String>>,
    pub accommodation_style: Option<String>,
    pub dining_preference: Option<String>,
    pub pace: Option<String>,
}

/// One rejected submission field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    fn new(field: &str, reason: &str) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Validation failure listing every bad field, not just the first
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("invalid trip request: {}", summarize(.fields))]
pub struct InvalidInput {
    pub fields: Vec<FieldError>,
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate and canonicalize a raw request
pub fn normalize(raw: &RawTripRequest) -> Result<TripSpec, InvalidInput> {
    debug!("normalize: called");
    let mut errors = Vec::new();

    let destination = match raw.destination.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => Some(d.to_string()),
        Some(_) => {
            errors.push(FieldError::new("destination", "must not be empty"));
            None
        }
        None => {
            errors.push(FieldError::new("destination", "required"));
            None
        }
    };

    let start_date = parse_date("start_date", raw.start_date.as_deref(), &mut errors);
    let end_date = parse_date("end_date", raw.end_date.as_deref(), &mut errors);
    if let (Some(start), Some(end)) = (start_date, end_date)
        && end < start
    {
        errors.push(FieldError::new("end_date", "must not be before start_date"));
    }

    let budget = match raw.budget {
        Some(b) if b.is_finite() && b > 0.0 => Some(b),
        Some(_) => {
            errors.push(FieldError::new("budget", "must be a positive number"));
            None
        }
        None => {
            errors.push(FieldError::new("budget", "required"));
            None
        }
    };

    let travelers = match raw.travelers {
        None => 1,
        Some(t) if (1..=i64::from(u32::MAX)).contains(&t) => t as u32,
        Some(_) => {
            errors.push(FieldError::new("travelers", "must be at least 1"));
            1
        }
    };

    let preferences = match &raw.preferences {
        Some(prefs) => normalize_preferences(prefs),
        None => {
            errors.push(FieldError::new("preferences", "required"));
            PreferenceSet::default()
        }
    };

    let end_after_start = matches!((start_date, end_date), (Some(s), Some(e)) if e >= s);
    match (destination, start_date, end_date, budget) {
        (Some(destination), Some(start_date), Some(end_date), Some(budget))
            if errors.is_empty() && end_after_start =>
        {
            Ok(TripSpec {
                destination,
                origin: raw.origin.as_deref().map(str::trim).filter(|o| !o.is_empty()).map(String::from),
                start_date,
                end_date,
                travelers,
                budget,
                preferences,
            })
        }
        _ => Err(InvalidInput { fields: errors }),
    }
}

fn parse_date(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) -> Option<NaiveDate> {
    match value {
        None => {
            errors.push(FieldError::new(field, "required"));
            None
        }
        Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(FieldError::new(field, "must be an ISO date (YYYY-MM-DD)"));
                None
            }
        },
    }
}

/// Canonicalize the nested preferences record
///
/// Never fails: unknown enum values fall back to defaults, unknown
/// activity tags are filtered out.
fn normalize_preferences(raw: &RawPreferences) -> PreferenceSet {
    let activities = raw
        .activities
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|tag| match tag.parse::<ActivityTag>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(%tag, "dropping unknown activity tag");
                None
            }
        })
        .collect();

    PreferenceSet {
        activities,
        accommodation_style: parse_or_default("accommodation_style", raw.accommodation_style.as_deref()),
        dining_preference: parse_or_default("dining_preference", raw.dining_preference.as_deref()),
        pace: parse_or_default("pace", raw.pace.as_deref()),
    }
}

fn parse_or_default<T>(field: &str, value: Option<&str>) -> T
where
    T: std::str::FromStr + Default + std::fmt::Display,
{
    match value {
        None => T::default(),
        Some(raw) => match raw.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                let fallback = T::default();
                debug!(field, value = raw, fallback = %fallback, "substituting default for unknown preference value");
                fallback
            }
        },
    }
}
