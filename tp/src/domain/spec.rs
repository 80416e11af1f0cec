//! TripSpec domain type
//!
//! The normalized, validated form of a trip request. Immutable once
//! created; every stage provider reads from it and none writes back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Activity categories a traveler can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTag {
    Culture,
    Adventure,
    Relaxation,
    Food,
    Shopping,
    Nature,
}

impl ActivityTag {
    /// The full vocabulary, in a stable order
    pub const ALL: [ActivityTag; 6] = [
        ActivityTag::Culture,
        ActivityTag::Adventure,
        ActivityTag::Relaxation,
        ActivityTag::Food,
        ActivityTag::Shopping,
        ActivityTag::Nature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Culture => "culture",
            Self::Adventure => "adventure",
            Self::Relaxation => "relaxation",
            Self::Food => "food",
            Self::Shopping => "shopping",
            Self::Nature => "nature",
        }
    }
}

impl std::fmt::Display for ActivityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityTag {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "culture" => Ok(Self::Culture),
            "adventure" => Ok(Self::Adventure),
            "relaxation" => Ok(Self::Relaxation),
            "food" => Ok(Self::Food),
            "shopping" => Ok(Self::Shopping),
            "nature" => Ok(Self::Nature),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Accommodation price/style band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccommodationStyle {
    Luxury,
    Budget,
    #[default]
    Moderate,
    Boutique,
    Hostel,
    Apartment,
}

impl AccommodationStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Luxury => "luxury",
            Self::Budget => "budget",
            Self::Moderate => "moderate",
            Self::Boutique => "boutique",
            Self::Hostel => "hostel",
            Self::Apartment => "apartment",
        }
    }
}

impl std::fmt::Display for AccommodationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccommodationStyle {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "luxury" => Ok(Self::Luxury),
            "budget" => Ok(Self::Budget),
            "moderate" => Ok(Self::Moderate),
            "boutique" => Ok(Self::Boutique),
            "hostel" => Ok(Self::Hostel),
            "apartment" => Ok(Self::Apartment),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Dining preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiningPreference {
    FineDining,
    Casual,
    StreetFood,
    LocalCuisine,
    #[default]
    Mixed,
}

impl DiningPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FineDining => "fine_dining",
            Self::Casual => "casual",
            Self::StreetFood => "street_food",
            Self::LocalCuisine => "local_cuisine",
            Self::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for DiningPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiningPreference {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fine_dining" => Ok(Self::FineDining),
            "casual" => Ok(Self::Casual),
            "street_food" => Ok(Self::StreetFood),
            "local_cuisine" => Ok(Self::LocalCuisine),
            "mixed" => Ok(Self::Mixed),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Trip pace, which drives how many activities land on each day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    Relaxed,
    #[default]
    Moderate,
    Fast,
}

impl Pace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relaxed => "relaxed",
            Self::Moderate => "moderate",
            Self::Fast => "fast",
        }
    }

    /// Activities scheduled per day at this pace
    pub fn activities_per_day(self) -> usize {
        match self {
            Self::Relaxed => 2,
            Self::Moderate => 3,
            Self::Fast => 4,
        }
    }
}

impl std::fmt::Display for Pace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Pace {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relaxed" => Ok(Self::Relaxed),
            "moderate" => Ok(Self::Moderate),
            "fast" => Ok(Self::Fast),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Parse error for enumerated preference vocabularies
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// Canonicalized traveler preferences
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreferenceSet {
    pub activities: Vec<ActivityTag>,
    pub accommodation_style: AccommodationStyle,
    pub dining_preference: DiningPreference,
    pub pace: Pace,
}

/// Normalized trip request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSpec {
    pub destination: String,
    pub origin: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travelers: u32,
    pub budget: f64,
    pub preferences: PreferenceSet,
}

impl TripSpec {
    /// Whole days between start and end date
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn spec(start: &str, end: &str) -> TripSpec {
        TripSpec {
            destination: "Paris".to_string(),
            origin: None,
            start_date: NaiveDate::from_str(start).unwrap(),
            end_date: NaiveDate::from_str(end).unwrap(),
            travelers: 2,
            budget: 1500.0,
            preferences: PreferenceSet::default(),
        }
    }

    #[test]
    fn test_duration_days() {
        assert_eq!(spec("2024-06-01", "2024-06-04").duration_days(), 3);
        assert_eq!(spec("2024-06-01", "2024-06-01").duration_days(), 0);
    }

    #[test]
    fn test_activity_tag_round_trip() {
        for tag in ActivityTag::ALL {
            assert_eq!(ActivityTag::from_str(tag.as_str()), Ok(tag));
        }
        assert!(ActivityTag::from_str("skydiving").is_err());
    }

    #[test]
    fn test_enum_defaults() {
        assert_eq!(AccommodationStyle::default(), AccommodationStyle::Moderate);
        assert_eq!(DiningPreference::default(), DiningPreference::Mixed);
        assert_eq!(Pace::default(), Pace::Moderate);
    }

    #[test]
    fn test_pace_activities_per_day() {
        assert_eq!(Pace::Relaxed.activities_per_day(), 2);
        assert_eq!(Pace::Moderate.activities_per_day(), 3);
        assert_eq!(Pace::Fast.activities_per_day(), 4);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&DiningPreference::FineDining).unwrap();
        assert_eq!(json, r#""fine_dining""#);

        let parsed: Pace = serde_json::from_str(r#""relaxed""#).unwrap();
        assert_eq!(parsed, Pace::Relaxed);
    }

    #[test]
    fn test_trip_spec_serde_round_trip() {
        let spec = spec("2024-06-01", "2024-06-04");
        let json = serde_json::to_string(&spec).unwrap();
        let parsed: TripSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }
}
