use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tripvar_core::TripvarError;

pub const DESTINATION_CHARS: (usize, usize) = (2, 100);
pub const MAX_INTERESTS: usize = 10;
pub const MAX_TRAVELERS: u32 = 20;
pub const MAX_TRIP_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetLevel {
    Budget,
    MidRange,
    Luxury,
}

impl BudgetLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetLevel::Budget => "budget",
            BudgetLevel::MidRange => "mid-range",
            BudgetLevel::Luxury => "luxury",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccommodationType {
    Hotel,
    Hostel,
    Apartment,
    Resort,
    Guesthouse,
}

impl AccommodationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccommodationType::Hotel => "hotel",
            AccommodationType::Hostel => "hostel",
            AccommodationType::Apartment => "apartment",
            AccommodationType::Resort => "resort",
            AccommodationType::Guesthouse => "guesthouse",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelStyle {
    Relaxed,
    Adventurous,
    Cultural,
    Luxury,
    Budget,
}

impl TravelStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelStyle::Relaxed => "relaxed",
            TravelStyle::Adventurous => "adventurous",
            TravelStyle::Cultural => "cultural",
            TravelStyle::Luxury => "luxury",
            TravelStyle::Budget => "budget",
        }
    }
}

fn default_travelers() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPreferences {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub budget: Option<BudgetLevel>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub accommodation_type: Option<AccommodationType>,
    #[serde(default)]
    pub travel_style: Option<TravelStyle>,
    #[serde(default = "default_travelers")]
    pub num_travelers: u32,
}

impl TravelPreferences {
    pub fn new(destination: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            destination: destination.into(),
            start_date,
            end_date,
            budget: None,
            interests: Vec::new(),
            accommodation_type: None,
            travel_style: None,
            num_travelers: default_travelers(),
        }
    }

    /// Inclusive trip length.
    pub fn trip_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Trims the destination and lower-cases interests, dropping blanks.
    pub fn normalized(mut self) -> Self {
        self.destination = self.destination.trim().to_string();
        self.interests = self
            .interests
            .iter()
            .map(|interest| interest.trim().to_lowercase())
            .filter(|interest| !interest.is_empty())
            .collect();
        self
    }

    pub fn validate(&self) -> Result<(), TripvarError> {
        let destination_chars = self.destination.trim().chars().count();
        let (min, max) = DESTINATION_CHARS;
        if !(min..=max).contains(&destination_chars) {
            return Err(TripvarError::InvalidRequest(format!(
                "destination must be between {min} and {max} characters, got {destination_chars}"
            )));
        }
        if self.end_date < self.start_date {
            return Err(TripvarError::InvalidRequest(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }
        if self.trip_days() > MAX_TRIP_DAYS {
            return Err(TripvarError::InvalidRequest(format!(
                "trip of {} days exceeds the {MAX_TRIP_DAYS}-day planning limit",
                self.trip_days()
            )));
        }
        if self.interests.len() > MAX_INTERESTS {
            return Err(TripvarError::InvalidRequest(format!(
                "at most {MAX_INTERESTS} interests are allowed, got {}",
                self.interests.len()
            )));
        }
        if !(1..=MAX_TRAVELERS).contains(&self.num_travelers) {
            return Err(TripvarError::InvalidRequest(format!(
                "num_travelers must be between 1 and {MAX_TRAVELERS}, got {}",
                self.num_travelers
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPlanningRequest {
    pub preferences: TravelPreferences,
    #[serde(default)]
    pub special_requests: Option<String>,
}

impl TravelPlanningRequest {
    pub fn new(preferences: TravelPreferences) -> Self {
        Self {
            preferences,
            special_requests: None,
        }
    }

    pub fn with_special_requests(mut self, special_requests: impl Into<String>) -> Self {
        self.special_requests = Some(special_requests.into());
        self
    }

    pub fn normalized(self) -> Self {
        Self {
            preferences: self.preferences.normalized(),
            special_requests: self
                .special_requests
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
        }
    }
}

/// Models often answer cost fields with bare numbers; keep them as text.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    pub date: NaiveDate,
    pub morning: String,
    pub afternoon: String,
    pub evening: String,
    pub accommodation: String,
    pub transportation: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub estimated_cost: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPlan {
    pub overview: String,
    pub highlights: Vec<String>,
    pub daily_plans: Vec<DayPlan>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub total_estimated_cost: Option<String>,
    #[serde(default)]
    pub packing_suggestions: Vec<String>,
    #[serde(default)]
    pub travel_tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPlanningResponse {
    pub plan: TravelPlan,
    #[serde(default)]
    pub message: Option<String>,
}
