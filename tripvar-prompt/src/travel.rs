use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tripvar_core::{TripvarError, Value};

use crate::PromptTemplate;

/// The object shape the model is told to return, verbatim.
pub const TRAVEL_PLAN_SCHEMA: &str = r#"{
  "overview": "string",
  "highlights": ["string"],
  "daily_plans": [{
    "day": number,
    "date": "YYYY-MM-DD",
    "morning": "string",
    "afternoon": "string",
    "evening": "string",
    "accommodation": "string",
    "transportation": "string",
    "estimated_cost": "string",
    "notes": "string"
  }],
  "total_estimated_cost": "string",
  "packing_suggestions": ["string"],
  "travel_tips": ["string"]
}"#;

const HEADER: &str = "Act as a travel planner. Create a {{days}}-day travel plan in JSON format.
\nPREFERENCES:
- Destination: {{destination}}
- Dates: {{start_date}} to {{end_date}}
- Travelers: {{travelers}}";

const INSTRUCTIONS: &str =
    "\nINSTRUCTIONS:\n1. Return ONLY a valid JSON object with the following structure:";

/// Preference values already reduced to the strings that appear in the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripBrief {
    pub days: i64,
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    pub travelers: u32,
    pub budget: Option<String>,
    pub interests: Vec<String>,
    pub accommodation: Option<String>,
    pub style: Option<String>,
    pub special_requests: Option<String>,
}

impl TripBrief {
    /// Only preferences that are set get a line; the schema block is always last.
    pub fn render(&self) -> Result<String, TripvarError> {
        let vars: HashMap<String, Value> = [
            ("days", Value::from(self.days)),
            ("destination", Value::from(self.destination.as_str())),
            ("start_date", Value::from(self.start_date.as_str())),
            ("end_date", Value::from(self.end_date.as_str())),
            ("travelers", Value::from(self.travelers)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        let mut parts = vec![PromptTemplate::new(HEADER).render(&vars)?];

        let interests = (!self.interests.is_empty()).then(|| self.interests.join(", "));
        let optional = [
            ("Budget", self.budget.as_deref()),
            ("Interests", interests.as_deref()),
            ("Accommodation", self.accommodation.as_deref()),
            ("Style", self.style.as_deref()),
            ("Special Requests", self.special_requests.as_deref()),
        ];
        parts.extend(
            optional
                .into_iter()
                .filter_map(|(label, value)| {
                    value
                        .filter(|value| !value.trim().is_empty())
                        .map(|value| format!("- {label}: {value}"))
                }),
        );

        parts.push(INSTRUCTIONS.to_string());
        parts.push(TRAVEL_PLAN_SCHEMA.to_string());
        Ok(parts.join("\n"))
    }
}
