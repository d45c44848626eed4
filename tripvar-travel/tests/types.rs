use chrono::NaiveDate;
use serde_json::json;
use tripvar_core::TripvarError;
use tripvar_travel::{
    travel_prompt, AccommodationType, BudgetLevel, TravelPlan, TravelPlanningRequest,
    TravelPreferences, TravelStyle,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn preferences_deserialize_with_defaults() {
    let preferences: TravelPreferences = serde_json::from_value(json!({
        "destination": "Porto",
        "start_date": "2024-05-01",
        "end_date": "2024-05-03",
        "budget": "mid-range",
        "accommodation_type": "guesthouse",
        "travel_style": "cultural"
    }))
    .unwrap();

    assert_eq!(preferences.budget, Some(BudgetLevel::MidRange));
    assert_eq!(preferences.accommodation_type, Some(AccommodationType::Guesthouse));
    assert_eq!(preferences.travel_style, Some(TravelStyle::Cultural));
    assert_eq!(preferences.num_travelers, 1);
    assert_eq!(preferences.trip_days(), 3);
}

#[test]
fn unknown_enum_values_are_rejected() {
    let result = serde_json::from_value::<TravelPreferences>(json!({
        "destination": "Porto",
        "start_date": "2024-05-01",
        "end_date": "2024-05-03",
        "budget": "cheap"
    }));
    assert!(result.is_err());
}

#[test]
fn interests_are_normalized() {
    let mut preferences = TravelPreferences::new("  Porto ", date(2024, 5, 1), date(2024, 5, 1));
    preferences.interests = vec![" Food ".to_string(), "".to_string(), "WINE".to_string()];

    let preferences = preferences.normalized();
    assert_eq!(preferences.destination, "Porto");
    assert_eq!(preferences.interests, vec!["food", "wine"]);
}

#[test]
fn preference_bounds_are_enforced() {
    let base = TravelPreferences::new("Porto", date(2024, 5, 1), date(2024, 5, 3));
    assert!(base.validate().is_ok());

    let mut reversed = base.clone();
    reversed.end_date = date(2024, 4, 30);
    let mut short_name = base.clone();
    short_name.destination = "P".to_string();
    let mut crowd = base.clone();
    crowd.num_travelers = 21;
    let mut nobody = base.clone();
    nobody.num_travelers = 0;
    let mut curious = base.clone();
    curious.interests = (0..11).map(|i| format!("interest {i}")).collect();
    let mut long_trip = base.clone();
    long_trip.end_date = date(2024, 6, 30);

    for preferences in [reversed, short_name, crowd, nobody, curious, long_trip] {
        assert!(matches!(
            preferences.validate(),
            Err(TripvarError::InvalidRequest(_))
        ));
    }
}

#[test]
fn cost_fields_accept_numbers() {
    let plan: TravelPlan = serde_json::from_value(json!({
        "overview": "o",
        "highlights": ["h"],
        "daily_plans": [{
            "day": 1,
            "date": "2024-05-01",
            "morning": "m",
            "afternoon": "a",
            "evening": "e",
            "accommodation": "acc",
            "transportation": "t",
            "estimated_cost": 85
        }],
        "total_estimated_cost": 85.5
    }))
    .unwrap();

    assert_eq!(plan.daily_plans[0].estimated_cost.as_deref(), Some("85"));
    assert_eq!(plan.total_estimated_cost.as_deref(), Some("85.5"));
    assert!(plan.packing_suggestions.is_empty());
}

#[test]
fn prompt_states_trip_length_and_set_preferences_only() {
    let mut preferences = TravelPreferences::new("Kyoto", date(2024, 4, 1), date(2024, 4, 4));
    preferences.budget = Some(BudgetLevel::Luxury);
    preferences.interests = vec!["temples".to_string(), "food".to_string()];
    preferences.num_travelers = 2;
    let request = TravelPlanningRequest::new(preferences).with_special_requests("no early mornings");

    let prompt = travel_prompt(&request).unwrap();
    assert!(prompt.starts_with("Act as a travel planner. Create a 4-day travel plan in JSON format."));
    assert!(prompt.contains("- Dates: 2024-04-01 to 2024-04-04\n"));
    assert!(prompt.contains("- Travelers: 2\n"));
    assert!(prompt.contains("- Budget: luxury\n"));
    assert!(prompt.contains("- Interests: temples, food\n"));
    assert!(prompt.contains("- Special Requests: no early mornings\n"));
    assert!(!prompt.contains("Accommodation:"));
    assert!(!prompt.contains("Style:"));
    assert!(prompt.ends_with(tripvar_prompt::TRAVEL_PLAN_SCHEMA));
}

#[test]
fn prompt_is_byte_identical_across_calls() {
    let request = TravelPlanningRequest::new(TravelPreferences::new(
        "Kyoto",
        date(2024, 4, 1),
        date(2024, 4, 2),
    ));
    assert_eq!(
        travel_prompt(&request).unwrap().as_bytes(),
        travel_prompt(&request).unwrap().as_bytes()
    );
}
