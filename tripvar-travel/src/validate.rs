use chrono::Duration;
use tripvar_core::TripvarError;

use crate::{DayPlan, TravelPlan, TravelPreferences};

const OVERVIEW_CHARS: (usize, usize) = (50, 1000);
const ACTIVITY_CHARS: (usize, usize) = (10, 500);
const LOGISTICS_CHARS: (usize, usize) = (10, 200);
const COST_MAX_CHARS: usize = 100;
const NOTES_MAX_CHARS: usize = 500;
const HIGHLIGHTS: (usize, usize) = (1, 10);
const DAYS: (usize, usize) = (1, 30);
const MAX_PACKING_SUGGESTIONS: usize = 20;
const MAX_TRAVEL_TIPS: usize = 10;

/// Checks the day sequence and every length and count bound. Nothing is truncated.
pub fn validate_plan(plan: TravelPlan) -> Result<TravelPlan, TripvarError> {
    check_count("highlights", plan.highlights.len(), HIGHLIGHTS)?;
    check_count("daily_plans", plan.daily_plans.len(), DAYS)?;
    check_count(
        "packing_suggestions",
        plan.packing_suggestions.len(),
        (0, MAX_PACKING_SUGGESTIONS),
    )?;
    check_count("travel_tips", plan.travel_tips.len(), (0, MAX_TRAVEL_TIPS))?;

    for (index, day) in plan.daily_plans.iter().enumerate() {
        let expected = index + 1;
        if day.day as usize != expected {
            return Err(TripvarError::Validation(format!(
                "daily_plans[{index}]: day plans must be in sequence, expected day {expected}, got {}",
                day.day
            )));
        }
    }

    check_chars("overview", &plan.overview, OVERVIEW_CHARS)?;
    if let Some(cost) = &plan.total_estimated_cost {
        check_chars("total_estimated_cost", cost, (0, COST_MAX_CHARS))?;
    }
    for (index, day) in plan.daily_plans.iter().enumerate() {
        check_day(index, day)?;
    }

    Ok(plan)
}

/// [`validate_plan`] plus agreement with the requested trip: one entry per
/// day, dated consecutively from the start date. The day count is checked
/// first.
pub fn validate_plan_for(
    plan: TravelPlan,
    preferences: &TravelPreferences,
) -> Result<TravelPlan, TripvarError> {
    let expected_days = preferences.trip_days();
    let actual_days = plan.daily_plans.len() as i64;
    if actual_days != expected_days {
        return Err(TripvarError::Validation(format!(
            "day count mismatch: the trip is {expected_days} days but the plan covers {actual_days}"
        )));
    }

    let plan = validate_plan(plan)?;

    for (index, day) in plan.daily_plans.iter().enumerate() {
        let expected = preferences.start_date + Duration::days(index as i64);
        if day.date != expected {
            return Err(TripvarError::Validation(format!(
                "daily_plans[{index}].date is {}, expected {expected}",
                day.date
            )));
        }
    }

    Ok(plan)
}

fn check_day(index: usize, day: &DayPlan) -> Result<(), TripvarError> {
    let field = |name: &str| format!("daily_plans[{index}].{name}");

    check_chars(&field("morning"), &day.morning, ACTIVITY_CHARS)?;
    check_chars(&field("afternoon"), &day.afternoon, ACTIVITY_CHARS)?;
    check_chars(&field("evening"), &day.evening, ACTIVITY_CHARS)?;
    check_chars(&field("accommodation"), &day.accommodation, LOGISTICS_CHARS)?;
    check_chars(&field("transportation"), &day.transportation, LOGISTICS_CHARS)?;
    if let Some(cost) = &day.estimated_cost {
        check_chars(&field("estimated_cost"), cost, (0, COST_MAX_CHARS))?;
    }
    if let Some(notes) = &day.notes {
        check_chars(&field("notes"), notes, (0, NOTES_MAX_CHARS))?;
    }
    Ok(())
}

fn check_chars(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), TripvarError> {
    let chars = value.trim().chars().count();
    if (min..=max).contains(&chars) {
        Ok(())
    } else {
        Err(TripvarError::Validation(format!(
            "{field} must be between {min} and {max} characters, got {chars}"
        )))
    }
}

fn check_count(field: &str, count: usize, (min, max): (usize, usize)) -> Result<(), TripvarError> {
    if (min..=max).contains(&count) {
        Ok(())
    } else {
        Err(TripvarError::Validation(format!(
            "{field} must contain between {min} and {max} entries, got {count}"
        )))
    }
}
