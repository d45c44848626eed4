mod planner;
mod types;
mod validate;

pub use planner::{parse_plan, travel_prompt, TravelPlanner, PLAN_CREATED_MESSAGE, TRAVEL_PLAN_FIELDS};
pub use types::{
    AccommodationType, BudgetLevel, DayPlan, TravelPlan, TravelPlanningRequest,
    TravelPlanningResponse, TravelPreferences, TravelStyle, MAX_INTERESTS, MAX_TRAVELERS,
    MAX_TRIP_DAYS,
};
pub use validate::{validate_plan, validate_plan_for};
