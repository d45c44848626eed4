use tripvar::prompt::{build_payload, OutboundPayload, PayloadStyle};
use tripvar::{GenerationRequest, RetryPolicy, Settings};

#[test]
fn core_and_prompt_are_reachable_from_the_facade() {
    let request = GenerationRequest::from_prompt("Say hi").expect("request");
    let payload = build_payload(&request, PayloadStyle::Completion).expect("payload");
    assert_eq!(payload, OutboundPayload::Text("Say hi".to_string()));

    let settings = Settings::builder().build().expect("settings");
    assert_eq!(RetryPolicy::from_settings(&settings).max_attempts(), 3);
}

#[cfg(feature = "travel")]
#[test]
fn default_features_expose_services() {
    let settings = Settings::builder().build().expect("settings");
    let planner = tripvar::travel::TravelPlanner::from_settings(settings).expect("planner");
    assert_eq!(
        planner.extractor().required_fields(),
        tripvar::travel::TRAVEL_PLAN_FIELDS
    );
}
