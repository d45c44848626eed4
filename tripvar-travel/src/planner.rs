use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{Map, Value};
use tracing::{info, Instrument};
use tripvar_core::{
    parse_date_field, GenerationRequest, ResponseExtractor, Runnable, Settings, StreamEvent,
    TripvarError, UserContext,
};
use tripvar_llm::TextGenerationService;
use tripvar_prompt::TripBrief;

use crate::validate::validate_plan_for;
use crate::{TravelPlan, TravelPlanningRequest, TravelPlanningResponse};

/// Fields an extracted object must carry to count as a travel plan.
pub const TRAVEL_PLAN_FIELDS: [&str; 3] = ["overview", "highlights", "daily_plans"];
pub const PLAN_CREATED_MESSAGE: &str = "Travel plan generated successfully";
const PLAN_MAX_TOKENS: u32 = 2000;

/// Renders the planning prompt for a request. Deterministic for equal input.
pub fn travel_prompt(request: &TravelPlanningRequest) -> Result<String, TripvarError> {
    let preferences = &request.preferences;
    let brief = TripBrief {
        days: preferences.trip_days(),
        destination: preferences.destination.clone(),
        start_date: preferences.start_date.to_string(),
        end_date: preferences.end_date.to_string(),
        travelers: preferences.num_travelers,
        budget: preferences.budget.map(|budget| budget.as_str().to_string()),
        interests: preferences.interests.clone(),
        accommodation: preferences
            .accommodation_type
            .map(|kind| kind.as_str().to_string()),
        style: preferences.travel_style.map(|style| style.as_str().to_string()),
        special_requests: request.special_requests.clone(),
    };
    brief.render()
}

/// Pulls a [`TravelPlan`] out of raw model text. Dates are checked field by
/// field so the error names the offending entry.
pub fn parse_plan(extractor: &ResponseExtractor, text: &str) -> Result<TravelPlan, TripvarError> {
    let object = extractor.extract(text)?;
    check_dates(&object)?;
    serde_json::from_value(Value::Object(object)).map_err(|err| TripvarError::Extraction {
        reason: format!("travel plan has the wrong shape: {err}"),
        raw: text.to_string(),
        last_parse_error: Some(err.to_string()),
    })
}

fn check_dates(object: &Map<String, Value>) -> Result<(), TripvarError> {
    let Some(Value::Array(days)) = object.get("daily_plans") else {
        return Ok(());
    };
    for (index, day) in days.iter().enumerate() {
        if let Some(date) = day.get("date") {
            parse_date_field(&format!("daily_plans[{index}].date"), date)?;
        }
    }
    Ok(())
}

/// Prompt, generate, extract, validate.
///
/// Transport failures are retried inside the generation service. Extraction
/// and validation failures are returned on first sight.
#[derive(Clone)]
pub struct TravelPlanner {
    generator: TextGenerationService,
    extractor: ResponseExtractor,
}

impl TravelPlanner {
    pub fn new(generator: TextGenerationService) -> Self {
        Self {
            generator,
            extractor: ResponseExtractor::new(TRAVEL_PLAN_FIELDS),
        }
    }

    pub fn from_settings(settings: Settings) -> Result<Self, TripvarError> {
        Ok(Self::new(TextGenerationService::from_settings(settings)?))
    }

    pub fn extractor(&self) -> &ResponseExtractor {
        &self.extractor
    }

    pub async fn create_travel_plan(
        &self,
        user: &UserContext,
        request: TravelPlanningRequest,
    ) -> Result<TravelPlanningResponse, TripvarError> {
        user.ensure_active()?;
        let span = tracing::info_span!(
            "create_travel_plan",
            user_id = %user.id,
            user_verified = user.is_verified,
            destination = %request.preferences.destination,
            start_date = %request.preferences.start_date,
            end_date = %request.preferences.end_date,
        );
        self.plan(request).instrument(span).await
    }

    async fn plan(
        &self,
        request: TravelPlanningRequest,
    ) -> Result<TravelPlanningResponse, TripvarError> {
        let request = request.normalized();
        request.preferences.validate()?;

        let prompt = travel_prompt(&request)?;
        let generation = GenerationRequest::builder()
            .prompt(prompt)
            .max_tokens(PLAN_MAX_TOKENS)
            .build()?;
        let generated = self.generator.invoke(generation).await?;

        let plan = parse_plan(&self.extractor, &generated.text)?;
        let plan = validate_plan_for(plan, &request.preferences)?;

        info!(num_days = plan.daily_plans.len(), "travel plan generated");
        Ok(TravelPlanningResponse {
            plan,
            message: Some(PLAN_CREATED_MESSAGE.to_string()),
        })
    }
}

#[async_trait]
impl Runnable<TravelPlanningRequest, TravelPlanningResponse> for TravelPlanner {
    async fn invoke(
        &self,
        input: TravelPlanningRequest,
    ) -> Result<TravelPlanningResponse, TripvarError> {
        let span = tracing::info_span!(
            "create_travel_plan",
            destination = %input.preferences.destination,
        );
        self.plan(input).instrument(span).await
    }

    fn stream(
        &self,
        input: TravelPlanningRequest,
    ) -> BoxStream<'_, Result<StreamEvent, TripvarError>> {
        futures::stream::once(async move {
            let response = self.plan(input).await?;
            Ok(StreamEvent::Metadata {
                key: "travel_plan".to_string(),
                value: serde_json::to_value(response)?,
            })
        })
        .boxed()
    }
}
