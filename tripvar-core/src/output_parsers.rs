//! Pulling structured JSON out of chatty model output.
//!
//! Models asked for "only JSON" still wrap it in prose, markdown fences, or
//! several competing drafts. [`ResponseExtractor`] splits the text on fences and
//! accepts the first block that parses as an object carrying every required
//! field, so a malformed or partial draft earlier in the text does not sink an
//! otherwise usable answer.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::{Runnable, StreamEvent, TripvarError};

/// Blocks containing this word are discarded before parsing.
///
/// This is a narrow denoising rule for one model's habit of emitting a
/// "Solution" scratch block next to the real answer. It is not a general JSON
/// detector, and it will wrongly drop a genuine answer whose text contains the
/// word.
pub const SOLUTION_MARKER: &str = "Solution";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug)]
pub struct ResponseExtractor {
    required_fields: Vec<String>,
}

impl ResponseExtractor {
    pub fn new<I, S>(required_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_fields: required_fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    pub fn extract(&self, text: &str) -> Result<Map<String, Value>, TripvarError> {
        let normalized = text.replace("```json", "```");
        let mut last_parse_error = None;

        for (index, block) in normalized.split("```").enumerate() {
            if block.trim().is_empty() {
                continue;
            }
            if block.contains(SOLUTION_MARKER) {
                trace!(block = index, "skipping block with solution marker");
                continue;
            }

            let (Some(start), Some(end)) = (block.find('{'), block.rfind('}')) else {
                continue;
            };
            if end < start {
                continue;
            }

            match serde_json::from_str::<Value>(&block[start..=end]) {
                Ok(Value::Object(object)) => {
                    if let Some(missing) = self
                        .required_fields
                        .iter()
                        .find(|field| !object.contains_key(field.as_str()))
                    {
                        debug!(block = index, missing = %missing, "candidate block incomplete");
                        continue;
                    }
                    debug!(block = index, "accepted candidate block");
                    return Ok(object);
                }
                Ok(_) => continue,
                Err(err) => {
                    trace!(block = index, error = %err, "candidate block is not valid json");
                    last_parse_error = Some(err.to_string());
                }
            }
        }

        Err(TripvarError::Extraction {
            reason: format!(
                "no candidate block contained a JSON object with fields [{}]",
                self.required_fields.join(", ")
            ),
            raw: text.to_string(),
            last_parse_error,
        })
    }

    pub fn extract_as<T: DeserializeOwned>(&self, text: &str) -> Result<T, TripvarError> {
        let object = self.extract(text)?;
        serde_json::from_value(Value::Object(object)).map_err(|err| TripvarError::Extraction {
            reason: format!("accepted object has the wrong shape: {err}"),
            raw: text.to_string(),
            last_parse_error: Some(err.to_string()),
        })
    }
}

/// Parses a `YYYY-MM-DD` string, naming `field` in the error on mismatch.
pub fn parse_date_field(field: &str, value: &Value) -> Result<NaiveDate, TripvarError> {
    let invalid = |detail: String| TripvarError::Extraction {
        reason: format!("field '{field}' is not a YYYY-MM-DD date: {detail}"),
        raw: value.to_string(),
        last_parse_error: None,
    };

    let raw = value
        .as_str()
        .ok_or_else(|| invalid("expected a string".to_string()))?;
    if raw.len() != 10 {
        return Err(invalid(format!("'{raw}'")));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|err| invalid(format!("'{raw}': {err}")))
}

/// Runs a [`ResponseExtractor`] and converts the accepted object into `T`.
#[derive(Clone, Debug)]
pub struct JsonOutputParser<T = Value> {
    extractor: ResponseExtractor,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonOutputParser<T> {
    pub fn new(extractor: ResponseExtractor) -> Self {
        Self {
            extractor,
            _marker: PhantomData,
        }
    }

    pub fn extractor(&self) -> &ResponseExtractor {
        &self.extractor
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send + Sync + 'static> Runnable<String, T>
    for JsonOutputParser<T>
{
    async fn invoke(&self, input: String) -> Result<T, TripvarError> {
        self.extractor.extract_as(&input)
    }

    fn stream(&self, input: String) -> BoxStream<'_, Result<StreamEvent, TripvarError>> {
        futures::stream::once(async move {
            let object = self.extractor.extract(&input)?;
            Ok(StreamEvent::Metadata {
                key: "structured_output".to_string(),
                value: Value::Object(object),
            })
        })
        .boxed()
    }
}
