mod error;
mod llm;
pub mod output_parsers;
mod retry;
mod runnable;
mod settings;
mod user;

pub use error::{RetryClass, TripvarError};
pub use llm::{
    finish_reason, ChatMessage, GenerationRequest, GenerationRequestBuilder, GenerationResult,
    Role, UsageSource, MAX_TOKENS_LIMIT,
};
pub use output_parsers::{parse_date_field, JsonOutputParser, ResponseExtractor, SOLUTION_MARKER};
pub use retry::{RetryPolicy, Retrying, DEFAULT_LIMITED_RETRIES};
pub use runnable::{Runnable, RunnableExt, StreamEvent};
pub use settings::{Settings, SettingsBuilder};
pub use user::UserContext;

pub type Value = serde_json::Value;
