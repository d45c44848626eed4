mod chat;
mod template;
mod travel;

pub use chat::{build_payload, OutboundPayload, PayloadStyle, PromptBuilder, DEFAULT_SYSTEM_PROMPT};
pub use template::PromptTemplate;
pub use travel::{TripBrief, TRAVEL_PLAN_SCHEMA};
