//! LLM generation orchestration for the Tripvar travel service.
//!
//! The core types, error taxonomy and retry policy are always available.
//! The HTTP transport (`llm`) and travel planning (`travel`) are feature gated
//! and both enabled by default.
//!
//! ```no_run
//! # #[cfg(feature = "llm")]
//! # async fn demo() -> Result<(), tripvar::TripvarError> {
//! use tripvar::{GenerationRequest, Settings, UserContext};
//! use tripvar::llm::TextGenerationService;
//!
//! let service = TextGenerationService::from_settings(Settings::from_env()?)?;
//! let result = service
//!     .generate(&UserContext::new("user-1"), GenerationRequest::from_prompt("Say hi")?)
//!     .await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub use tripvar_core::*;

pub mod prompt {
    pub use tripvar_prompt::*;
}

#[cfg(feature = "llm")]
pub mod llm {
    pub use tripvar_llm::*;
}

#[cfg(feature = "travel")]
pub mod travel {
    pub use tripvar_travel::*;
}
