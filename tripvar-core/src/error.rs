use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TripvarError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Upstream error (status={status:?}): {message}")]
    Upstream {
        /// `None` when the upstream answered 2xx but produced no usable output.
        status: Option<u16>,
        message: String,
    },
    #[error("Parsing failed on output '{output}': {reason}")]
    Parse { output: String, reason: String },
    #[error("Extraction failed: {reason}")]
    Extraction {
        reason: String,
        raw: String,
        last_parse_error: Option<String>,
    },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// How the retry policy treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Network faults, timeouts, 5xx and 429.
    Transient,
    /// Truncated bodies and empty outputs: retried only a small, separate number of times.
    Limited,
    /// Everything else propagates on first sight.
    Fatal,
}

impl TripvarError {
    pub fn empty_output(context: impl Into<String>) -> Self {
        TripvarError::Upstream {
            status: None,
            message: format!("empty output from {}", context.into()),
        }
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            TripvarError::Network(_) | TripvarError::Timeout(_) => RetryClass::Transient,
            TripvarError::Upstream {
                status: Some(status),
                ..
            } => {
                if *status == 429 || (500..600).contains(status) {
                    RetryClass::Transient
                } else {
                    RetryClass::Fatal
                }
            }
            TripvarError::Upstream { status: None, .. } | TripvarError::Parse { .. } => {
                RetryClass::Limited
            }
            TripvarError::InvalidRequest(_)
            | TripvarError::Extraction { .. }
            | TripvarError::Validation(_)
            | TripvarError::InvalidConfig(_)
            | TripvarError::Serde(_) => RetryClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_class() != RetryClass::Fatal
    }

    /// True for faults the caller caused; the web layer maps these to 4xx.
    pub fn is_client_fault(&self) -> bool {
        match self {
            TripvarError::InvalidRequest(_) => true,
            TripvarError::Upstream {
                status: Some(status),
                ..
            } => (400..500).contains(status) && *status != 429,
            _ => false,
        }
    }
}
