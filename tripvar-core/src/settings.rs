use std::fmt;
use std::time::Duration;

use secrecy::SecretString;

use crate::TripvarError;

const DEFAULT_BASE_URL: &str = "http://localhost:1234";
const DEFAULT_MODEL: &str = "llama-3.2-3b-instruct";

/// Connection and retry settings for the completion service.
///
/// Built once by the calling layer and handed to each service; nothing in this
/// workspace reads process-wide configuration on its own.
#[derive(Clone)]
pub struct Settings {
    base_url: String,
    default_model: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    max_retries: usize,
    retry_base_delay: Duration,
    max_connections: usize,
    api_key: Option<SecretString>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };

        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("max_connections", &self.max_connections)
            .field("api_key", &api_key)
            .finish()
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Reads every `LLM_*` variable the builder knows about, falling back to defaults.
    pub fn from_env() -> Result<Self, TripvarError> {
        SettingsBuilder::new()
            .base_url_from_env("LLM_STUDIO_URL")
            .default_model_from_env("DEFAULT_MODEL")
            .request_timeout_from_env("LLM_TIMEOUT")
            .connect_timeout_from_env("LLM_CONNECT_TIMEOUT")
            .max_retries_from_env("LLM_MAX_RETRIES")
            .retry_base_delay_from_env("LLM_RETRY_BASE_DELAY_MS")
            .max_connections_from_env("LLM_MAX_CONNECTIONS")
            .api_key_from_env("LLM_API_KEY")
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn retry_base_delay(&self) -> Duration {
        self.retry_base_delay
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Clone)]
pub struct SettingsBuilder {
    base_url: String,
    default_model: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    max_retries: usize,
    retry_base_delay: Duration,
    max_connections: usize,
    api_key: Option<SecretString>,
    env_error: Option<String>,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            max_connections: 10,
            api_key: None,
            env_error: None,
        }
    }

    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = value.into();
        self
    }

    pub fn default_model(mut self, value: impl Into<String>) -> Self {
        self.default_model = value.into();
        self
    }

    pub fn request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    pub fn max_retries(mut self, value: usize) -> Self {
        self.max_retries = value;
        self
    }

    pub fn retry_base_delay(mut self, value: Duration) -> Self {
        self.retry_base_delay = value;
        self
    }

    pub fn max_connections(mut self, value: usize) -> Self {
        self.max_connections = value;
        self
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.api_key = if value.trim().is_empty() {
            None
        } else {
            Some(SecretString::new(value))
        };
        self
    }

    pub fn base_url_from_env(mut self, var_name: &str) -> Self {
        if let Ok(value) = std::env::var(var_name) {
            self.base_url = value;
        }
        self
    }

    pub fn default_model_from_env(mut self, var_name: &str) -> Self {
        if let Ok(value) = std::env::var(var_name) {
            self.default_model = value;
        }
        self
    }

    pub fn api_key_from_env(self, var_name: &str) -> Self {
        match std::env::var(var_name) {
            Ok(value) => self.api_key(value),
            Err(_) => self,
        }
    }

    pub fn request_timeout_from_env(mut self, var_name: &str) -> Self {
        if let Some(seconds) = self.parse_env::<u64>(var_name) {
            self.request_timeout = Duration::from_secs(seconds);
        }
        self
    }

    pub fn connect_timeout_from_env(mut self, var_name: &str) -> Self {
        if let Some(seconds) = self.parse_env::<u64>(var_name) {
            self.connect_timeout = Duration::from_secs(seconds);
        }
        self
    }

    pub fn max_retries_from_env(mut self, var_name: &str) -> Self {
        if let Some(value) = self.parse_env::<usize>(var_name) {
            self.max_retries = value;
        }
        self
    }

    pub fn retry_base_delay_from_env(mut self, var_name: &str) -> Self {
        if let Some(millis) = self.parse_env::<u64>(var_name) {
            self.retry_base_delay = Duration::from_millis(millis);
        }
        self
    }

    pub fn max_connections_from_env(mut self, var_name: &str) -> Self {
        if let Some(value) = self.parse_env::<usize>(var_name) {
            self.max_connections = value;
        }
        self
    }

    // Remembers the first unparsable variable so `build` can report it.
    fn parse_env<T: std::str::FromStr>(&mut self, var_name: &str) -> Option<T> {
        let raw = std::env::var(var_name).ok()?;
        match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                if self.env_error.is_none() {
                    self.env_error = Some(format!("{var_name} has invalid value '{raw}'"));
                }
                None
            }
        }
    }

    pub fn build(self) -> Result<Settings, TripvarError> {
        if let Some(message) = self.env_error {
            return Err(TripvarError::InvalidConfig(message));
        }

        let base_url = self.base_url.trim().to_string();
        if base_url.is_empty() {
            return Err(TripvarError::InvalidConfig(
                "base_url cannot be empty".to_string(),
            ));
        }
        url::Url::parse(&base_url)
            .map_err(|err| TripvarError::InvalidConfig(format!("invalid base_url: {err}")))?;

        if self.default_model.trim().is_empty() {
            return Err(TripvarError::InvalidConfig(
                "default_model cannot be empty".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(TripvarError::InvalidConfig(
                "max_retries must be greater than 0".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(TripvarError::InvalidConfig(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(TripvarError::InvalidConfig(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout > self.request_timeout {
            return Err(TripvarError::InvalidConfig(
                "connect_timeout cannot exceed request_timeout".to_string(),
            ));
        }

        Ok(Settings {
            base_url,
            default_model: self.default_model,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            max_connections: self.max_connections,
            api_key: self.api_key,
        })
    }
}
