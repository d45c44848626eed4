use std::collections::HashMap;

use regex::Regex;
use tripvar_core::{TripvarError, Value};

fn placeholder_pattern() -> Result<Regex, TripvarError> {
    Regex::new(r"\{\{\s*(\w+)\s*\}\}").map_err(|e| TripvarError::InvalidConfig(e.to_string()))
}

/// `{{name}}` substitution over JSON values. Strings render bare, everything
/// else renders as compact JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fails with `InvalidRequest` naming the first variable missing from `vars`.
    pub fn render(&self, vars: &HashMap<String, Value>) -> Result<String, TripvarError> {
        let pattern = placeholder_pattern()?;
        if let Some(caps) = pattern
            .captures_iter(&self.template)
            .find(|caps| !vars.contains_key(&caps[1]))
        {
            return Err(TripvarError::InvalidRequest(format!(
                "prompt variable '{}' was not provided",
                &caps[1]
            )));
        }

        let rendered = pattern.replace_all(&self.template, |caps: &regex::Captures| {
            match vars.get(&caps[1]) {
                Some(value) => value
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| value.to_string()),
                None => String::new(),
            }
        });
        Ok(rendered.into_owned())
    }
}
