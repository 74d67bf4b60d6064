use serde::Deserialize;

use crate::{RelayError, Result};

/// Inbound payload: `{ "prompt": string }`.
///
/// `prompt` is kept as raw JSON so a wrong type is reported as a validation
/// failure rather than a body-parse failure.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct IncomingRequest {
    #[serde(default)]
    pub prompt: Option<serde_json::Value>,
}

impl IncomingRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(serde_json::Value::String(prompt.into())),
        }
    }

    /// Parses a request body. Anything that is not a JSON object yields an
    /// empty request, which then fails validation.
    pub fn from_json(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

/// Returns the prompt if it is a non-empty string.
pub fn validate(request: &IncomingRequest) -> Result<&str> {
    match &request.prompt {
        Some(serde_json::Value::String(prompt)) if !prompt.is_empty() => Ok(prompt.as_str()),
        _ => Err(RelayError::Validation),
    }
}
