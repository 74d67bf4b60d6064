use crate::types::{
    CONFIG_INCOMPLETE_MESSAGE, EMPTY_OUTPUT_MESSAGE, INTERNAL_ERROR_MESSAGE, OVERLOADED_MESSAGE,
    PROMPT_REQUIRED_MESSAGE, UPSTREAM_FAILURE_MESSAGE,
};

/// Error type returned by this crate.
///
/// `Display` is meant for logs. What the client gets is
/// [`RelayError::client_message`], which never carries upstream text.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The incoming payload has no usable `prompt`.
    #[error("invalid request: prompt is missing or empty")]
    Validation,
    /// The upstream credential could not be resolved.
    #[error("configuration error: {reason}")]
    Config { reason: String },
    /// Every attempt hit a retryable status.
    #[error("upstream overloaded: status {status} after {attempts} attempts")]
    RetriesExhausted { status: u16, attempts: usize },
    /// Non-retryable, non-success upstream status.
    ///
    /// `body` is only handed to the observer; it is left out of `Display`.
    #[error("upstream error {status}")]
    Upstream { status: u16, body: String },
    /// Upstream succeeded but produced no candidate text.
    #[error("upstream returned no candidates")]
    EmptyOutput,
    /// Network or request execution error from `reqwest`, URL stripped.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Response decoding or request encoding error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Any other fault while building or issuing the outbound call.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Wraps a `reqwest` error, dropping the URL since it carries the API key.
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        Self::Transport(err.without_url())
    }

    /// HTTP status the transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::RetriesExhausted { .. } => 503,
            Self::Upstream { status, .. } => *status,
            Self::Config { .. }
            | Self::EmptyOutput
            | Self::Transport(_)
            | Self::Decode(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Fixed, client-safe message for this failure kind.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::Validation => PROMPT_REQUIRED_MESSAGE,
            Self::Config { .. } => CONFIG_INCOMPLETE_MESSAGE,
            Self::RetriesExhausted { .. } => OVERLOADED_MESSAGE,
            Self::Upstream { .. } => UPSTREAM_FAILURE_MESSAGE,
            Self::EmptyOutput => EMPTY_OUTPUT_MESSAGE,
            Self::Transport(_) | Self::Decode(_) | Self::Internal(_) => INTERNAL_ERROR_MESSAGE,
        }
    }
}
