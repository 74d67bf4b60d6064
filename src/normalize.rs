use serde_json::json;

use crate::{types::METHOD_NOT_ALLOWED_MESSAGE, HttpReply, NormalizedResult, Result};

/// Maps a terminal outcome to the value handed to the transport layer.
///
/// Failure messages come from [`crate::RelayError::client_message`], so
/// upstream error bodies never reach the client.
pub fn normalize(outcome: Result<String>) -> NormalizedResult {
    match outcome {
        Ok(text) => NormalizedResult::Success { text },
        Err(err) => NormalizedResult::Failure {
            status_code: err.status_code(),
            message: err.client_message().to_owned(),
        },
    }
}

impl NormalizedResult {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::Failure { status_code, .. } => *status_code,
        }
    }

    /// `{"response": text}` on success, `{"error": message}` otherwise.
    pub fn into_http_reply(self) -> HttpReply {
        match self {
            Self::Success { text } => HttpReply {
                status: 200,
                body: json!({ "response": text }),
            },
            Self::Failure {
                status_code,
                message,
            } => HttpReply {
                status: status_code,
                body: json!({ "error": message }),
            },
        }
    }
}

impl HttpReply {
    pub fn method_not_allowed() -> Self {
        Self {
            status: 405,
            body: json!({ "error": METHOD_NOT_ALLOWED_MESSAGE }),
        }
    }
}
