//! `gemini-relay` is a server-side relay for the Gemini `generateContent` API.
//!
//! A client sends `{"prompt": "..."}`; the relay wraps it in a tutor
//! instruction, attaches the API key the client never sees, retries
//! transient overload with exponential backoff and answers with either
//! `{"response": "..."}` or a fixed `{"error": "..."}`.
//!
//! Entry points:
//! - [`RelayHandler::handle`]
//! - [`RelayHandler::handle_http`]

mod config;
mod decode;
mod error;
mod handler;
mod normalize;
mod observe;
mod options;
mod retry;
mod types;
mod upstream;
mod validate;
mod wire;

pub use config::{
    resolve, CredentialSource, EnvCredential, ResolvedConfig, StaticCredential,
    DEFAULT_CREDENTIAL_VAR,
};
pub use error::RelayError;
pub use handler::RelayHandler;
pub use normalize::normalize;
pub use observe::{NoopObserver, RelayObserver, TracingObserver};
pub use options::{RelayOptions, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use retry::{
    is_retryable_status, RetryController, RetryState, Sleep, TokioSleep, RETRYABLE_STATUSES,
};
pub use types::{
    HttpReply, NormalizedResult, UpstreamResponse, CONFIG_INCOMPLETE_MESSAGE,
    EMPTY_OUTPUT_MESSAGE, INTERNAL_ERROR_MESSAGE, METHOD_NOT_ALLOWED_MESSAGE, OVERLOADED_MESSAGE,
    PROMPT_REQUIRED_MESSAGE, UPSTREAM_FAILURE_MESSAGE,
};
pub use upstream::{generate_content_url, GeminiCaller, UpstreamCaller, UpstreamRequest};
pub use validate::{validate, IncomingRequest};

pub type Result<T> = std::result::Result<T, RelayError>;
