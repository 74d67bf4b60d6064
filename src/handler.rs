use std::fmt;
use std::sync::Arc;

use crate::{
    config::resolve, normalize, validate, CredentialSource, EnvCredential, GeminiCaller,
    HttpReply, IncomingRequest, NormalizedResult, RelayObserver, RelayOptions, Result,
    RetryController, Sleep, StaticCredential, TokioSleep, TracingObserver, UpstreamCaller,
    UpstreamRequest,
};

/// Validates a prompt, resolves the credential, calls upstream with retries
/// and normalizes the outcome.
///
/// All per-invocation state lives on the stack of [`RelayHandler::handle`];
/// one handler can serve concurrent invocations.
pub struct RelayHandler<C = GeminiCaller, S = TokioSleep> {
    caller: C,
    sleeper: S,
    credentials: Arc<dyn CredentialSource>,
    observer: Arc<dyn RelayObserver>,
    options: RelayOptions,
}

impl<C, S> fmt::Debug for RelayHandler<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayHandler")
            .field("credentials", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl RelayHandler {
    /// Creates a handler with a `reqwest` caller and real backoff sleeps.
    pub fn new(options: RelayOptions, credentials: impl CredentialSource + 'static) -> Self {
        Self {
            caller: GeminiCaller::new(options.timeout_ms),
            sleeper: TokioSleep,
            credentials: Arc::new(credentials),
            observer: Arc::new(TracingObserver),
            options,
        }
    }

    /// Creates a handler with an explicit API key.
    pub fn with_api_key(options: RelayOptions, api_key: impl Into<String>) -> Self {
        Self::new(options, StaticCredential::new(api_key))
    }

    /// Creates a handler from environment variables.
    ///
    /// Options come from [`RelayOptions::from_env`]. The API key is read
    /// from `GEMINI_API_KEY` on every invocation, so a missing key surfaces
    /// as a 500 per request rather than failing here.
    pub fn from_env() -> std::result::Result<Self, String> {
        Ok(Self::new(RelayOptions::from_env()?, EnvCredential::default()))
    }
}

impl<C, S> RelayHandler<C, S>
where
    C: UpstreamCaller,
    S: Sleep,
{
    /// Replaces the upstream caller.
    pub fn with_caller<C2: UpstreamCaller>(self, caller: C2) -> RelayHandler<C2, S> {
        RelayHandler {
            caller,
            sleeper: self.sleeper,
            credentials: self.credentials,
            observer: self.observer,
            options: self.options,
        }
    }

    /// Replaces the backoff sleeper.
    pub fn with_sleeper<S2: Sleep>(self, sleeper: S2) -> RelayHandler<C, S2> {
        RelayHandler {
            caller: self.caller,
            sleeper,
            credentials: self.credentials,
            observer: self.observer,
            options: self.options,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RelayObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// Handles one invocation. Never fails; every fault is normalized.
    pub async fn handle(&self, request: &IncomingRequest) -> NormalizedResult {
        let outcome = self.relay(request).await;
        if let Err(err) = &outcome {
            self.observer.on_failure(err);
        }
        normalize(outcome)
    }

    /// Inbound HTTP contract: only `POST` with a JSON `{"prompt": ...}` body.
    pub async fn handle_http(&self, method: &str, body: &[u8]) -> HttpReply {
        if method != "POST" {
            #[cfg(feature = "tracing")]
            tracing::warn!(method, "method not allowed");
            return HttpReply::method_not_allowed();
        }
        let request = IncomingRequest::from_json(body);
        self.handle(&request).await.into_http_reply()
    }

    async fn relay(&self, request: &IncomingRequest) -> Result<String> {
        let prompt = validate(request)?;
        self.observer.on_request(prompt.chars().count());

        let config = resolve(self.credentials.as_ref())?;
        let upstream = UpstreamRequest::new(&self.options, &config, prompt)?;

        RetryController::from_options(&self.options)
            .run(&self.caller, &self.sleeper, self.observer.as_ref(), &upstream)
            .await
    }
}
