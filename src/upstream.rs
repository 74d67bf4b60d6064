use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{header, Url};

use crate::{
    decode::build_tutor_request, RelayError, RelayOptions, ResolvedConfig, Result,
    UpstreamResponse,
};

/// Formats the `generateContent` endpoint for a model, without the key.
///
/// Example: `("https://host", "m")` → `"https://host/v1beta/models/m:generateContent"`
pub fn generate_content_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim().trim_end_matches('/'),
        model.trim()
    )
}

/// The outbound call, built once per invocation and replayed on each attempt.
#[derive(Clone)]
pub struct UpstreamRequest {
    /// Endpoint with the credential in the `key` query parameter.
    pub url: Url,
    /// `{"contents":[{"parts":[{"text": ...}]}]}`
    pub body: serde_json::Value,
}

impl fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endpoint = self.url.as_str().split('?').next().unwrap_or_default();
        f.debug_struct("UpstreamRequest")
            .field("url", &format_args!("{endpoint}?key=<redacted>"))
            .field("body", &self.body)
            .finish()
    }
}

impl UpstreamRequest {
    /// Interpolates `prompt` into the tutor template and puts the credential
    /// in the target address.
    pub fn new(options: &RelayOptions, config: &ResolvedConfig, prompt: &str) -> Result<Self> {
        let endpoint = generate_content_url(&options.base_url, &options.model);
        let url = Url::parse_with_params(&endpoint, [("key", config.credential.as_str())])
            .map_err(|err| {
                RelayError::Internal(format!("invalid upstream endpoint {endpoint}: {err}"))
            })?;
        let body = serde_json::to_value(build_tutor_request(prompt))
            .map_err(|err| RelayError::Decode(format!("could not encode request: {err}")))?;
        Ok(Self { url, body })
    }
}

/// Issues exactly one outbound call per invocation of [`UpstreamCaller::call`].
///
/// Implementations must not retry; that is the job of
/// [`crate::RetryController`].
pub trait UpstreamCaller: Send + Sync {
    fn call(
        &self,
        request: &UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse>> + Send;
}

/// `reqwest`-backed caller for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiCaller {
    http: reqwest::Client,
    timeout: Duration,
}

impl fmt::Debug for GeminiCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiCaller")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiCaller {
    pub fn new(timeout_ms: u64) -> Self {
        Self::with_client(reqwest::Client::new(), timeout_ms)
    }

    /// Reuses an existing `reqwest::Client` (connection pool, proxies, ...).
    pub fn with_client(http: reqwest::Client, timeout_ms: u64) -> Self {
        Self {
            http,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl UpstreamCaller for GeminiCaller {
    fn call(
        &self,
        request: &UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse>> + Send {
        let builder = self
            .http
            .post(request.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(&request.body);

        async move {
            let response = builder.send().await.map_err(RelayError::transport)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(RelayError::transport)?;
            Ok(UpstreamResponse { status, body })
        }
    }
}
