pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// Configures the upstream endpoint, timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayOptions {
    /// Scheme and host of the generative API, without trailing path.
    pub base_url: String,
    /// Model segment of the `generateContent` path.
    pub model: String,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before the first retry; doubled for each one after.
    pub retry_backoff_ms: u64,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            timeout_ms: 30_000,
            max_retries: 3,
            retry_backoff_ms: 1_000,
        }
    }
}

impl RelayOptions {
    /// Defaults overlaid with environment variables.
    ///
    /// Reads (all optional):
    /// - `GEMINI_BASE_URL`
    /// - `GEMINI_MODEL`
    /// - `GEMINI_TIMEOUT_MS`
    ///
    /// The API key is read separately; see
    /// [`crate::EnvCredential`].
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut options = Self::default();
        if let Some(base_url) = non_empty_var("GEMINI_BASE_URL") {
            options.base_url = base_url;
        }
        if let Some(model) = non_empty_var("GEMINI_MODEL") {
            options.model = model;
        }
        if let Some(timeout) = non_empty_var("GEMINI_TIMEOUT_MS") {
            options.timeout_ms = timeout
                .parse()
                .map_err(|_| format!("GEMINI_TIMEOUT_MS is not a number: {timeout}"))?;
        }
        Ok(options)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
