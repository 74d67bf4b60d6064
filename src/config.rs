use std::fmt;

use crate::{RelayError, Result};

pub const DEFAULT_CREDENTIAL_VAR: &str = "GEMINI_API_KEY";

/// Where the upstream API key comes from.
///
/// Implementations are consulted on every invocation, so a key that
/// disappears between requests is reported instead of served stale.
pub trait CredentialSource: Send + Sync {
    /// Returns the raw credential, or `None` if it is not configured.
    fn credential(&self) -> Option<String>;
}

/// Reads the credential from an environment variable at call time.
#[derive(Clone, Debug)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_VAR)
    }
}

impl CredentialSource for EnvCredential {
    fn credential(&self) -> Option<String> {
        std::env::var(&self.var).ok()
    }
}

/// A credential handed over explicitly when the handler is built.
#[derive(Clone)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(credential: impl Into<String>) -> Self {
        Self(Some(credential.into()))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticCredential").field(&"<redacted>").finish()
    }
}

impl CredentialSource for StaticCredential {
    fn credential(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Per-invocation configuration resolved from a [`CredentialSource`].
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub credential: String,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Resolves the credential, failing with [`RelayError::Config`] when it is
/// absent or empty. The value is passed through untouched.
pub fn resolve(source: &dyn CredentialSource) -> Result<ResolvedConfig> {
    let credential = source.credential().ok_or_else(|| RelayError::Config {
        reason: "upstream credential is not set".to_owned(),
    })?;
    if credential.is_empty() {
        return Err(RelayError::Config {
            reason: "upstream credential is set but empty".to_owned(),
        });
    }
    Ok(ResolvedConfig { credential })
}
