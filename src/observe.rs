//! Diagnostic hooks invoked at fixed points of an invocation.
//!
//! The handler never logs directly. It reports to a [`RelayObserver`], and
//! [`TracingObserver`] turns those reports into `tracing` events when the
//! `tracing` feature is enabled.

use std::time::Duration;

use crate::RelayError;

/// Receives diagnostic events from the relay. Every hook defaults to a no-op.
pub trait RelayObserver: Send + Sync {
    /// A request passed validation.
    fn on_request(&self, _prompt_chars: usize) {}

    /// Attempt number `attempt` (1-based) is about to be sent.
    fn on_attempt(&self, _attempt: usize) {}

    /// A retryable status was seen; the next attempt follows after `delay`.
    fn on_retry(&self, _attempt: usize, _status: u16, _delay: Duration) {}

    /// Upstream answered with a non-success status. This is the only place
    /// the raw upstream body is exposed.
    fn on_upstream_error(&self, _status: u16, _body: &str) {}

    /// The invocation produced text after `attempts` calls.
    fn on_success(&self, _attempts: usize) {}

    /// The invocation ended in a failure.
    fn on_failure(&self, _error: &RelayError) {}
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl RelayObserver for NoopObserver {}

/// Emits `tracing` events; silent when the `tracing` feature is off.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
impl RelayObserver for TracingObserver {
    fn on_request(&self, prompt_chars: usize) {
        #[cfg(feature = "tracing")]
        tracing::info!(prompt_chars, "relaying prompt");
    }

    fn on_attempt(&self, attempt: usize) {
        #[cfg(feature = "tracing")]
        tracing::debug!(attempt, "sending generateContent request");
    }

    fn on_retry(&self, attempt: usize, status: u16, delay: Duration) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            attempt,
            status,
            delay_ms = delay.as_millis() as u64,
            "upstream overloaded, retrying"
        );
    }

    fn on_upstream_error(&self, status: u16, body: &str) {
        #[cfg(feature = "tracing")]
        tracing::error!(status, body, "upstream returned an error");
    }

    fn on_success(&self, attempts: usize) {
        #[cfg(feature = "tracing")]
        tracing::info!(attempts, "upstream response relayed");
    }

    fn on_failure(&self, error: &RelayError) {
        #[cfg(feature = "tracing")]
        match error {
            RelayError::Validation => tracing::warn!(%error, "rejected request"),
            _ => tracing::error!(status = error.status_code(), %error, "relay failed"),
        };
    }
}
