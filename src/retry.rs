//! Bounded exponential-backoff loop around a single [`UpstreamCaller`].
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Attempting ──► Succeeded
//!     │  ├─────► FailedTerminal
//!     │  └─────► RetryWait ──► Attempting
//! ```
//!
//! Waiting goes through the [`Sleep`] trait so tests can record delays
//! instead of spending wall-clock time.

use std::future::Future;
use std::time::Duration;

use crate::{
    decode::decode_candidate_text, RelayError, RelayObserver, RelayOptions, Result,
    UpstreamCaller, UpstreamRequest, UpstreamResponse,
};

/// Upstream statuses treated as transient: rate limiting and overload.
pub const RETRYABLE_STATUSES: [u16; 2] = [429, 503];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Suspends the current invocation for a backoff delay.
pub trait Sleep: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real wall-clock waiting via `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleep;

impl Sleep for TokioSleep {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// State of one invocation's retry loop.
///
/// `attempt` counts retries already taken, so it stays within
/// `0..=max_retries`.
#[derive(Debug)]
pub enum RetryState {
    Attempting { attempt: usize, delay_ms: u64 },
    RetryWait { attempt: usize, delay_ms: u64 },
    Succeeded { text: String, attempts: usize },
    FailedTerminal(RelayError),
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::FailedTerminal(_))
    }
}

/// Drives [`RetryState`] from the initial attempt to a terminal state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryController {
    max_retries: usize,
    initial_delay_ms: u64,
}

impl RetryController {
    pub fn new(max_retries: usize, initial_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
        }
    }

    pub fn from_options(options: &RelayOptions) -> Self {
        Self::new(options.max_retries, options.retry_backoff_ms)
    }

    pub fn initial_state(&self) -> RetryState {
        RetryState::Attempting {
            attempt: 0,
            delay_ms: self.initial_delay_ms,
        }
    }

    /// Runs attempts strictly in sequence until success or a terminal failure.
    pub async fn run<C, S>(
        &self,
        caller: &C,
        sleeper: &S,
        observer: &dyn RelayObserver,
        request: &UpstreamRequest,
    ) -> Result<String>
    where
        C: UpstreamCaller,
        S: Sleep,
    {
        let mut state = self.initial_state();
        loop {
            state = match self.step(state, caller, sleeper, observer, request).await {
                RetryState::Succeeded { text, attempts } => {
                    observer.on_success(attempts);
                    return Ok(text);
                }
                RetryState::FailedTerminal(err) => return Err(err),
                next => next,
            };
        }
    }

    /// Performs one transition. Terminal states are returned unchanged.
    pub async fn step<C, S>(
        &self,
        state: RetryState,
        caller: &C,
        sleeper: &S,
        observer: &dyn RelayObserver,
        request: &UpstreamRequest,
    ) -> RetryState
    where
        C: UpstreamCaller,
        S: Sleep,
    {
        match state {
            RetryState::Attempting { attempt, delay_ms } => {
                observer.on_attempt(attempt + 1);
                match caller.call(request).await {
                    Ok(response) => self.classify(response, attempt, delay_ms, observer),
                    // Transport faults are not retried.
                    Err(err) => RetryState::FailedTerminal(err),
                }
            }
            RetryState::RetryWait { attempt, delay_ms } => {
                sleeper.sleep(Duration::from_millis(delay_ms)).await;
                RetryState::Attempting {
                    attempt,
                    delay_ms: delay_ms.saturating_mul(2),
                }
            }
            terminal => terminal,
        }
    }

    fn classify(
        &self,
        response: UpstreamResponse,
        attempt: usize,
        delay_ms: u64,
        observer: &dyn RelayObserver,
    ) -> RetryState {
        if response.is_success() {
            return match decode_candidate_text(&response.body) {
                Ok(text) => RetryState::Succeeded {
                    text,
                    attempts: attempt + 1,
                },
                Err(err) => RetryState::FailedTerminal(err),
            };
        }

        observer.on_upstream_error(response.status, &response.body);

        if !is_retryable_status(response.status) {
            return RetryState::FailedTerminal(RelayError::Upstream {
                status: response.status,
                body: response.body,
            });
        }

        if attempt < self.max_retries {
            observer.on_retry(
                attempt + 1,
                response.status,
                Duration::from_millis(delay_ms),
            );
            RetryState::RetryWait {
                attempt: attempt + 1,
                delay_ms,
            }
        } else {
            RetryState::FailedTerminal(RelayError::RetriesExhausted {
                status: response.status,
                attempts: attempt + 1,
            })
        }
    }
}
