//! Bounded exponential backoff around a single inference call.

use std::sync::Arc;
use std::time::Duration;

use super::{InferenceClient, InferenceOutput};
use crate::chunker::ChunkPayload;
use crate::error::InferenceError;
use crate::model::AnalysisKind;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Emitted before each backoff sleep.
#[derive(Debug)]
pub struct RetryNotice<'a> {
    /// The attempt that just failed (1-based).
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub error: &'a InferenceError,
}

/// Callback handed down to the invoker by callers that cannot be generic.
pub type RetryObserver<'o> = &'o mut (dyn for<'n> FnMut(&RetryNotice<'n>) + Send + 'o);

impl std::fmt::Display for RetryNotice<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rate limited (attempt {}/{}), retrying in {:.1}s",
            self.attempt,
            self.max_attempts,
            self.delay.as_secs_f64()
        )
    }
}

/// Wraps an [`InferenceClient`] and retries rate-limit failures.
///
/// Every other error is returned from the first attempt. Retries are only
/// reported through the observer; job state is left to the caller.
#[derive(Clone)]
pub struct RetryingInvoker {
    client: Arc<dyn InferenceClient>,
    policy: RetryPolicy,
}

impl RetryingInvoker {
    pub fn new(client: Arc<dyn InferenceClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn invoke<F>(
        &self,
        kind: AnalysisKind,
        payload: &ChunkPayload,
        model: &str,
        mut observer: F,
    ) -> Result<InferenceOutput, InferenceError>
    where
        F: FnMut(&RetryNotice<'_>),
    {
        let mut attempt = 1;
        loop {
            match self.client.call(kind, payload, model).await {
                Ok(output) => return Ok(output),
                Err(error) if error.is_rate_limit() && attempt < self.policy.max_attempts => {
                    let notice = RetryNotice {
                        attempt,
                        max_attempts: self.policy.max_attempts,
                        delay: self.policy.delay_for(attempt),
                        error: &error,
                    };
                    tracing::warn!(%kind, model, "{}: {}", notice, error);
                    observer(&notice);
                    tokio::time::sleep(notice.delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_rate_limit() {
                        tracing::error!(
                            attempts = attempt,
                            "Giving up after repeated rate limiting: {}",
                            error
                        );
                    }
                    return Err(error);
                }
            }
        }
    }
}
