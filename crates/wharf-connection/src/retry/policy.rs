use std::fmt;
use std::sync::Arc;

use wharf_core::{Result, WharfError};

use super::backoff::{Backoff, ExponentialBackoff, ExponentialBackoffConfig};

/// Called with the 0-based attempt index and its error for every failed
/// attempt that has a retry left, before the context is checked and the wait.
pub type RetryCallback = Arc<dyn Fn(u32, &WharfError) + Send + Sync>;

/// Retry policy for [`retry`](super::retry).
#[derive(Clone, Default)]
pub struct RetryConfig {
    /// Retries after the first attempt; exhaustion makes `max_attempts + 1` calls
    pub max_attempts: u32,
    /// Required. A config without a strategy is rejected before any attempt.
    pub strategy: Option<Arc<dyn Backoff>>,
    pub on_retry: Option<RetryCallback>,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, strategy: impl Backoff + 'static) -> Self {
        Self {
            max_attempts,
            strategy: Some(Arc::new(strategy)),
            on_retry: None,
        }
    }

    /// Exponential policy that logs a warning on every retry of `resource`.
    pub fn logged(resource: &'static str, max_attempts: u32, backoff: ExponentialBackoffConfig) -> Self {
        Self::new(max_attempts, ExponentialBackoff::new(backoff)).with_on_retry(
            move |attempt, err| {
                tracing::warn!(
                    resource,
                    attempt = attempt + 1,
                    max_attempts,
                    error = %err,
                    "{} operation retry",
                    resource
                );
            },
        )
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn Backoff>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_on_retry(mut self, on_retry: impl Fn(u32, &WharfError) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }

    /// Check the policy and hand back its strategy.
    pub fn validate(&self) -> Result<&dyn Backoff> {
        self.strategy
            .as_deref()
            .ok_or_else(|| WharfError::RetryConfig("a backoff strategy is required".to_string()))
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("strategy", &self.strategy)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<callback>"))
            .finish()
    }
}
