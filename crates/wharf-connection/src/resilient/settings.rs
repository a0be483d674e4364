use std::time::Duration;

use crate::retry::{ExponentialBackoffConfig, RetryConfig};

use super::health::HealthThresholds;

/// Timing knobs for a [`ResilientConnection`](super::ResilientConnection).
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Bound for pings and read queries
    pub query_timeout: Duration,
    /// Bound for writes
    pub exec_timeout: Duration,
    /// Interval between background health checks
    pub health_check_period: Duration,
    /// Connect retries after the first attempt
    pub max_retries: u32,
    pub backoff: ExponentialBackoffConfig,
    /// Latency classes used by `probe`
    pub thresholds: HealthThresholds,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
            exec_timeout: Duration::from_secs(5),
            health_check_period: Duration::from_secs(60),
            max_retries: 7,
            backoff: ExponentialBackoffConfig {
                min: Duration::from_millis(200),
                max: Duration::from_secs(15),
                factor: 2.0,
                jitter: true,
            },
            thresholds: HealthThresholds::default(),
        }
    }
}

impl ConnectionSettings {
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn with_health_check_period(mut self, period: Duration) -> Self {
        self.health_check_period = period;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: ExponentialBackoffConfig) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Connect policy for `resource`: exponential backoff, warn on each retry.
    pub fn retry_config(&self, resource: &'static str) -> RetryConfig {
        RetryConfig::logged(resource, self.max_retries, self.backoff.clone())
    }
}
