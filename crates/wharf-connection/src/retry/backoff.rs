//! Backoff strategies for retry delays
//!
//! All strategies are stateless: `next_delay` depends only on the attempt
//! index, so a single strategy can be shared across tasks.

use std::fmt::Debug;
use std::time::Duration;

use rand::Rng;

/// Computes the wait before retry number `attempt` (0-based).
pub trait Backoff: Send + Sync + Debug {
    fn next_delay(&self, attempt: u32) -> Duration;

    /// Clear any per-sequence state. No-op for the built-in strategies.
    fn reset(&self) {}
}

const FALLBACK_DELAY: Duration = Duration::from_secs(1);

/// The same delay before every retry.
#[derive(Debug, Clone)]
pub struct ConstantBackoff {
    delay: Duration,
}

impl ConstantBackoff {
    /// A zero delay falls back to one second.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: if delay.is_zero() { FALLBACK_DELAY } else { delay },
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Backoff for ConstantBackoff {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// `increment * (attempt + 1)`, capped at `max`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    increment: Duration,
    max: Duration,
}

impl LinearBackoff {
    /// A zero increment falls back to one second, and `max` is raised to at
    /// least `increment`.
    pub fn new(increment: Duration, max: Duration) -> Self {
        let increment = if increment.is_zero() {
            FALLBACK_DELAY
        } else {
            increment
        };
        Self {
            increment,
            max: max.max(increment),
        }
    }

    pub fn increment(&self) -> Duration {
        self.increment
    }

    pub fn max_delay(&self) -> Duration {
        self.max
    }
}

impl Backoff for LinearBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        self.increment
            .saturating_mul(attempt.saturating_add(1))
            .min(self.max)
    }
}

/// Parameters for [`ExponentialBackoff`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoffConfig {
    /// Delay before the first retry
    pub min: Duration,
    /// Upper bound before jitter is applied
    pub max: Duration,
    /// Growth per attempt
    pub factor: f64,
    /// Scale each delay by a random factor in `[0.5, 1.5)`
    pub jitter: bool,
}

impl Default for ExponentialBackoffConfig {
    /// Defaults: 500ms min, 30s max, factor 2.0, jitter on
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: true,
        }
    }
}

/// Exponential backoff with optional jitter.
///
/// The delay for attempt `n` is `min * factor^n`, clamped to `[min, max]`.
/// With jitter enabled the clamped value is multiplied by a fresh uniform
/// value in `[0.5, 1.5)`, so observed delays may exceed `max` by up to half.
///
/// ```
/// use std::time::Duration;
/// use wharf_connection::retry::{Backoff, ExponentialBackoff, ExponentialBackoffConfig};
///
/// let backoff = ExponentialBackoff::new(ExponentialBackoffConfig {
///     min: Duration::from_secs(1),
///     max: Duration::from_secs(30),
///     factor: 2.0,
///     jitter: false,
/// });
/// assert_eq!(backoff.next_delay(3), Duration::from_secs(8));
/// assert_eq!(backoff.next_delay(10), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Zero `min`/`max` take the defaults, a non-positive factor becomes 2.0,
    /// a factor below 1.0 becomes 1.0, and `max` is raised to at least `min`.
    pub fn new(config: ExponentialBackoffConfig) -> Self {
        let defaults = ExponentialBackoffConfig::default();
        let min = if config.min.is_zero() {
            defaults.min
        } else {
            config.min
        };
        let max = if config.max.is_zero() {
            defaults.max
        } else {
            config.max
        };
        let factor = if config.factor.is_nan() || config.factor <= 0.0 {
            defaults.factor
        } else {
            config.factor.max(1.0)
        };

        Self {
            min,
            max: max.max(min),
            factor,
            jitter: config.jitter,
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min
    }

    pub fn max_delay(&self) -> Duration {
        self.max
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn has_jitter(&self) -> bool {
        self.jitter
    }

    /// Delay before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.min.as_secs_f64() * self.factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map_or(self.max, |delay| delay.clamp(self.min, self.max))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(ExponentialBackoffConfig::default())
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.jitter {
            let scale: f64 = rand::thread_rng().gen_range(0.5..1.5);
            Duration::try_from_secs_f64(delay.as_secs_f64() * scale).unwrap_or(Duration::MAX)
        } else {
            delay
        }
    }
}
