//! Health classification for readiness probes

use std::time::Duration;

use serde::{Deserialize, Serialize};
use wharf_core::PoolStats;

/// Health of a resource as seen by a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Ping answered within the healthy threshold
    #[default]
    Healthy,
    /// Ping answered, but slowly
    Degraded,
    /// Ping failed or was very slow
    Unhealthy,
}

impl HealthStatus {
    pub fn from_latency(latency: Duration, thresholds: &HealthThresholds) -> Self {
        if latency <= thresholds.healthy {
            HealthStatus::Healthy
        } else if latency <= thresholds.degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// `Healthy` and `Degraded` can still serve traffic.
    pub fn is_usable(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Latency bounds for [`HealthStatus`] classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthThresholds {
    pub healthy: Duration,
    /// Above this a successful ping still counts as unhealthy
    pub degraded: Duration,
}

impl HealthThresholds {
    pub fn new(healthy: Duration, degraded: Duration) -> Self {
        Self {
            healthy,
            degraded: degraded.max(healthy),
        }
    }
}

impl Default for HealthThresholds {
    /// healthy <= 100ms, degraded <= 500ms
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_millis(500))
    }
}

/// Outcome of [`ResilientConnection::probe`](super::ResilientConnection::probe)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Ping round trip, `None` when the ping failed
    pub latency: Option<Duration>,
    pub stats: PoolStats,
    /// Classified failure message, never backend text
    pub error: Option<String>,
}

impl HealthReport {
    pub fn success(latency: Duration, stats: PoolStats, thresholds: &HealthThresholds) -> Self {
        Self {
            status: HealthStatus::from_latency(latency, thresholds),
            latency: Some(latency),
            stats,
            error: None,
        }
    }

    pub fn failure(error: String, stats: PoolStats) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency: None,
            stats,
            error: Some(error),
        }
    }
}
