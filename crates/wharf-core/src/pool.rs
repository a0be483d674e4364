//! Pool statistics types

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a connection pool.
///
/// A disconnected resource reports `PoolStats::default()`, all zeroes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Connections currently open (idle + in use)
    pub open: u64,
    /// Open connections sitting idle in the pool
    pub idle: u64,
    /// Connections checked out by callers
    pub in_use: u64,
    /// Configured upper bound on open connections
    pub max_open: u64,
    /// Total number of acquires that had to wait
    pub wait_count: u64,
    /// Total time spent waiting across those acquires
    pub wait_duration: Duration,
}

impl PoolStats {
    /// Fraction of `max_open` in use, 0.0 when the pool is unbounded or empty.
    pub fn utilization(&self) -> f64 {
        if self.max_open == 0 {
            0.0
        } else {
            self.in_use as f64 / self.max_open as f64
        }
    }

    /// Every allowed connection is checked out.
    pub fn is_saturated(&self) -> bool {
        self.max_open > 0 && self.in_use >= self.max_open
    }

    /// Snapshot from a pool's raw counts. Wait totals come from `waits`.
    pub fn from_counts(
        size: usize,
        available: usize,
        max_size: usize,
        waits: &WaitTracker,
    ) -> Self {
        let mut stats = Self {
            open: size as u64,
            idle: available as u64,
            in_use: size.saturating_sub(available) as u64,
            max_open: max_size as u64,
            ..Default::default()
        };
        waits.fill(&mut stats);
        stats
    }
}

/// Limits enforced on idle pooled connections during a health check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleLimits {
    /// Close connections opened longer ago than this
    pub max_lifetime: Option<Duration>,
    /// Close connections unused for longer than this
    pub max_idle_time: Option<Duration>,
    /// Keep at most this many idle connections
    pub max_idle: Option<usize>,
}

impl IdleLimits {
    /// Whether an idle connection of `age`, unused for `idle_for`, should be
    /// closed when `kept` idle connections have already been kept.
    pub fn should_drop(&self, age: Duration, idle_for: Duration, kept: usize) -> bool {
        self.max_lifetime.is_some_and(|max| age > max)
            || self.max_idle_time.is_some_and(|max| idle_for > max)
            || self.max_idle.is_some_and(|max| kept >= max)
    }

    /// Keep predicate for one pass over a pool's idle set, called with each
    /// connection's age and idle time. Returns `false` for connections to drop.
    pub fn retainer(self) -> impl FnMut(Duration, Duration) -> bool {
        let mut kept = 0usize;
        move |age, idle_for| {
            if self.should_drop(age, idle_for, kept) {
                false
            } else {
                kept += 1;
                true
            }
        }
    }
}

/// Running totals of acquires that had to queue for a connection.
///
/// Client pools report how many callers are waiting right now but not how
/// many ever waited, so drivers feed this from their acquire path.
#[derive(Debug, Default)]
pub struct WaitTracker {
    count: AtomicU64,
    nanos: AtomicU64,
}

impl WaitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one acquire that waited `waited`.
    pub fn record(&self, waited: Duration) {
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    /// Copy the totals into `stats`.
    pub fn fill(&self, stats: &mut PoolStats) {
        stats.wait_count = self.count();
        stats.wait_duration = self.total();
    }
}
