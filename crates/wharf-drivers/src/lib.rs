//! Wharf Drivers - resource driver implementations
//!
//! Concrete [`ResourceDriver`]s for the backends Wharf services depend on,
//! each behind a cargo feature.

#[cfg(feature = "postgres")]
pub use wharf_driver_postgres as postgres;
#[cfg(feature = "redis")]
pub use wharf_driver_redis as redis;

/// Re-export commonly used types from the core crates
pub use wharf_connection::{ConnectionState, HealthReport, HealthStatus, ResilientConnection, ResourceDriver};
pub use wharf_core::{Context, Logger, PoolStats, Result, WharfError};
