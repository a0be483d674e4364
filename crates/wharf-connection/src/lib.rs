//! Wharf Connection - retry policies and resilient connection lifecycle
//!
//! - [`retry`]: backoff strategies and the retry orchestrator
//! - [`resilient`]: a generic connection wrapper that dials through the
//!   orchestrator, gates operations on a live handle, and runs an optional
//!   background health monitor

pub mod resilient;
pub mod retry;

pub use resilient::{
    ConnectionSettings, ConnectionState, HealthReport, HealthStatus, HealthThresholds,
    ResilientConnection, ResourceDriver,
};
pub use retry::{
    Backoff, ConstantBackoff, ExponentialBackoff, ExponentialBackoffConfig, LinearBackoff,
    RetryCallback, RetryConfig, retry,
};
