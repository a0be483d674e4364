//! Retry with pluggable backoff
//!
//! An operation is attempted once, then retried up to `max_attempts` more
//! times with delays taken from a [`Backoff`] strategy. Every wait races the
//! caller's [`Context`](wharf_core::Context).
//!
//! # Example
//!
//! ```ignore
//! use wharf_connection::retry::{ExponentialBackoff, ExponentialBackoffConfig, RetryConfig, retry};
//!
//! let config = RetryConfig::new(3, ExponentialBackoff::new(ExponentialBackoffConfig::default()));
//! let value = retry(&ctx, &config, |ctx| async move { fetch(&ctx).await }).await?;
//! ```

mod backoff;
mod executor;
mod policy;

#[cfg(test)]
mod tests;

pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff, ExponentialBackoffConfig, LinearBackoff};
pub use executor::retry;
pub use policy::{RetryCallback, RetryConfig};
