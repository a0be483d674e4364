//! Redis driver for Wharf
//!
//! [`RedisDriver`] plugs a `deadpool-redis` pool into
//! [`ResilientConnection`](wharf_connection::ResilientConnection), and
//! [`Cache`] exposes the key/value commands services use on top of it.
//! Standalone servers only; cluster mode is not supported.

mod cache;
#[cfg(test)]
mod cache_tests;
mod driver;
#[cfg(test)]
mod driver_tests;

pub use cache::Cache;
pub use driver::{RedisDriver, RedisPool, connection_settings, connection_url};
