//! Wharf Core - shared abstractions for resilient resource clients
//!
//! This crate provides the fundamental types every other Wharf crate
//! depends on:
//!
//! - `WharfError` / `ErrorCode` - classified errors with attached context
//! - `Context` - cancellation token plus optional deadline for async calls
//! - `Logger` - an explicitly injected `tracing` dispatcher
//! - `PoolStats` - point-in-time snapshot of a connection pool

mod context;
mod error;
mod logger;
mod pool;

pub use context::*;
pub use error::*;
pub use logger::*;
pub use pool::*;
