use async_trait::async_trait;
use wharf_core::{BoxError, ErrorContext, PoolStats};

/// Backend-specific primitives a [`ResilientConnection`](super::ResilientConnection)
/// drives: dial a pool, check it, close it, and read its statistics.
///
/// Implementations do not apply timeouts or retries; the wrapper bounds every
/// call with the caller's context.
#[async_trait]
pub trait ResourceDriver: Send + Sync + 'static {
    /// Live pool produced by [`dial`](Self::dial).
    type Handle: Send + Sync + 'static;

    /// Short resource name used in errors and log events ("postgres", "redis").
    fn name(&self) -> &'static str;

    /// Non-secret fields identifying the endpoint, attached to connection
    /// errors (host, database, port, ...).
    fn describe(&self) -> ErrorContext;

    /// Build a new pool. May or may not open a socket.
    async fn dial(&self) -> Result<Self::Handle, BoxError>;

    /// One round trip proving the pool can serve requests.
    async fn ping(&self, handle: &Self::Handle) -> Result<(), BoxError>;

    /// Release every connection held by the pool.
    async fn close(&self, handle: &Self::Handle) -> Result<(), BoxError>;

    fn stats(&self, handle: &Self::Handle) -> PoolStats;

    /// Drop idle connections past their lifetime or idle limits. Returns how
    /// many were removed.
    fn prune_idle(&self, _handle: &Self::Handle) -> usize {
        0
    }

    /// Log the configured pool parameters after a successful connect.
    fn log_pool_params(&self) {}
}
