use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use wharf_core::{BoxError, Context, ErrorContext, Logger, PoolStats, Result, WharfError};

use super::driver::ResourceDriver;
use super::health::HealthReport;
use super::monitor;
use super::settings::ConnectionSettings;
use crate::retry::retry;

/// Observable lifecycle state of a [`ResilientConnection`]
///
/// A `connect` still dialing or waiting between retries reports
/// `Disconnected` until it stores its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

enum Slot<H> {
    Disconnected,
    Connecting,
    Connected(Arc<H>),
}

impl<H> Slot<H> {
    fn state(&self) -> ConnectionState {
        match self {
            Slot::Disconnected | Slot::Connecting => ConnectionState::Disconnected,
            Slot::Connected(_) => ConnectionState::Connected,
        }
    }
}

/// Puts an abandoned `Connecting` slot back to `Disconnected` when the
/// connect future is dropped before it finishes.
struct ConnectingGuard<'a, H> {
    slot: &'a RwLock<Slot<H>>,
}

impl<H> Drop for ConnectingGuard<'_, H> {
    fn drop(&mut self) {
        let mut slot = self.slot.write();
        if matches!(*slot, Slot::Connecting) {
            *slot = Slot::Disconnected;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Exec,
    Query,
}

impl Operation {
    fn failed(self, resource: &'static str, context: ErrorContext, source: BoxError) -> WharfError {
        match self {
            Operation::Exec => WharfError::ExecFailed {
                resource,
                context,
                source,
            },
            Operation::Query => WharfError::QueryFailed {
                resource,
                context,
                source,
            },
        }
    }
}

struct Inner<D: ResourceDriver> {
    driver: D,
    settings: ConnectionSettings,
    slot: RwLock<Slot<D::Handle>>,
    /// Serializes `connect` and `close`
    lifecycle: tokio::sync::Mutex<()>,
    logger: RwLock<Logger>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    /// `wait_count` seen by the previous health check
    seen_waits: AtomicU64,
}

/// Connection lifecycle wrapper around a pooled resource.
///
/// Cloning is cheap and every clone shares the same handle, state, and
/// monitor.
pub struct ResilientConnection<D: ResourceDriver> {
    inner: Arc<Inner<D>>,
}

impl<D: ResourceDriver> Clone for ResilientConnection<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: ResourceDriver> fmt::Debug for ResilientConnection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientConnection")
            .field("resource", &self.name())
            .field("state", &self.state())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl<D: ResourceDriver> ResilientConnection<D> {
    /// Build a disconnected wrapper. Nothing is dialed until [`connect`](Self::connect).
    pub fn new(driver: D, settings: ConnectionSettings, logger: Logger) -> Self {
        Self {
            inner: Arc::new(Inner {
                driver,
                settings,
                slot: RwLock::new(Slot::Disconnected),
                lifecycle: tokio::sync::Mutex::new(()),
                logger: RwLock::new(logger),
                monitor: Mutex::new(None),
                seen_waits: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.driver.name()
    }

    pub fn driver(&self) -> &D {
        &self.inner.driver
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    pub fn logger(&self) -> Logger {
        self.inner.logger.read().clone()
    }

    /// Replace the logger used by subsequent calls. A running health monitor
    /// keeps the logger it was started with.
    pub fn set_logger(&self, logger: Logger) {
        *self.inner.logger.write() = logger;
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.slot.read().state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The live pool handle, or `NotConnected`.
    pub fn handle(&self) -> Result<Arc<D::Handle>> {
        match &*self.inner.slot.read() {
            Slot::Connected(handle) => Ok(Arc::clone(handle)),
            _ => Err(WharfError::NotConnected {
                resource: self.name(),
            }),
        }
    }

    /// Dial and verify the pool, retrying with backoff.
    ///
    /// Fails with `AlreadyConnected` without dialing when a handle exists.
    /// Exhaustion or cancellation is reported as `ConnectionFailed` carrying
    /// the endpoint description and retry count.
    pub async fn connect(&self, ctx: &Context) -> Result<()> {
        self.logger().scope(self.connect_inner(ctx)).await
    }

    async fn connect_inner(&self, ctx: &Context) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let name = self.name();
        {
            let mut slot = self.inner.slot.write();
            if matches!(*slot, Slot::Connected(_)) {
                return Err(WharfError::AlreadyConnected { resource: name });
            }
            *slot = Slot::Connecting;
        }
        let _connecting = ConnectingGuard {
            slot: &self.inner.slot,
        };

        let settings = &self.inner.settings;
        let endpoint = self.inner.driver.describe();
        tracing::info!(
            resource = name,
            endpoint = %endpoint,
            max_retries = settings.max_retries,
            "connecting to {}",
            name
        );

        let config = settings.retry_config(name);
        match retry(ctx, &config, |attempt_ctx| self.dial_and_verify(attempt_ctx)).await {
            Ok(handle) => {
                *self.inner.slot.write() = Slot::Connected(Arc::new(handle));
                self.inner.seen_waits.store(0, Ordering::Relaxed);
                self.inner.driver.log_pool_params();
                tracing::info!(resource = name, endpoint = %endpoint, "connected to {}", name);
                Ok(())
            }
            Err(err) => {
                tracing::error!(resource = name, error = %err, "failed to connect to {}", name);
                Err(WharfError::ConnectionFailed {
                    resource: name,
                    context: endpoint.with("max_retries", settings.max_retries),
                    source: Box::new(err),
                })
            }
        }
    }

    /// One attempt: dial, then ping within `query_timeout`. A failed ping
    /// closes the half-open pool.
    async fn dial_and_verify(&self, ctx: Context) -> Result<D::Handle> {
        let driver = &self.inner.driver;
        let name = driver.name();

        let handle = ctx
            .run(driver.dial())
            .await?
            .map_err(|source| WharfError::OpenFailed {
                resource: name,
                source,
            })?;

        let timeout = self.inner.settings.query_timeout;
        let ping_ctx = ctx.with_timeout(timeout);
        let outcome = match ping_ctx.run(driver.ping(&handle)).await {
            Ok(result) => result,
            Err(expired) => Err(Box::new(expired) as BoxError),
        };
        ping_ctx.cancel();

        if let Err(source) = outcome {
            if let Err(close_err) = driver.close(&handle).await {
                tracing::warn!(
                    resource = name,
                    error = %close_err,
                    "failed to close pool after ping failure"
                );
            }
            return Err(WharfError::PingFailed {
                resource: name,
                context: ErrorContext::new().with("timeout", format!("{:?}", timeout)),
                source,
            });
        }

        Ok(handle)
    }

    /// Release the pool. The wrapper is `Disconnected` afterwards even when
    /// the backend reports a close failure, and can be connected again.
    pub async fn close(&self) -> Result<()> {
        self.logger().scope(self.close_inner()).await
    }

    async fn close_inner(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let name = self.name();
        let handle = {
            let mut slot = self.inner.slot.write();
            match mem::replace(&mut *slot, Slot::Disconnected) {
                Slot::Connected(handle) => handle,
                previous => {
                    *slot = previous;
                    return Err(WharfError::NotConnected { resource: name });
                }
            }
        };

        tracing::info!(resource = name, "closing {} connection", name);
        if let Err(source) = self.inner.driver.close(&handle).await {
            tracing::error!(resource = name, error = %source, "failed to close {} connection", name);
            return Err(WharfError::CloseFailed {
                resource: name,
                source,
            });
        }
        tracing::info!(resource = name, "{} connection closed", name);
        Ok(())
    }

    /// Liveness check bounded by `query_timeout`.
    pub async fn ping(&self, ctx: &Context) -> Result<()> {
        let handle = self.handle()?;
        let timeout = self.inner.settings.query_timeout;
        let ping_ctx = ctx.with_timeout(timeout);
        let outcome = ping_ctx.run(self.inner.driver.ping(&handle)).await;
        ping_ctx.cancel();

        let source = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(source)) => source,
            Err(expired) => {
                if let Some(cancelled) = ctx.err() {
                    return Err(cancelled.into());
                }
                Box::new(expired) as BoxError
            }
        };
        Err(WharfError::PingFailed {
            resource: self.name(),
            context: ErrorContext::new().with("timeout", format!("{:?}", timeout)),
            source,
        })
    }

    /// Ping, enforce idle limits, then inspect pool statistics. Saturation
    /// and queued acquires are logged as warnings and do not fail the check.
    pub async fn health_check(&self, ctx: &Context) -> Result<()> {
        self.logger().scope(self.health_check_inner(ctx)).await
    }

    async fn health_check_inner(&self, ctx: &Context) -> Result<()> {
        let name = self.name();
        self.ping(ctx).await?;

        let handle = self.handle()?;
        let pruned = self.inner.driver.prune_idle(&handle);
        if pruned > 0 {
            tracing::debug!(resource = name, pruned, "pruned idle connections");
        }

        let stats = self.inner.driver.stats(&handle);
        if stats.is_saturated() {
            tracing::warn!(
                resource = name,
                in_use = stats.in_use,
                max_open = stats.max_open,
                "connection pool is saturated"
            );
        }
        let previous = self.inner.seen_waits.swap(stats.wait_count, Ordering::Relaxed);
        if stats.wait_count > previous {
            tracing::warn!(
                resource = name,
                wait_count = stats.wait_count,
                new_waits = stats.wait_count - previous,
                wait_duration = ?stats.wait_duration,
                "callers waited for a pooled connection"
            );
        }

        tracing::debug!(
            resource = name,
            open = stats.open,
            idle = stats.idle,
            in_use = stats.in_use,
            "health check passed"
        );
        Ok(())
    }

    /// Ping and classify the round trip for readiness reporting.
    ///
    /// A failed ping yields an `Unhealthy` report rather than an error.
    /// Caller cancellation and a missing handle are still errors.
    pub async fn probe(&self, ctx: &Context) -> Result<HealthReport> {
        let handle = self.handle()?;
        let started = tokio::time::Instant::now();
        let outcome = self.ping(ctx).await;
        let latency = started.elapsed();
        let stats = self.inner.driver.stats(&handle);

        match outcome {
            Ok(()) => Ok(HealthReport::success(
                latency,
                stats,
                &self.inner.settings.thresholds,
            )),
            Err(err) if err.is_cancellation() => Err(err),
            Err(err) => Ok(HealthReport::failure(err.to_string(), stats)),
        }
    }

    /// Pool statistics, zeroed while disconnected.
    pub fn stats(&self) -> PoolStats {
        match self.handle() {
            Ok(handle) => self.inner.driver.stats(&handle),
            Err(_) => PoolStats::default(),
        }
    }

    /// Run a write against the pool under a child context bounded by
    /// `exec_timeout`. Backend failures become `ExecFailed`.
    pub async fn execute_scoped<T, E, F, Fut>(&self, ctx: &Context, statement: &str, op: F) -> Result<T>
    where
        F: FnOnce(Arc<D::Handle>, Context) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let timeout = self.inner.settings.exec_timeout;
        self.scoped(ctx, statement, timeout, Operation::Exec, op)
            .await
    }

    /// Run a read against the pool under a child context bounded by
    /// `query_timeout`. Backend failures become `QueryFailed`.
    pub async fn query_scoped<T, E, F, Fut>(&self, ctx: &Context, statement: &str, op: F) -> Result<T>
    where
        F: FnOnce(Arc<D::Handle>, Context) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let timeout = self.inner.settings.query_timeout;
        self.scoped(ctx, statement, timeout, Operation::Query, op)
            .await
    }

    async fn scoped<T, E, F, Fut>(
        &self,
        ctx: &Context,
        statement: &str,
        timeout: Duration,
        operation: Operation,
        op: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<D::Handle>, Context) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let handle = self.handle()?;
        let op_ctx = ctx.with_timeout(timeout);
        let outcome = op_ctx.run(op(handle, op_ctx.clone())).await;
        op_ctx.cancel();

        let source = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err.into(),
            Err(expired) => {
                if let Some(cancelled) = ctx.err() {
                    return Err(cancelled.into());
                }
                Box::new(expired) as BoxError
            }
        };
        let context = ErrorContext::new()
            .with("statement", statement)
            .with("timeout", format!("{:?}", timeout));
        Err(operation.failed(self.name(), context, source))
    }

    /// Spawn the periodic health check task. It runs until `ctx` is
    /// cancelled.
    ///
    /// Does nothing (beyond logging) when disconnected or when a monitor
    /// started earlier is still running. Must be called inside a Tokio
    /// runtime.
    pub fn start_health_monitor(&self, ctx: &Context) {
        let logger = self.logger();
        logger.in_scope(|| {
            let name = self.name();
            if !self.is_connected() {
                tracing::error!(
                    resource = name,
                    "cannot start health monitor: {} not connected",
                    name
                );
                return;
            }
            if self.inner.settings.health_check_period.is_zero() {
                tracing::error!(
                    resource = name,
                    "cannot start health monitor: health check period must be positive"
                );
                return;
            }

            let mut slot = self.inner.monitor.lock();
            if slot.as_ref().is_some_and(|task| !task.is_finished()) {
                tracing::warn!(resource = name, "health monitor already running");
                return;
            }
            let task = monitor::run(self.clone(), ctx.clone());
            *slot = Some(tokio::spawn(logger.scope(task)));
        });
    }

    /// Whether a health monitor task is alive.
    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
