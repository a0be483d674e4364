//! PostgreSQL resource driver

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use tokio::time::Instant;
use tokio_postgres::NoTls;
use wharf_connection::{ConnectionSettings, ExponentialBackoffConfig, ResourceDriver};
use wharf_core::{BoxError, ErrorContext, IdleLimits, PoolStats, WaitTracker};
use wharf_settings::{DatabaseSettings, SslMode};

use crate::{error, tls};

/// Dials `deadpool-postgres` pools from [`DatabaseSettings`].
pub struct PostgresDriver {
    settings: DatabaseSettings,
}

impl PostgresDriver {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    fn pool_config(&self) -> Config {
        let settings = &self.settings;
        let mut config = Config::new();
        config.host = Some(settings.host.clone());
        config.port = Some(settings.port);
        config.dbname = Some(settings.name.clone());
        config.user = Some(settings.user.clone());
        if !settings.password.is_empty() {
            config.password = Some(settings.password.expose().to_string());
        }
        config.ssl_mode = Some(match settings.ssl_mode {
            SslMode::Disable => deadpool_postgres::SslMode::Disable,
            SslMode::Prefer => deadpool_postgres::SslMode::Prefer,
            SslMode::Require => deadpool_postgres::SslMode::Require,
        });
        config.connect_timeout = Some(settings.query_timeout());
        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool = PoolConfig::new(settings.pool.max_open as usize);
        pool.timeouts = Timeouts {
            wait: None,
            create: Some(settings.query_timeout()),
            recycle: Some(settings.query_timeout()),
        };
        config.pool = Some(pool);
        config
    }

    pub(crate) fn idle_limits(&self) -> IdleLimits {
        let pool = &self.settings.pool;
        IdleLimits {
            max_lifetime: Some(pool.conn_max_lifetime()),
            max_idle_time: Some(pool.conn_max_idle_time()),
            max_idle: Some(pool.max_idle as usize),
        }
    }
}

/// A dialed pool plus its wait accounting.
pub struct PgPool {
    pool: Pool,
    waits: WaitTracker,
}

impl PgPool {
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check a client out of the pool. Acquires that found every
    /// connection busy are counted as waits.
    pub async fn acquire(&self) -> Result<Object, BoxError> {
        let status = self.pool.status();
        let queued = status.available == 0 && status.size >= status.max_size;
        let started = Instant::now();
        let client = self.pool.get().await.map_err(error::pool)?;
        if queued {
            self.waits.record(started.elapsed());
        }
        Ok(client)
    }
}

#[async_trait]
impl ResourceDriver for PostgresDriver {
    type Handle = PgPool;

    fn name(&self) -> &'static str {
        "postgres"
    }

    fn describe(&self) -> ErrorContext {
        ErrorContext::new()
            .with("host", &self.settings.host)
            .with("port", self.settings.port)
            .with("database", &self.settings.name)
            .with("user", &self.settings.user)
    }

    async fn dial(&self) -> Result<PgPool, BoxError> {
        let config = self.pool_config();
        let pool = match self.settings.ssl_mode {
            SslMode::Disable => config.create_pool(Some(Runtime::Tokio1), NoTls)?,
            SslMode::Prefer | SslMode::Require => {
                config.create_pool(Some(Runtime::Tokio1), tls::make_connector()?)?
            }
        };
        Ok(PgPool {
            pool,
            waits: WaitTracker::new(),
        })
    }

    async fn ping(&self, handle: &PgPool) -> Result<(), BoxError> {
        let client = handle.acquire().await?;
        client.simple_query("SELECT 1").await.map_err(error::backend)?;
        Ok(())
    }

    async fn close(&self, handle: &PgPool) -> Result<(), BoxError> {
        handle.pool.close();
        Ok(())
    }

    fn stats(&self, handle: &PgPool) -> PoolStats {
        let status = handle.pool.status();
        PoolStats::from_counts(status.size, status.available, status.max_size, &handle.waits)
    }

    fn prune_idle(&self, handle: &PgPool) -> usize {
        let mut keep = self.idle_limits().retainer();
        handle
            .pool
            .retain(|_, metrics| keep(metrics.age(), metrics.last_used()))
            .removed
            .len()
    }

    fn log_pool_params(&self) {
        let pool = &self.settings.pool;
        tracing::info!(
            max_open = pool.max_open,
            max_idle = pool.max_idle,
            conn_max_lifetime = ?pool.conn_max_lifetime(),
            conn_max_idle_time = ?pool.conn_max_idle_time(),
            "postgres pool parameters"
        );
    }
}

/// Wrapper timing derived from the database settings.
pub fn connection_settings(settings: &DatabaseSettings) -> ConnectionSettings {
    let backoff = &settings.backoff;
    ConnectionSettings::default()
        .with_query_timeout(settings.query_timeout())
        .with_exec_timeout(settings.exec_timeout())
        .with_health_check_period(settings.pool.health_check_period())
        .with_retries(
            backoff.retries,
            ExponentialBackoffConfig {
                min: backoff.min(),
                max: backoff.max(),
                factor: f64::from(backoff.factor),
                jitter: backoff.jitter,
            },
        )
}
