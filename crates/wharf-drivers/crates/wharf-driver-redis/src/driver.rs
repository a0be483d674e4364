//! Redis resource driver

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime, Timeouts};
use redis::RedisResult;
use tokio::time::Instant;
use wharf_connection::{ConnectionSettings, ExponentialBackoffConfig, ResourceDriver};
use wharf_core::{BoxError, ErrorContext, IdleLimits, PoolStats, WaitTracker};
use wharf_settings::RedisSettings;

/// Dials `deadpool-redis` pools from [`RedisSettings`].
pub struct RedisDriver {
    settings: RedisSettings,
}

impl RedisDriver {
    pub fn new(settings: RedisSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }

    fn pool_config(&self) -> Config {
        let mut config = Config::from_url(connection_url(&self.settings));
        let mut pool = PoolConfig::new(self.settings.pool.max_active as usize);
        pool.timeouts = Timeouts {
            wait: None,
            create: Some(self.settings.query_timeout()),
            recycle: Some(self.settings.query_timeout()),
        };
        config.pool = Some(pool);
        config
    }

    pub(crate) fn idle_limits(&self) -> IdleLimits {
        IdleLimits {
            max_idle: Some(self.settings.pool.max_idle as usize),
            ..Default::default()
        }
    }
}

/// A dialed pool plus its wait accounting.
pub struct RedisPool {
    pool: Pool,
    waits: WaitTracker,
}

impl RedisPool {
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check a connection out of the pool. Acquires that found every
    /// connection busy are counted as waits.
    pub async fn acquire(&self) -> Result<Connection, BoxError> {
        let status = self.pool.status();
        let queued = status.available == 0 && status.size >= status.max_size;
        let started = Instant::now();
        let conn = self.pool.get().await?;
        if queued {
            self.waits.record(started.elapsed());
        }
        Ok(conn)
    }
}

#[async_trait]
impl ResourceDriver for RedisDriver {
    type Handle = RedisPool;

    fn name(&self) -> &'static str {
        "redis"
    }

    fn describe(&self) -> ErrorContext {
        ErrorContext::new()
            .with("host", &self.settings.host)
            .with("port", self.settings.port)
            .with("db", self.settings.db)
    }

    async fn dial(&self) -> Result<RedisPool, BoxError> {
        let pool = self.pool_config().create_pool(Some(Runtime::Tokio1))?;
        Ok(RedisPool {
            pool,
            waits: WaitTracker::new(),
        })
    }

    async fn ping(&self, handle: &RedisPool) -> Result<(), BoxError> {
        let mut conn = handle.acquire().await?;
        let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        pong?;
        Ok(())
    }

    async fn close(&self, handle: &RedisPool) -> Result<(), BoxError> {
        handle.pool.close();
        Ok(())
    }

    fn stats(&self, handle: &RedisPool) -> PoolStats {
        let status = handle.pool.status();
        PoolStats::from_counts(status.size, status.available, status.max_size, &handle.waits)
    }

    fn prune_idle(&self, handle: &RedisPool) -> usize {
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
            max_active = pool.max_active,
            max_idle = pool.max_idle,
            db = self.settings.db,
            "redis pool parameters"
        );
    }
}

/// `redis://[:password@]host:port/db`, with the password percent-encoded.
pub fn connection_url(settings: &RedisSettings) -> String {
    let auth = if settings.password.is_empty() {
        String::new()
    } else {
        format!(":{}@", encode_userinfo(settings.password.expose()))
    };
    format!(
        "redis://{}{}:{}/{}",
        auth, settings.host, settings.port, settings.db
    )
}

fn encode_userinfo(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(char::from(byte))
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Wrapper timing derived from the redis settings.
pub fn connection_settings(settings: &RedisSettings) -> ConnectionSettings {
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
