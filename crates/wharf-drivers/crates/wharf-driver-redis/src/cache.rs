//! Key/value commands over a resilient Redis pool

use std::time::Duration;

use redis::{FromRedisValue, RedisError, RedisResult, ToRedisArgs};
use wharf_connection::{ConnectionState, HealthReport, ResilientConnection};
use wharf_core::{BoxError, Context, Logger, PoolStats, Result, WharfError};
use wharf_settings::RedisSettings;

use crate::driver::{RedisDriver, connection_settings};

fn backend(error: RedisError) -> BoxError {
    Box::new(error)
}

/// Millisecond TTL for `PX`/`PEXPIRE`, never below 1ms.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis access with connection lifecycle, timeouts and error
/// classification handled by [`ResilientConnection`].
///
/// Reads (`GET`, `EXISTS`, `PTTL`) use the query timeout, everything else
/// the exec timeout.
pub struct Cache {
    conn: ResilientConnection<RedisDriver>,
}

impl Cache {
    pub fn new(settings: RedisSettings, logger: Logger) -> Self {
        let connection = connection_settings(&settings);
        Self {
            conn: ResilientConnection::new(RedisDriver::new(settings), connection, logger),
        }
    }

    pub fn connection(&self) -> &ResilientConnection<RedisDriver> {
        &self.conn
    }

    pub async fn connect(&self, ctx: &Context) -> Result<()> {
        self.conn.connect(ctx).await
    }

    pub async fn close(&self) -> Result<()> {
        self.conn.close().await
    }

    pub async fn ping(&self, ctx: &Context) -> Result<()> {
        self.conn.ping(ctx).await
    }

    pub async fn health_check(&self, ctx: &Context) -> Result<()> {
        self.conn.health_check(ctx).await
    }

    pub async fn probe(&self, ctx: &Context) -> Result<HealthReport> {
        self.conn.probe(ctx).await
    }

    pub fn start_health_monitor(&self, ctx: &Context) {
        self.conn.start_health_monitor(ctx)
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn stats(&self) -> PoolStats {
        self.conn.stats()
    }

    /// `SET key value [PX ttl]`. `None` or a zero TTL stores without expiry.
    pub async fn set<V>(&self, ctx: &Context, key: &str, value: V, ttl: Option<Duration>) -> Result<()>
    where
        V: ToRedisArgs,
    {
        self.conn
            .execute_scoped(ctx, "SET", |pool, _| async move {
                let mut conn = pool.acquire().await?;
                let mut cmd = redis::cmd("SET");
                cmd.arg(key).arg(value);
                if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
                    cmd.arg("PX").arg(ttl_millis(ttl));
                }
                let reply: RedisResult<()> = cmd.query_async(&mut conn).await;
                reply.map_err(backend)
            })
            .await
    }

    /// `GET key`. A missing key is `KeyNotFound`.
    pub async fn get<T>(&self, ctx: &Context, key: &str) -> Result<T>
    where
        T: FromRedisValue,
    {
        let value: Option<T> = self
            .conn
            .query_scoped(ctx, "GET", |pool, _| async move {
                let mut conn = pool.acquire().await?;
                let reply: RedisResult<Option<T>> =
                    redis::cmd("GET").arg(key).query_async(&mut conn).await;
                reply.map_err(backend)
            })
            .await?;
        value.ok_or_else(|| WharfError::KeyNotFound {
            key: key.to_string(),
        })
    }

    /// `DEL keys...`, returning how many keys existed.
    pub async fn delete(&self, ctx: &Context, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            self.conn.handle()?;
            return Ok(0);
        }
        self.conn
            .execute_scoped(ctx, "DEL", |pool, _| async move {
                let mut conn = pool.acquire().await?;
                let reply: RedisResult<u64> = redis::cmd("DEL").arg(keys).query_async(&mut conn).await;
                reply.map_err(backend)
            })
            .await
    }

    /// `EXISTS keys...`. A key named twice is counted twice.
    pub async fn exists(&self, ctx: &Context, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            self.conn.handle()?;
            return Ok(0);
        }
        self.conn
            .query_scoped(ctx, "EXISTS", |pool, _| async move {
                let mut conn = pool.acquire().await?;
                let reply: RedisResult<u64> =
                    redis::cmd("EXISTS").arg(keys).query_async(&mut conn).await;
                reply.map_err(backend)
            })
            .await
    }

    /// `PEXPIRE key ttl`. `false` when the key does not exist.
    pub async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<bool> {
        self.conn
            .execute_scoped(ctx, "PEXPIRE", |pool, _| async move {
                let mut conn = pool.acquire().await?;
                let reply: RedisResult<bool> = redis::cmd("PEXPIRE")
                    .arg(key)
                    .arg(ttl_millis(ttl))
                    .query_async(&mut conn)
                    .await;
                reply.map_err(backend)
            })
            .await
    }

    /// Remaining time to live: `None` for a key without expiry,
    /// `KeyNotFound` for a missing key.
    pub async fn ttl(&self, ctx: &Context, key: &str) -> Result<Option<Duration>> {
        let millis: i64 = self
            .conn
            .query_scoped(ctx, "PTTL", |pool, _| async move {
                let mut conn = pool.acquire().await?;
                let reply: RedisResult<i64> =
                    redis::cmd("PTTL").arg(key).query_async(&mut conn).await;
                reply.map_err(backend)
            })
            .await?;
        match millis {
            -2 => Err(WharfError::KeyNotFound {
                key: key.to_string(),
            }),
            millis if millis < 0 => Ok(None),
            millis => Ok(Some(Duration::from_millis(millis.unsigned_abs()))),
        }
    }

    /// `INCRBY key by`. A missing key starts from 0.
    pub async fn increment(&self, ctx: &Context, key: &str, by: i64) -> Result<i64> {
        self.counter(ctx, "INCRBY", key, by).await
    }

    /// `DECRBY key by`. A missing key starts from 0.
    pub async fn decrement(&self, ctx: &Context, key: &str, by: i64) -> Result<i64> {
        self.counter(ctx, "DECRBY", key, by).await
    }

    async fn counter(&self, ctx: &Context, command: &'static str, key: &str, by: i64) -> Result<i64> {
        self.conn
            .execute_scoped(ctx, command, |pool, _| async move {
                let mut conn = pool.acquire().await?;
                let reply: RedisResult<i64> = redis::cmd(command)
                    .arg(key)
                    .arg(by)
                    .query_async(&mut conn)
                    .await;
                reply.map_err(backend)
            })
            .await
    }

    /// `FLUSHDB`: removes every key of the selected database.
    pub async fn flush_db(&self, ctx: &Context) -> Result<()> {
        let db = self.conn.driver().settings().db;
        self.conn.logger().in_scope(|| {
            tracing::warn!(resource = self.conn.name(), db, "flushing redis database");
        });
        self.conn
            .execute_scoped(ctx, "FLUSHDB", |pool, _| async move {
                let mut conn = pool.acquire().await?;
                let reply: RedisResult<()> = redis::cmd("FLUSHDB").query_async(&mut conn).await;
                reply.map_err(backend)
            })
            .await
    }
}
