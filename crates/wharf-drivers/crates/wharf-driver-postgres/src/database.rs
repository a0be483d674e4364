//! Statement helpers and transactions over a resilient PostgreSQL pool

use deadpool_postgres::Object;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use wharf_connection::{ConnectionState, HealthReport, ResilientConnection};
use wharf_core::{BoxError, Context, Logger, PoolStats, Result, WharfError};
use wharf_settings::DatabaseSettings;

use crate::driver::{PgPool, PostgresDriver, connection_settings};
use crate::error;

type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

/// Transaction isolation, `READ COMMITTED` unless asked otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn new(isolation: IsolationLevel) -> Self {
        Self {
            isolation,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub(crate) fn begin_statement(&self) -> String {
        let access = if self.read_only {
            "READ ONLY"
        } else {
            "READ WRITE"
        };
        format!("BEGIN ISOLATION LEVEL {} {}", self.isolation.as_sql(), access)
    }
}

/// PostgreSQL access with connection lifecycle, timeouts and error
/// classification handled by [`ResilientConnection`].
///
/// ```ignore
/// let db = Database::new(settings.database.clone(), Logger::current());
/// db.connect(&ctx).await?;
/// let rows = db.query(&ctx, "SELECT id FROM users WHERE email = $1", &[&email]).await?;
/// ```
pub struct Database {
    conn: ResilientConnection<PostgresDriver>,
}

impl Database {
    pub fn new(settings: DatabaseSettings, logger: Logger) -> Self {
        let connection = connection_settings(&settings);
        Self {
            conn: ResilientConnection::new(PostgresDriver::new(settings), connection, logger),
        }
    }

    pub fn connection(&self) -> &ResilientConnection<PostgresDriver> {
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

    /// Run a write and return the number of affected rows.
    pub async fn execute(&self, ctx: &Context, sql: &str, params: Params<'_>) -> Result<u64> {
        self.conn
            .execute_scoped(ctx, sql, |pool, _| async move {
                let client = pool.acquire().await?;
                let statement = client.prepare_cached(sql).await.map_err(error::backend)?;
                client
                    .execute(&statement, params)
                    .await
                    .map_err(error::backend)
            })
            .await
    }

    pub async fn query(&self, ctx: &Context, sql: &str, params: Params<'_>) -> Result<Vec<Row>> {
        self.conn
            .query_scoped(ctx, sql, |pool, _| async move {
                let client = pool.acquire().await?;
                let statement = client.prepare_cached(sql).await.map_err(error::backend)?;
                client.query(&statement, params).await.map_err(error::backend)
            })
            .await
    }

    /// Exactly one row; zero or several rows is a `QueryFailed`.
    pub async fn query_one(&self, ctx: &Context, sql: &str, params: Params<'_>) -> Result<Row> {
        self.conn
            .query_scoped(ctx, sql, |pool, _| async move {
                let client = pool.acquire().await?;
                let statement = client.prepare_cached(sql).await.map_err(error::backend)?;
                client
                    .query_one(&statement, params)
                    .await
                    .map_err(error::backend)
            })
            .await
    }

    pub async fn query_opt(
        &self,
        ctx: &Context,
        sql: &str,
        params: Params<'_>,
    ) -> Result<Option<Row>> {
        self.conn
            .query_scoped(ctx, sql, |pool, _| async move {
                let client = pool.acquire().await?;
                let statement = client.prepare_cached(sql).await.map_err(error::backend)?;
                client
                    .query_opt(&statement, params)
                    .await
                    .map_err(error::backend)
            })
            .await
    }

    /// Check out a connection and open a transaction on it, bounded by the
    /// exec timeout. Failures are reported as `TransactionFailed`.
    pub async fn begin_tx(&self, ctx: &Context, options: TransactionOptions) -> Result<Transaction> {
        let pool = self.conn.handle()?;
        let statement = options.begin_statement();
        let begin_ctx = ctx.with_timeout(self.conn.settings().exec_timeout);
        let outcome = begin_ctx
            .run(Transaction::begin(&pool, self.conn.clone(), &statement))
            .await;
        begin_ctx.cancel();

        let source = match outcome {
            Ok(Ok(tx)) => return Ok(tx),
            Ok(Err(source)) => source,
            Err(expired) => {
                if let Some(cancelled) = ctx.err() {
                    return Err(cancelled.into());
                }
                Box::new(expired) as BoxError
            }
        };
        Err(WharfError::TransactionFailed {
            resource: self.conn.name(),
            source,
        })
    }
}

/// An open transaction holding one pooled connection.
///
/// Finish it with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// Dropping it unfinished detaches the connection from the pool and closes
/// it, so the server aborts the transaction.
pub struct Transaction {
    client: Option<Object>,
    conn: ResilientConnection<PostgresDriver>,
    began: bool,
}

impl Transaction {
    async fn begin(
        pool: &PgPool,
        conn: ResilientConnection<PostgresDriver>,
        statement: &str,
    ) -> std::result::Result<Self, BoxError> {
        let client = pool.acquire().await?;
        let mut tx = Self {
            client: Some(client),
            conn,
            began: false,
        };
        tx.client()?
            .batch_execute(statement)
            .await
            .map_err(error::backend)?;
        tx.began = true;
        Ok(tx)
    }

    fn client(&self) -> Result<&Object> {
        self.client.as_ref().ok_or(WharfError::NotConnected {
            resource: self.conn.name(),
        })
    }

    pub async fn execute(&self, ctx: &Context, sql: &str, params: Params<'_>) -> Result<u64> {
        let client = self.client()?;
        self.conn
            .execute_scoped(ctx, sql, |_, _| async move {
                client.execute(sql, params).await.map_err(error::backend)
            })
            .await
    }

    pub async fn query(&self, ctx: &Context, sql: &str, params: Params<'_>) -> Result<Vec<Row>> {
        let client = self.client()?;
        self.conn
            .query_scoped(ctx, sql, |_, _| async move {
                client.query(sql, params).await.map_err(error::backend)
            })
            .await
    }

    pub async fn commit(mut self, ctx: &Context) -> Result<()> {
        self.finish(ctx, "COMMIT").await
    }

    pub async fn rollback(mut self, ctx: &Context) -> Result<()> {
        self.finish(ctx, "ROLLBACK").await
    }

    /// On success the connection goes back to the pool. On failure it stays
    /// owned and `Drop` discards it.
    async fn finish(&mut self, ctx: &Context, statement: &'static str) -> Result<()> {
        let client = self.client()?;
        self.conn
            .execute_scoped(ctx, statement, |_, _| async move {
                client.batch_execute(statement).await.map_err(error::backend)
            })
            .await?;
        self.client = None;
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        if self.began {
            self.conn.logger().in_scope(|| {
                tracing::warn!(
                    resource = self.conn.name(),
                    "transaction dropped without commit or rollback, discarding its connection"
                );
            });
        }
        drop(Object::take(client));
    }
}
