//! Service bootstrap: bring resources up, watch them, tear them down

use anyhow::Context as _;
use wharf_core::{Context, Logger, WharfError};
use wharf_drivers::postgres::Database;
use wharf_drivers::redis::Cache;
use wharf_settings::Settings;

/// Process-wide resources and the root context their monitors run under.
pub struct App {
    db: Database,
    cache: Cache,
    root: Context,
}

impl App {
    pub fn new(settings: &Settings, logger: Logger) -> Self {
        Self {
            db: Database::new(settings.database.clone(), logger.clone()),
            cache: Cache::new(settings.redis.clone(), logger),
            root: Context::background(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Cancelled on shutdown; stops the health monitors.
    pub fn context(&self) -> &Context {
        &self.root
    }

    /// Connect the database, then the cache, then start both health
    /// monitors. Stops at the first failure.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.db
            .connect(&self.root)
            .await
            .context("failed to connect to postgres")?;
        self.cache
            .connect(&self.root)
            .await
            .context("failed to connect to redis")?;

        self.db.start_health_monitor(&self.root);
        self.cache.start_health_monitor(&self.root);
        tracing::info!("resources connected");
        Ok(())
    }

    /// Cancel the root context and close whatever is connected.
    pub async fn shutdown(&self) {
        self.root.cancel();

        match self.cache.close().await {
            Ok(()) | Err(WharfError::NotConnected { .. }) => {}
            Err(err) => tracing::error!(error = %err, "failed to close redis"),
        }
        match self.db.close().await {
            Ok(()) | Err(WharfError::NotConnected { .. }) => {}
            Err(err) => tracing::error!(error = %err, "failed to close postgres"),
        }
        tracing::info!("shutdown complete");
    }
}

/// Run the service until Ctrl-C.
///
/// A startup failure closes anything already connected and is returned, so
/// the process exits non-zero.
pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let app = App::new(settings, Logger::current());

    let root = app.context().clone();
    let interrupt = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown signal received");
                root.cancel();
            }
            Err(err) => tracing::error!(error = %err, "failed to listen for shutdown signal"),
        }
    });

    if let Err(err) = app.start().await {
        interrupt.abort();
        app.shutdown().await;
        return Err(err);
    }

    app.context().done().await;
    interrupt.abort();
    app.shutdown().await;
    Ok(())
}
