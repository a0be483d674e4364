//! Logging and tracing setup for the wharf service
//!
//! Builds one global `tracing` subscriber from [`Settings`]:
//! - pretty console output in development and test, JSON lines in staging
//!   and production
//! - an optional daily-rolling JSON file
//! - `RUST_LOG` overrides the configured level

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wharf_settings::Settings;

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON file, no file when `None`
    pub log_dir: Option<PathBuf>,

    /// JSON console output instead of the pretty format
    pub structured: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Default filter directive when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            structured: false,
            include_location: cfg!(debug_assertions),
            default_filter: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Staging and production log JSON, and default to a file under the
    /// local data directory when no `log_dir` is configured.
    pub fn from_settings(settings: &Settings) -> Self {
        let structured = settings.general.env.structured_logs();
        let log_dir = settings
            .logger
            .log_dir
            .clone()
            .or_else(|| structured.then(log_directory));

        Self {
            log_dir,
            structured,
            include_location: !structured && cfg!(debug_assertions),
            default_filter: settings.logger.level.as_str().to_string(),
        }
    }
}

/// Keeps the file writer flushing; drop it on shutdown.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set or the log directory cannot
/// be created.
pub fn init(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers = Vec::new();

    let console = fmt::layer()
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);
    if config.structured {
        layers.push(
            console
                .json()
                .with_ansi(false)
                .with_filter(env_filter.clone())
                .boxed(),
        );
    } else {
        layers.push(
            console
                .pretty()
                .with_ansi(true)
                .with_filter(env_filter.clone())
                .boxed(),
        );
    }

    let mut file_guard = None;
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "wharf.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        layers.push(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking)
                .with_filter(env_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        log_dir = ?config.log_dir,
        structured = config.structured,
        filter = %config.default_filter,
        "logging initialized"
    );

    Ok(LoggingGuard { _file: file_guard })
}

/// Default directory for log files
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wharf")
        .join("logs")
}
