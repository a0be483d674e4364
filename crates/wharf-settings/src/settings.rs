use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deployment environment the process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    /// Production-like environments log machine-readable JSON.
    pub fn structured_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!(
                "invalid environment: {} (must be development, staging, production, or test)",
                other
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!(
                "invalid log level: {} (must be debug, info, warn, or error)",
                s
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PostgreSQL `sslmode`. Client certificates are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
        }
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            other => Err(format!(
                "unsupported sslmode: {} (must be disable, prefer, or require)",
                other
            )),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("\"***\"")
        }
    }
}

impl FromStr for Password {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub logger: LoggerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
}

impl Settings {
    pub fn is_development(&self) -> bool {
        self.general.env == Environment::Development
    }

    pub fn is_production(&self) -> bool {
        self.general.env == Environment::Production
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub env: Environment,
    pub tz: String,
    pub service_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            env: Environment::Development,
            tz: "UTC".to_string(),
            service_name: "wharf".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    pub level: LogLevel,
    /// Directory for the rolling JSON log file. No file is written when unset.
    pub log_dir: Option<PathBuf>,
}

/// Reconnect schedule shared by every resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub min_ms: u64,
    pub max_ms: u64,
    pub factor: u32,
    pub jitter: bool,
    /// Retries after the first attempt.
    pub retries: u32,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            min_ms: 200,
            max_ms: 15_000,
            factor: 2,
            jitter: true,
            retries: 7,
        }
    }
}

impl BackoffSettings {
    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Password,
    pub ssl_mode: SslMode,
    pub query_timeout_ms: u64,
    pub exec_timeout_ms: u64,
    pub backoff: BackoffSettings,
    pub pool: DatabasePoolSettings,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "wharf".to_string(),
            user: "wharf".to_string(),
            password: Password::default(),
            ssl_mode: SslMode::Disable,
            query_timeout_ms: 5_000,
            exec_timeout_ms: 5_000,
            backoff: BackoffSettings::default(),
            pool: DatabasePoolSettings::default(),
        }
    }
}

impl DatabaseSettings {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.exec_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabasePoolSettings {
    pub max_open: u32,
    pub max_idle: u32,
    pub conn_max_lifetime_ms: u64,
    pub conn_max_idle_time_ms: u64,
    pub health_check_period_ms: u64,
}

impl Default for DatabasePoolSettings {
    fn default() -> Self {
        Self {
            max_open: 20,
            max_idle: 10,
            conn_max_lifetime_ms: 15 * 60 * 1_000,
            conn_max_idle_time_ms: 5 * 60 * 1_000,
            health_check_period_ms: 60 * 1_000,
        }
    }
}

impl DatabasePoolSettings {
    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_millis(self.conn_max_lifetime_ms)
    }

    pub fn conn_max_idle_time(&self) -> Duration {
        Duration::from_millis(self.conn_max_idle_time_ms)
    }

    pub fn health_check_period(&self) -> Duration {
        Duration::from_millis(self.health_check_period_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Password,
    pub db: i64,
    pub query_timeout_ms: u64,
    pub exec_timeout_ms: u64,
    pub backoff: BackoffSettings,
    pub pool: RedisPoolSettings,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: Password::default(),
            db: 0,
            query_timeout_ms: 2_000,
            exec_timeout_ms: 2_000,
            backoff: BackoffSettings::default(),
            pool: RedisPoolSettings::default(),
        }
    }
}

impl RedisSettings {
    /// `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.exec_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisPoolSettings {
    pub max_idle: u32,
    pub max_active: u32,
    pub health_check_period_ms: u64,
}

impl Default for RedisPoolSettings {
    fn default() -> Self {
        Self {
            max_idle: 10,
            max_active: 20,
            health_check_period_ms: 60 * 1_000,
        }
    }
}

impl RedisPoolSettings {
    pub fn health_check_period(&self) -> Duration {
        Duration::from_millis(self.health_check_period_ms)
    }
}
