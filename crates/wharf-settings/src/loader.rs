//! Settings file loading, `APP_*` environment overrides, and validation.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use wharf_core::{Result, WharfError};

use crate::Settings;

fn invalid(reason: impl Into<String>) -> WharfError {
    WharfError::InvalidConfig {
        resource: "settings",
        reason: reason.into(),
    }
}

impl Settings {
    /// Default location of the settings file, `<config dir>/wharf/wharf.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wharf").join("wharf.toml"))
    }

    /// Load settings from an optional TOML file, apply environment overrides
    /// from the process environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Settings::load`] with an explicit environment lookup.
    pub fn load_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::warn!(path = %path.display(), "settings file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        settings.apply_env(&lookup)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| invalid(format!("failed to parse settings: {}", e)))
    }

    /// Overlay `APP_*` variables on top of the current values.
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        let env = Overrides { lookup };

        env.value("APP_GENERAL_ENV", &mut self.general.env)?;
        env.value("APP_GENERAL_TZ", &mut self.general.tz)?;
        env.value("APP_GENERAL_SERVICE_NAME", &mut self.general.service_name)?;

        env.value("APP_LOGGER_LEVEL", &mut self.logger.level)?;
        if let Some(dir) = lookup("APP_LOGGER_DIR") {
            self.logger.log_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }

        let db = &mut self.database;
        env.value("APP_DB_HOST", &mut db.host)?;
        env.value("APP_DB_PORT", &mut db.port)?;
        env.value("APP_DB_NAME", &mut db.name)?;
        env.value("APP_DB_USER", &mut db.user)?;
        env.value("APP_DB_PASSWORD", &mut db.password)?;
        env.value("APP_DB_SSL_MODE", &mut db.ssl_mode)?;
        env.millis("APP_DB_CONNECT_QUERY_TIMEOUT", &mut db.query_timeout_ms)?;
        env.millis("APP_DB_CONNECT_EXEC_TIMEOUT", &mut db.exec_timeout_ms)?;
        env.millis("APP_DB_CONNECT_BACKOFF_MIN", &mut db.backoff.min_ms)?;
        env.millis("APP_DB_CONNECT_BACKOFF_MAX", &mut db.backoff.max_ms)?;
        env.value("APP_DB_CONNECT_BACKOFF_FACTOR", &mut db.backoff.factor)?;
        env.flag("APP_DB_CONNECT_BACKOFF_JITTER", &mut db.backoff.jitter)?;
        env.value("APP_DB_CONNECT_BACKOFF_RETRIES", &mut db.backoff.retries)?;
        env.value("APP_DB_POOL_MAX_OPEN_CONNS", &mut db.pool.max_open)?;
        env.value("APP_DB_POOL_MAX_IDLE_CONNS", &mut db.pool.max_idle)?;
        env.millis("APP_DB_POOL_CONN_MAX_LIFETIME", &mut db.pool.conn_max_lifetime_ms)?;
        env.millis("APP_DB_POOL_CONN_MAX_IDLE_TIME", &mut db.pool.conn_max_idle_time_ms)?;
        env.millis("APP_DB_POOL_HEALTH_CHECK_PERIOD", &mut db.pool.health_check_period_ms)?;

        let redis = &mut self.redis;
        env.value("APP_REDIS_HOST", &mut redis.host)?;
        env.value("APP_REDIS_PORT", &mut redis.port)?;
        env.value("APP_REDIS_PASSWORD", &mut redis.password)?;
        env.value("APP_REDIS_DB", &mut redis.db)?;
        env.millis("APP_REDIS_CONNECT_QUERY_TIMEOUT", &mut redis.query_timeout_ms)?;
        env.millis("APP_REDIS_CONNECT_EXEC_TIMEOUT", &mut redis.exec_timeout_ms)?;
        env.millis("APP_REDIS_CONNECT_BACKOFF_MIN", &mut redis.backoff.min_ms)?;
        env.millis("APP_REDIS_CONNECT_BACKOFF_MAX", &mut redis.backoff.max_ms)?;
        env.value("APP_REDIS_CONNECT_BACKOFF_FACTOR", &mut redis.backoff.factor)?;
        env.flag("APP_REDIS_CONNECT_BACKOFF_JITTER", &mut redis.backoff.jitter)?;
        env.value("APP_REDIS_CONNECT_BACKOFF_RETRIES", &mut redis.backoff.retries)?;
        env.value("APP_REDIS_POOL_MAX_IDLE_CONNS", &mut redis.pool.max_idle)?;
        env.value("APP_REDIS_POOL_MAX_ACTIVE_CONNS", &mut redis.pool.max_active)?;
        env.millis("APP_REDIS_POOL_HEALTH_CHECK_PERIOD", &mut redis.pool.health_check_period_ms)?;

        Ok(())
    }

    /// Reject settings the resources cannot run with.
    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        if db.host.is_empty() {
            return Err(invalid("database host is required"));
        }
        if db.name.is_empty() {
            return Err(invalid("database name is required"));
        }
        if db.user.is_empty() {
            return Err(invalid("database user is required"));
        }
        if db.port == 0 {
            return Err(invalid("invalid database port: 0 (must be between 1 and 65535)"));
        }
        if db.pool.max_open < 1 {
            return Err(invalid("max open connections must be at least 1"));
        }
        if db.pool.max_idle > db.pool.max_open {
            return Err(invalid(
                "max idle connections cannot exceed max open connections",
            ));
        }
        positive("database query timeout", db.query_timeout_ms)?;
        positive("database exec timeout", db.exec_timeout_ms)?;
        positive("database health check period", db.pool.health_check_period_ms)?;

        let redis = &self.redis;
        if redis.host.is_empty() {
            return Err(invalid("redis host is required"));
        }
        if redis.port == 0 {
            return Err(invalid("invalid redis port: 0 (must be between 1 and 65535)"));
        }
        if redis.db < 0 {
            return Err(invalid(format!("invalid redis db: {}", redis.db)));
        }
        if redis.pool.max_active < 1 {
            return Err(invalid("max active connections must be at least 1"));
        }
        positive("redis query timeout", redis.query_timeout_ms)?;
        positive("redis exec timeout", redis.exec_timeout_ms)?;
        positive("redis health check period", redis.pool.health_check_period_ms)?;

        Ok(())
    }
}

fn positive(what: &str, millis: u64) -> Result<()> {
    if millis == 0 {
        return Err(invalid(format!("{} must be positive", what)));
    }
    Ok(())
}

struct Overrides<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Overrides<'_> {
    fn value<T>(&self, key: &str, target: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: Display,
    {
        if let Some(raw) = (self.lookup)(key) {
            *target = raw
                .parse()
                .map_err(|e| invalid(format!("{}: {}", key, e)))?;
        }
        Ok(())
    }

    fn millis(&self, key: &str, target: &mut u64) -> Result<()> {
        if let Some(raw) = (self.lookup)(key) {
            let duration = parse_duration(&raw)
                .ok_or_else(|| invalid(format!("{}: invalid duration {:?}", key, raw)))?;
            *target = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        }
        Ok(())
    }

    fn flag(&self, key: &str, target: &mut bool) -> Result<()> {
        if let Some(raw) = (self.lookup)(key) {
            *target = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid(format!("{}: invalid boolean {:?}", key, raw))),
            };
        }
        Ok(())
    }
}

/// Parse `"250ms"`, `"5s"`, `"15m"`, `"1h"`. A bare number is milliseconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "" | "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(amount.checked_mul(3_600)?)),
        _ => None,
    }
}
