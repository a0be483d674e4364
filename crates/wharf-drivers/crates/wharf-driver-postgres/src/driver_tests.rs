//! Unit tests for the PostgreSQL driver (no server required)

use std::time::Duration;

use wharf_connection::ResourceDriver;
use wharf_settings::{BackoffSettings, DatabaseSettings, Password};

use crate::driver::{PostgresDriver, connection_settings};

fn test_settings() -> DatabaseSettings {
    DatabaseSettings {
        host: "db.internal".to_string(),
        port: 6432,
        name: "orders".to_string(),
        user: "svc_orders".to_string(),
        password: Password::new("hunter2"),
        ..Default::default()
    }
}

mod metadata_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_driver_name() {
        let driver = PostgresDriver::new(test_settings());
        assert_eq!(driver.name(), "postgres");
    }

    #[test]
    fn test_describe_names_endpoint_without_password() {
        let driver = PostgresDriver::new(test_settings());
        let context = driver.describe();

        assert_eq!(context.get("host"), Some("db.internal"));
        assert_eq!(context.get("port"), Some("6432"));
        assert_eq!(context.get("database"), Some("orders"));
        assert_eq!(context.get("user"), Some("svc_orders"));
        assert!(!context.to_string().contains("hunter2"));
    }

    #[test]
    fn test_idle_limits_follow_pool_settings() {
        let mut settings = test_settings();
        settings.pool.max_idle = 4;
        settings.pool.conn_max_lifetime_ms = 60_000;
        settings.pool.conn_max_idle_time_ms = 10_000;

        let limits = PostgresDriver::new(settings).idle_limits();

        assert_eq!(limits.max_idle, Some(4));
        assert_eq!(limits.max_lifetime, Some(Duration::from_secs(60)));
        assert_eq!(limits.max_idle_time, Some(Duration::from_secs(10)));
    }
}

mod connection_settings_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timeouts_and_period() {
        let mut settings = test_settings();
        settings.query_timeout_ms = 1_500;
        settings.exec_timeout_ms = 3_000;
        settings.pool.health_check_period_ms = 30_000;

        let conn = connection_settings(&settings);

        assert_eq!(conn.query_timeout, Duration::from_millis(1_500));
        assert_eq!(conn.exec_timeout, Duration::from_secs(3));
        assert_eq!(conn.health_check_period, Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_mapping() {
        let mut settings = test_settings();
        settings.backoff = BackoffSettings {
            min_ms: 100,
            max_ms: 2_000,
            factor: 3,
            jitter: false,
            retries: 2,
        };

        let conn = connection_settings(&settings);

        assert_eq!(conn.max_retries, 2);
        assert_eq!(conn.backoff.min, Duration::from_millis(100));
        assert_eq!(conn.backoff.max, Duration::from_secs(2));
        assert_eq!(conn.backoff.factor, 3.0);
        assert!(!conn.backoff.jitter);
    }
}

mod pool_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_dial_is_lazy() {
        let mut settings = test_settings();
        settings.pool.max_open = 7;
        let driver = PostgresDriver::new(settings);

        let pool = driver.dial().await.unwrap();
        let stats = driver.stats(&pool);

        assert_eq!(stats.max_open, 7);
        assert_eq!(stats.open, 0);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.wait_count, 0);
        assert_eq!(driver.prune_idle(&pool), 0);
    }

    #[tokio::test]
    async fn test_close_shuts_pool() {
        let driver = PostgresDriver::new(test_settings());
        let pool = driver.dial().await.unwrap();

        driver.close(&pool).await.unwrap();

        assert!(pool.pool().is_closed());
        assert!(pool.acquire().await.is_err());
    }
}
