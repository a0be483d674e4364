//! Integration tests against a running Redis server
//!
//! Connection parameters come from `APP_REDIS_*`, with the defaults of
//! `RedisSettings` otherwise. Every test uses its own key prefix.

use std::time::Duration;

use wharf_core::{Context, Logger, WharfError};
use wharf_driver_redis::Cache;
use wharf_settings::Settings;

async fn connected() -> (Cache, Context) {
    let mut settings = Settings::default();
    settings
        .apply_env(&|key| std::env::var(key).ok())
        .expect("Invalid APP_* override");
    settings.redis.backoff.retries = 1;

    let cache = Cache::new(settings.redis, Logger::current());
    let ctx = Context::background();
    cache.connect(&ctx).await.expect("Failed to connect to Redis");
    (cache, ctx)
}

#[tokio::test]
#[ignore = "requires running Redis server"]
async fn test_set_get_delete() {
    let (cache, ctx) = connected().await;
    let key = "wharf:test:set_get_delete";

    cache.set(&ctx, key, "hello", None).await.unwrap();
    let value: String = cache.get(&ctx, key).await.unwrap();
    assert_eq!(value, "hello");
    assert_eq!(cache.exists(&ctx, &[key]).await.unwrap(), 1);

    assert_eq!(cache.delete(&ctx, &[key]).await.unwrap(), 1);
    let err = cache.get::<String>(&ctx, key).await.unwrap_err();
    assert!(matches!(err, WharfError::KeyNotFound { .. }));

    cache.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running Redis server"]
async fn test_expiry() {
    let (cache, ctx) = connected().await;
    let key = "wharf:test:expiry";

    cache
        .set(&ctx, key, 1, Some(Duration::from_secs(30)))
        .await
        .unwrap();
    let ttl = cache.ttl(&ctx, key).await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(30));

    cache.set(&ctx, key, 1, None).await.unwrap();
    assert_eq!(cache.ttl(&ctx, key).await.unwrap(), None);
    assert!(cache.expire(&ctx, key, Duration::from_secs(5)).await.unwrap());

    cache.delete(&ctx, &[key]).await.unwrap();
    assert!(!cache.expire(&ctx, key, Duration::from_secs(5)).await.unwrap());
    assert!(matches!(
        cache.ttl(&ctx, key).await,
        Err(WharfError::KeyNotFound { .. })
    ));

    cache.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running Redis server"]
async fn test_counters() {
    let (cache, ctx) = connected().await;
    let key = "wharf:test:counters";
    cache.delete(&ctx, &[key]).await.unwrap();

    assert_eq!(cache.increment(&ctx, key, 5).await.unwrap(), 5);
    assert_eq!(cache.decrement(&ctx, key, 2).await.unwrap(), 3);

    cache.delete(&ctx, &[key]).await.unwrap();
    cache.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running Redis server"]
async fn test_health() {
    let (cache, ctx) = connected().await;

    cache.ping(&ctx).await.unwrap();
    cache.health_check(&ctx).await.unwrap();
    assert!(cache.probe(&ctx).await.unwrap().status.is_usable());

    cache.close().await.unwrap();
}
