//! Integration tests against a running PostgreSQL server
//!
//! Connection parameters come from the usual `APP_DB_*` variables, with the
//! defaults of `DatabaseSettings` otherwise. Run with
//! `cargo test -p wharf-driver-postgres -- --ignored`.

use wharf_core::{Context, ErrorCode, Logger, WharfError};
use wharf_driver_postgres::{Database, IsolationLevel, TransactionOptions};
use wharf_settings::Settings;

fn live_database() -> Database {
    let mut settings = Settings::default();
    settings
        .apply_env(&|key| std::env::var(key).ok())
        .expect("Invalid APP_* override");
    settings.database.backoff.retries = 1;
    Database::new(settings.database, Logger::current())
}

async fn connected() -> (Database, Context) {
    let db = live_database();
    let ctx = Context::background();
    db.connect(&ctx).await.expect("Failed to connect to PostgreSQL");
    (db, ctx)
}

#[tokio::test]
#[ignore = "requires running PostgreSQL server"]
async fn test_connect_ping_close() {
    let (db, ctx) = connected().await;

    db.ping(&ctx).await.unwrap();
    db.health_check(&ctx).await.unwrap();
    let report = db.probe(&ctx).await.unwrap();
    assert!(report.status.is_usable());
    assert!(db.stats().open >= 1);

    db.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL server"]
async fn test_query_helpers() {
    let (db, ctx) = connected().await;

    let row = db
        .query_one(&ctx, "SELECT $1::int4 + 1 AS answer", &[&41i32])
        .await
        .unwrap();
    assert_eq!(row.get::<_, i32>("answer"), 42);

    let missing = db
        .query_opt(&ctx, "SELECT 1 WHERE false", &[])
        .await
        .unwrap();
    assert!(missing.is_none());

    db.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL server"]
async fn test_backend_error_is_classified() {
    let (db, ctx) = connected().await;

    let err = db
        .query(&ctx, "SELECT * FROM wharf_table_that_does_not_exist", &[])
        .await
        .unwrap_err();

    assert!(matches!(err, WharfError::QueryFailed { .. }));
    assert_eq!(err.code(), ErrorCode::Internal);
    assert_eq!(err.to_string(), "failed to execute postgres query");
    let source = std::error::Error::source(&err).unwrap().to_string();
    assert!(source.contains("42P01"), "unexpected source: {}", source);

    db.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL server"]
async fn test_transaction_commit_and_rollback() {
    let (db, ctx) = connected().await;
    db.execute(
        &ctx,
        "CREATE TABLE IF NOT EXISTS wharf_tx_items (id int4 PRIMARY KEY)",
        &[],
    )
    .await
    .unwrap();
    db.execute(&ctx, "DELETE FROM wharf_tx_items", &[]).await.unwrap();

    let tx = db
        .begin_tx(&ctx, TransactionOptions::new(IsolationLevel::Serializable))
        .await
        .unwrap();
    tx.execute(&ctx, "INSERT INTO wharf_tx_items (id) VALUES (1)", &[])
        .await
        .unwrap();
    tx.commit(&ctx).await.unwrap();

    let tx = db
        .begin_tx(&ctx, TransactionOptions::default())
        .await
        .unwrap();
    tx.execute(&ctx, "INSERT INTO wharf_tx_items (id) VALUES (2)", &[])
        .await
        .unwrap();
    tx.rollback(&ctx).await.unwrap();

    let dropped = db
        .begin_tx(&ctx, TransactionOptions::default())
        .await
        .unwrap();
    dropped
        .execute(&ctx, "INSERT INTO wharf_tx_items (id) VALUES (3)", &[])
        .await
        .unwrap();
    drop(dropped);

    let rows = db
        .query(&ctx, "SELECT id FROM wharf_tx_items ORDER BY id", &[])
        .await
        .unwrap();
    let ids: Vec<i32> = rows.iter().map(|row| row.get(0)).collect();
    assert_eq!(ids, vec![1]);

    db.execute(&ctx, "DROP TABLE wharf_tx_items", &[]).await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL server"]
async fn test_read_only_transaction_rejects_writes() {
    let (db, ctx) = connected().await;

    let tx = db
        .begin_tx(&ctx, TransactionOptions::default().read_only())
        .await
        .unwrap();
    let err = tx
        .execute(&ctx, "CREATE TABLE wharf_never_created (id int4)", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, WharfError::ExecFailed { .. }));
    tx.rollback(&ctx).await.unwrap();

    db.close().await.unwrap();
}
