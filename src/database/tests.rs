// Unit tests for the database module

use super::*;
use std::collections::HashMap;

#[test]
fn test_database_type_display() {
    assert_eq!(DatabaseType::Sqlite.to_string(), "sqlite");
}

#[test]
fn test_pool_config_defaults() {
    let config = PoolConfig::default();
    assert_eq!(config.max_connections, 10);
    assert_eq!(config.min_connections, 2);
    assert_eq!(config.idle_timeout_seconds, 300);
    assert_eq!(config.max_lifetime_seconds, 1800);
    assert_eq!(config.acquire_timeout_seconds, 30);
    assert_eq!(config.statement_timeout(), Duration::from_secs(30));
}

#[test]
fn test_database_config_toml_defaults() {
    let config: DatabaseConfig = toml::from_str(
        r#"
        database = "logbook/flybook.db"

        [pool]
        statement_timeout_seconds = 5
        "#,
    )
    .unwrap();

    assert_eq!(config.db_type, DatabaseType::Sqlite);
    assert_eq!(config.database, "logbook/flybook.db");
    assert_eq!(config.pool.statement_timeout_seconds, 5);
    assert_eq!(config.pool.max_connections, 10);
    assert!(config.extra_params.is_empty());
    assert!(!config.is_in_memory());
}

#[test]
fn test_database_config_serialization() {
    let mut extra_params = HashMap::new();
    extra_params.insert("mode".to_string(), "rwc".to_string());

    let config = DatabaseConfig {
        db_type: DatabaseType::Sqlite,
        database: "flybook.db".to_string(),
        pool: PoolConfig::default(),
        extra_params,
    };

    let serialized = serde_json::to_string(&config).unwrap();
    let deserialized: DatabaseConfig = serde_json::from_str(&serialized).unwrap();

    assert_eq!(deserialized.db_type, DatabaseType::Sqlite);
    assert_eq!(deserialized.database, "flybook.db");
    assert_eq!(deserialized.extra_params.get("mode"), Some(&"rwc".to_string()));
}

#[test]
fn test_database_value_conversions() {
    assert_eq!(DatabaseValue::from(42i32), DatabaseValue::Integer(42));
    assert_eq!(DatabaseValue::from("x"), DatabaseValue::Text("x".to_string()));
    assert_eq!(DatabaseValue::from(None::<i64>), DatabaseValue::Null);
    assert_eq!(DatabaseValue::from(Some(1.5)), DatabaseValue::Float(1.5));
}

#[tokio::test]
async fn test_sqlite_in_memory_roundtrip() {
    let db = create_database_connection(&extensions::in_memory_config())
        .await
        .unwrap();

    db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, score REAL)", &[])
        .await
        .unwrap();

    db.execute(
        "INSERT INTO test (id, name, score) VALUES (?, ?, ?)",
        &[
            DatabaseValue::Integer(1),
            DatabaseValue::Text("Test".to_string()),
            DatabaseValue::Null,
        ],
    )
    .await
    .unwrap();

    let row = db
        .query_one("SELECT id, name, score FROM test WHERE id = ?", &[DatabaseValue::Integer(1)])
        .await
        .unwrap()
        .expect("Failed to get test row");

    assert_eq!(row.get_i64("id").unwrap(), 1);
    assert_eq!(row.get_string("name").unwrap(), "Test");
    assert_eq!(row.get_value("id").unwrap(), DatabaseValue::Integer(1));
    assert_eq!(row.get_value("name").unwrap(), DatabaseValue::Text("Test".to_string()));
    assert_eq!(row.get_value("score").unwrap(), DatabaseValue::Null);
    assert_eq!(row.try_get_string("missing").unwrap(), None);
}

#[tokio::test]
async fn test_in_memory_database_is_shared_across_calls() {
    let db = create_database_connection(&extensions::in_memory_config())
        .await
        .unwrap();

    db.execute("CREATE TABLE shared (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();

    // A transaction must see the table created through the pool.
    let mut tx = db.begin_transaction().await.unwrap();
    tx.execute("INSERT INTO shared (id) VALUES (1)", &[]).await.unwrap();
    tx.commit().await.unwrap();

    let rows = db.query("SELECT id FROM shared", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_transaction_rollback_discards_changes() {
    let db = create_database_connection(&extensions::in_memory_config())
        .await
        .unwrap();
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
        .await
        .unwrap();

    let mut tx = db.begin_transaction().await.unwrap();
    let affected = tx
        .execute("INSERT INTO t (v) VALUES (?)", &[DatabaseValue::from("gone")])
        .await
        .unwrap();
    assert_eq!(affected, 1);
    tx.rollback().await.unwrap();

    let rows = db.query("SELECT * FROM t", &[]).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_file_database_created_with_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("flybook.db");
    let config = extensions::sqlite_config(path.to_string_lossy().to_string());

    let db = create_database_connection(&config).await.unwrap();
    db.ping().await.unwrap();
    assert!(path.exists());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_blocked_writer_fails_within_statement_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let mut config = extensions::sqlite_config(path.to_string_lossy().to_string());
    config.pool.statement_timeout_seconds = 1;

    let holder = create_database_connection(&config).await.unwrap();
    holder
        .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
        .await
        .unwrap();
    let writer = create_database_connection(&config).await.unwrap();

    let mut tx = holder.begin_transaction().await.unwrap();
    tx.execute("INSERT INTO t (v) VALUES (?)", &[DatabaseValue::from("held")])
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let result = writer
        .execute("INSERT INTO t (v) VALUES (?)", &[DatabaseValue::from("blocked")])
        .await;
    let elapsed = started.elapsed();

    match result {
        Err(DatabaseError::Timeout(limit)) => assert_eq!(limit, Duration::from_secs(1)),
        Err(DatabaseError::Query(message)) => {
            let message = message.to_lowercase();
            assert!(
                message.contains("locked") || message.contains("busy"),
                "unexpected error: {message}"
            );
        }
        other => panic!("blocked writer should fail, got {other:?}"),
    }
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");

    tx.rollback().await.unwrap();
    writer
        .execute("INSERT INTO t (v) VALUES (?)", &[DatabaseValue::from("later")])
        .await
        .unwrap();
    holder.close().await.unwrap();
    writer.close().await.unwrap();
}
