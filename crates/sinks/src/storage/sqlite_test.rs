//! Tests for the SQLite storage engine

use beacon_protocol::{Bytes, Decimal, LeafValue};
use chrono::{TimeDelta, TimeZone, Utc};
use sqlx::Row;
use tempfile::TempDir;

use super::{SqliteStorage, Storage};
use crate::StorageError;

async fn storage_with_table() -> SqliteStorage {
    let storage = SqliteStorage::in_memory().await.unwrap();
    storage
        .execute_ddl(
            "CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY, \"a.b\" TEXT, \"n[0]\" BIGINT, \"big\" TEXT)",
        )
        .await
        .unwrap();
    storage
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn test_table_exists() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    assert!(!storage.table_exists("t").await.unwrap());

    storage.execute_ddl("CREATE TABLE \"t\" (x TEXT)").await.unwrap();
    assert!(storage.table_exists("t").await.unwrap());
    assert!(!storage.table_exists("T2").await.unwrap());
}

#[tokio::test]
async fn test_table_exists_ignores_case() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    storage.execute_ddl("CREATE TABLE \"Checkout\" (x TEXT)").await.unwrap();

    assert!(storage.table_exists("checkout").await.unwrap());
    assert!(storage.table_exists("CHECKOUT").await.unwrap());
}

#[tokio::test]
async fn test_duplicate_ddl_fails() {
    let storage = storage_with_table().await;
    let err = storage
        .execute_ddl("CREATE TABLE \"t\" (x TEXT)")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Database(_)));
}

#[tokio::test]
async fn test_insert_binds_parameters() {
    let storage = storage_with_table().await;
    storage
        .insert(
            "t",
            &columns(&["a.b", "n[0]", "big"]),
            &[
                LeafValue::from("it's \"quoted\"; DROP TABLE t"),
                LeafValue::from(-5_i64),
                LeafValue::from(u64::MAX),
            ],
        )
        .await
        .unwrap();

    let row = sqlx::query("SELECT \"a.b\", \"n[0]\", \"big\" FROM \"t\"")
        .fetch_one(storage.pool())
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>(0), "it's \"quoted\"; DROP TABLE t");
    assert_eq!(row.get::<i64, _>(1), -5);
    assert_eq!(row.get::<String, _>(2), u64::MAX.to_string());
}

#[tokio::test]
async fn test_insert_every_leaf_kind() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    storage
        .execute_ddl(
            "CREATE TABLE \"all\" (id INTEGER PRIMARY KEY, s TEXT, i8 SMALLINT, u8 SMALLINT, i16 SMALLINT, \
             u16 INTEGER, i32 INTEGER, u32 BIGINT, i64 BIGINT, u64 DECIMAL(20,0), f32 REAL, \
             f64 DOUBLE PRECISION, b BOOLEAN, d DECIMAL, dt TIMESTAMP, dur BIGINT, bytes BLOB, \
             chars TEXT, c TEXT, e INTEGER)",
        )
        .await
        .unwrap();

    let values = vec![
        LeafValue::from("s"),
        LeafValue::from(-8_i8),
        LeafValue::from(8_u8),
        LeafValue::from(-16_i16),
        LeafValue::from(16_u16),
        LeafValue::from(-32_i32),
        LeafValue::from(32_u32),
        LeafValue::from(-64_i64),
        LeafValue::from(64_u64),
        LeafValue::from(1.5_f32),
        LeafValue::from(2.25_f64),
        LeafValue::from(true),
        LeafValue::from(Decimal::new(1234, 2).unwrap()),
        LeafValue::from(Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()),
        LeafValue::from(TimeDelta::milliseconds(1500)),
        LeafValue::from(Bytes::from_static(b"\x00\x01")),
        LeafValue::from(vec!['h', 'i']),
        LeafValue::from('z'),
        LeafValue::Enum {
            type_name: "app.Level".into(),
            value: 3,
        },
    ];
    let names = columns(&[
        "s", "i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64", "f32", "f64", "b", "d", "dt",
        "dur", "bytes", "chars", "c", "e",
    ]);
    storage.insert("all", &names, &values).await.unwrap();

    let row = sqlx::query("SELECT dur, bytes, chars, e, b FROM \"all\"")
        .fetch_one(storage.pool())
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>(0), 1_500_000_000);
    assert_eq!(row.get::<Vec<u8>, _>(1), vec![0, 1]);
    assert_eq!(row.get::<String, _>(2), "hi");
    assert_eq!(row.get::<i32, _>(3), 3);
    assert!(row.get::<bool, _>(4));
}

#[tokio::test]
async fn test_insert_without_columns_uses_defaults() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    storage
        .execute_ddl("CREATE TABLE \"empty\" (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();
    storage.insert("empty", &[], &[]).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM \"empty\"")
        .fetch_one(storage.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_insert_length_mismatch() {
    let storage = storage_with_table().await;
    let err = storage
        .insert("t", &columns(&["a.b"]), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Schema(_)));
}

#[tokio::test]
async fn test_insert_into_missing_table_fails() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let err = storage
        .insert("nope", &columns(&["x"]), &[LeafValue::from(1_i32)])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Database(_)));
}

#[tokio::test]
async fn test_open_creates_file_and_parent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("events.db");

    let storage = SqliteStorage::open(&path).await.unwrap();
    storage.execute_ddl("CREATE TABLE x (y TEXT)").await.unwrap();

    assert!(path.exists());
    assert_eq!(storage.name(), "sqlite");
}
