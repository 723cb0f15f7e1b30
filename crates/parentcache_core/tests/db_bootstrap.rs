use parentcache_core::db::migrations::latest_version;
use parentcache_core::db::{open_db, open_db_in_memory, open_store, DbError, StoreConfig};
use rusqlite::Connection;
use std::time::{Duration, Instant};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "parents");
    assert_table_exists(&conn, "children");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parents.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "children");
}

#[test]
fn file_database_runs_in_wal_mode_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_store(&StoreConfig::new(dir.path().join("wal.db"))).unwrap();

    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_ascii_lowercase(), "wal");
}

#[test]
fn wal_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("rollback.db")).with_wal(false);
    let conn = open_store(&config).unwrap();

    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_ascii_lowercase(), "delete");
}

#[test]
fn busy_timeout_defaults_to_five_seconds() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_store(&StoreConfig::new(dir.path().join("busy.db"))).unwrap();

    assert_eq!(busy_timeout_ms(&conn), 5_000);
}

#[test]
fn configured_busy_timeout_bounds_the_wait_for_a_held_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("busy.db");
    let config = StoreConfig::new(&path).with_busy_timeout(Duration::from_millis(150));

    let holder = open_store(&config).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let waiter = open_store(&config).unwrap();
    assert_eq!(busy_timeout_ms(&waiter), 150);

    let started_at = Instant::now();
    let err = waiter.execute_batch("BEGIN IMMEDIATE;").unwrap_err();
    let waited = started_at.elapsed();

    assert_eq!(err.sqlite_error_code(), Some(rusqlite::ErrorCode::DatabaseBusy));
    assert!(waited >= Duration::from_millis(100), "gave up after {waited:?}");
    assert!(waited < Duration::from_secs(3), "waited {waited:?}");

    holder.execute_batch("COMMIT;").unwrap();
    waiter.execute_batch("BEGIN IMMEDIATE; COMMIT;").unwrap();
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO children (name, parent_id) VALUES ('orphan', 42);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn empty_store_path_is_rejected() {
    let err = open_store(&StoreConfig::new("")).unwrap_err();
    assert!(matches!(err, DbError::InvalidConfig(_)));
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn busy_timeout_ms(conn: &Connection) -> i64 {
    conn.query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .unwrap()
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
