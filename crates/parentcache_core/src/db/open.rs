//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.
//! - File connections opened through `open_store` honor the configured
//!   journal mode and busy timeout.

use super::config::StoreConfig;
use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file with default settings and applies all
/// pending migrations.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_store(&StoreConfig::new(path.as_ref()))
}

/// Opens the database described by `config` and applies all pending
/// migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_store(config: &StoreConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file");

    if config.path().as_os_str().is_empty() {
        error!(
            "event=db_open module=db status=error mode=file duration_ms={} error_code=db_path_empty",
            started_at.elapsed().as_millis()
        );
        return Err(DbError::InvalidConfig(
            "database path cannot be empty".to_string(),
        ));
    }

    let mut conn = match Connection::open(config.path()) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    let bootstrap = bootstrap_connection(&conn, config.busy_timeout)
        .and_then(|()| if config.wal { enable_wal(&conn) } else { Ok(()) })
        .and_then(|()| apply_migrations(&mut conn));

    match bootstrap {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode=file wal={} duration_ms={}",
                config.wal,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens an in-memory SQLite database and applies all pending migrations.
///
/// An in-memory database is private to its connection, so it serves
/// single-connection record store use only; isolated units of work need
/// `open_store`.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let mut conn = match Connection::open_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    let bootstrap = bootstrap_connection(&conn, super::DEFAULT_BUSY_TIMEOUT)
        .and_then(|()| apply_migrations(&mut conn));

    match bootstrap {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode=memory duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

fn enable_wal(conn: &Connection) -> DbResult<()> {
    // WAL persists in the file; only the first opener has to switch it, and
    // switching needs a lock a busy writer may hold.
    let current: String = conn.query_row("PRAGMA journal_mode;", [], |row| row.get(0))?;
    if current.eq_ignore_ascii_case("wal") {
        return Ok(());
    }

    // journal_mode answers with the resulting mode as a row.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        return Err(DbError::InvalidConfig(format!(
            "journal mode `{mode}` is not wal"
        )));
    }
    Ok(())
}
