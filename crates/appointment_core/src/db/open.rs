//! Connection bootstrap for file and in-memory stores.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have the `casefold` SQL function registered.
//! - Returned connections have every migration applied.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::config::StoreConfig;
use log::{error, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Name of the Unicode-aware lowercase SQL function.
pub const CASEFOLD_FUNCTION: &str = "casefold";

/// Busy timeout used when the caller does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a database file with the default busy timeout.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
}

/// Opens a database file and applies pending migrations.
///
/// # Side effects
/// - Creates the file when it does not exist.
/// - Emits `db_open` events with duration and status.
pub fn open_db_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    let path = path.as_ref();
    open_logged("file", busy_timeout, || Connection::open(path))
}

/// Opens a private in-memory database with all migrations applied.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_logged("memory", DEFAULT_BUSY_TIMEOUT, Connection::open_in_memory)
}

/// Opens the store described by `config`.
///
/// A missing `database_path` selects an in-memory database.
pub fn open_configured(config: &StoreConfig) -> DbResult<Connection> {
    let busy_timeout = config.busy_timeout();
    match config.database_path.as_deref() {
        Some(path) => open_db_with_timeout(path, busy_timeout),
        None => open_logged("memory", busy_timeout, Connection::open_in_memory),
    }
}

fn open_logged(
    mode: &'static str,
    busy_timeout: Duration,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = connect().map_err(|err| {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
            started_at.elapsed().as_millis()
        );
        err
    })?;

    if let Err(err) = bootstrap_connection(&mut conn, busy_timeout) {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
            started_at.elapsed().as_millis()
        );
        return Err(err);
    }

    info!(
        "event=db_open module=db status=ok mode={mode} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    register_casefold(conn)?;
    apply_migrations(conn)?;
    Ok(())
}

/// Registers `casefold(text)`, a full Unicode lowercase. SQLite's own
/// `lower()` folds ASCII only. NULL stays NULL.
fn register_casefold(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        CASEFOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|text| text.to_lowercase()))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::open_db_in_memory;

    #[test]
    fn casefold_lowercases_beyond_ascii() {
        let conn = open_db_in_memory().unwrap();

        let folded: String = conn
            .query_row("SELECT casefold('ÄUSSERE STRAẞE');", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "äussere straße");

        let null: Option<String> = conn
            .query_row("SELECT casefold(NULL);", [], |row| row.get(0))
            .unwrap();
        assert!(null.is_none());
    }
}
