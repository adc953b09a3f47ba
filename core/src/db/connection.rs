//! Connection pooling and pragma configuration

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use super::{DbError, Result};

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a writer waits on a locked database before SQLITE_BUSY
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize a connection pool for the database at `db_path`.
///
/// Every pooled connection runs in WAL mode with foreign keys enforced and a
/// busy timeout, so concurrent writers queue instead of failing. The parent
/// directory is created when missing.
pub fn initialize_pool(db_path: &Path, pool_size: u32) -> Result<DbPool> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            DbError::Pool(format!("cannot create {}: {e}", parent.display()))
        })?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(apply_pragmas);
    let pool = Pool::builder().max_size(pool_size).build(manager)?;

    let conn = pool.get()?;
    verify_pragmas(&conn)?;

    tracing::info!(
        path = %db_path.display(),
        pool_size,
        "SQLite pool initialized"
    );
    Ok(pool)
}

/// Open a private in-memory database with the same pragmas and the latest
/// schema.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", true)?;
    super::migrate_to_latest(&mut conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(mode, "SQLite refused WAL journal mode");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

fn verify_pragmas(conn: &Connection) -> Result<()> {
    let foreign_keys: bool = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
    if !foreign_keys {
        return Err(DbError::Pool(
            "foreign key enforcement is disabled on pooled connections".to_string(),
        ));
    }
    Ok(())
}
