//! Local SQLite database layer for Tandoor POS.
//!
//! Uses rusqlite in WAL mode, mirroring the browser frontend's durable
//! localStorage contract: a `local_store` key/value table carries the
//! serialized cart and session state, and `pending_orders` holds the
//! offline checkout queue. Provides schema migrations and a shared
//! `DbState` handle.

use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Shared handle to the local database connection.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Initialize the database at `{data_dir}/orders.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(data_dir: &Path) -> Result<DbState, String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data dir: {e}"))?;

    let db_path = data_dir.join("orders.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                // Also remove WAL/SHM files if present
                let wal = db_path.with_extension("db-wal");
                let shm = db_path.with_extension("db-shm");
                let _ = fs::remove_file(&wal);
                let _ = fs::remove_file(&shm);
            }
            open_and_configure(&db_path)
                .map_err(|e| format!("Database open failed after retry: {e}"))?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| format!("pragma setup: {e}"))?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), String> {
    // Ensure schema_version table exists first
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("create schema_version: {e}"))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    if current < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Migration v1: key/value store mirroring the frontend's localStorage.
fn migrate_v1(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        -- local_store (key/value, one row per storage key)
        CREATE TABLE IF NOT EXISTS local_store (
            store_key TEXT PRIMARY KEY,
            store_value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now'))
        );

        -- Record migration
        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        format!("migration v1: {e}")
    })
}

/// Migration v2: pending-orders queue for offline checkout.
///
/// The autoincrement id doubles as the replay ordering: sends during a
/// flush must happen in insertion order.
fn migrate_v2(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pending_orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload TEXT NOT NULL,
            idempotency_key TEXT UNIQUE NOT NULL,
            created_at TEXT DEFAULT (datetime('now'))
        );

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )
    .map_err(|e| {
        error!("Migration v2 failed: {e}");
        format!("migration v2: {e}")
    })
}

/// Migration v3: retry bookkeeping on queued orders.
fn migrate_v3(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        ALTER TABLE pending_orders ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE pending_orders ADD COLUMN last_error TEXT;

        INSERT INTO schema_version (version) VALUES (3);
        ",
    )
    .map_err(|e| {
        error!("Migration v3 failed: {e}");
        format!("migration v3: {e}")
    })
}

/// Run all migrations against an arbitrary connection. Test hook.
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("migrations");
}

// ---------------------------------------------------------------------------
// Key/value store
// ---------------------------------------------------------------------------

/// Read a value from `local_store`. Returns `None` on a missing key, a
/// poisoned lock, or any SQL error; boot paths must never fail because
/// of a bad stored value.
pub fn kv_get(db: &DbState, key: &str) -> Option<String> {
    let conn = match db.conn.lock() {
        Ok(c) => c,
        Err(e) => {
            error!(key, "local_store lock failed: {e}");
            return None;
        }
    };

    conn.query_row(
        "SELECT store_value FROM local_store WHERE store_key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .unwrap_or_else(|e| {
        warn!(key, error = %e, "local_store read failed");
        None
    })
}

/// Upsert a value into `local_store`.
pub fn kv_put(db: &DbState, key: &str, value: &str) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO local_store (store_key, store_value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(store_key) DO UPDATE SET
            store_value = excluded.store_value,
            updated_at = excluded.updated_at",
        params![key, value],
    )
    .map_err(|e| format!("local_store write [{key}]: {e}"))?;
    Ok(())
}

/// Delete a key from `local_store`. Silently succeeds if absent.
pub fn kv_delete(db: &DbState, key: &str) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "DELETE FROM local_store WHERE store_key = ?1",
        params![key],
    )
    .map_err(|e| format!("local_store delete [{key}]: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        run_migrations_for_test(&conn);
        DbState {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = test_db();
        let conn = db.conn.lock().unwrap();
        run_migrations(&conn).expect("second run");

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_kv_roundtrip_and_overwrite() {
        let db = test_db();
        assert_eq!(kv_get(&db, "token"), None);

        kv_put(&db, "token", "abc").unwrap();
        assert_eq!(kv_get(&db, "token").as_deref(), Some("abc"));

        kv_put(&db, "token", "def").unwrap();
        assert_eq!(kv_get(&db, "token").as_deref(), Some("def"));

        kv_delete(&db, "token").unwrap();
        assert_eq!(kv_get(&db, "token"), None);
    }

    #[test]
    fn test_kv_delete_missing_key_is_ok() {
        let db = test_db();
        kv_delete(&db, "never-set").unwrap();
    }
}
