use rusqlite::Connection;
use tracing::info;

use crate::error::{StateError, StateResult};

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS state (
        key        TEXT PRIMARY KEY,
        value      BLOB NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS feedback (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_hash TEXT NOT NULL,
        category    TEXT NOT NULL,
        severity    INTEGER NOT NULL,
        params      BLOB NOT NULL,
        timestamp   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_feedback_commit_category ON feedback (commit_hash, category);
    CREATE INDEX IF NOT EXISTS idx_feedback_timestamp ON feedback (timestamp);
    CREATE TABLE IF NOT EXISTS schema_meta (
        id             INTEGER PRIMARY KEY CHECK (id = 0),
        schema_version INTEGER NOT NULL
    );
";

/// Create tables if missing and check the stored schema version.
pub fn init(conn: &Connection) -> StateResult<()> {
    conn.execute_batch(SCHEMA)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO schema_meta (id, schema_version) VALUES (0, ?1)",
        [SCHEMA_VERSION],
    )?;
    if inserted == 1 {
        info!(version = SCHEMA_VERSION, "state schema initialized");
    }
    let found: i64 = conn.query_row("SELECT schema_version FROM schema_meta WHERE id = 0", [], |row| {
        row.get(0)
    })?;
    if found != SCHEMA_VERSION {
        return Err(StateError::SchemaVersion {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}
