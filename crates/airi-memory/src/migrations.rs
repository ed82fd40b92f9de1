//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::{MemoryError, Result};

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MemoryError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MemoryError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: session_memory");
    }

    Ok(())
}

/// Version 1: keyed session entries with an absolute expiry.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS session_memory (
            key         TEXT PRIMARY KEY NOT NULL,
            value       TEXT NOT NULL,
            -- Unix epoch milliseconds.
            expires_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_session_memory_expires
            ON session_memory (expires_at);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'session_memory');
        ",
    )
    .map_err(|e| MemoryError::Storage(format!("Failed to apply migration v1: {}", e)))?;
    Ok(())
}
