//! Database schema migrations.
//!
//! Applies the conversation log and conversation metadata tables, tracked
//! in `schema_migrations`.

use rusqlite::Connection;
use tracing::info;

use zmai_core::error::ZmaiError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), ZmaiError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ZmaiError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ZmaiError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: conversations");
    }

    Ok(())
}

/// Version 1: message logs and metadata, keyed by the same conversation id.
fn apply_v1(conn: &Connection) -> Result<(), ZmaiError> {
    conn.execute_batch(
        "
        -- Serialized message array per conversation.
        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY NOT NULL,
            messages        TEXT NOT NULL DEFAULT '[]',
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        -- Parallel metadata record.
        CREATE TABLE IF NOT EXISTS conversations_meta (
            id              TEXT PRIMARY KEY NOT NULL,
            title           TEXT NOT NULL,
            color           TEXT NOT NULL,
            owner_id        TEXT,
            search_enabled  INTEGER NOT NULL DEFAULT 0
                            CHECK (search_enabled IN (0, 1)),
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_meta_owner
            ON conversations_meta (owner_id)
            WHERE owner_id IS NOT NULL;

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'conversations');
        ",
    )
    .map_err(|e| ZmaiError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
