//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection, now: i64) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;
            tracing::info!(version, "applied share store migration");

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per share. Terminal rows are tombstones: sealed and
        -- content_handle are NULL and counters are zero.
        CREATE TABLE shares (
            share_id BLOB PRIMARY KEY,        -- 32 random bytes
            status INTEGER NOT NULL,          -- ShareStatus as u8
            content_handle TEXT,              -- NULL once purged
            sealed BLOB,                      -- CBOR SealedKey, NULL once purged
            created_at INTEGER NOT NULL,      -- Unix ms
            expires_at INTEGER NOT NULL,      -- Unix ms, immutable
            failed_attempts INTEGER NOT NULL DEFAULT 0,
            lock_until INTEGER,               -- Unix ms
            lock_cycles INTEGER NOT NULL DEFAULT 0,
            closed_at INTEGER                 -- Unix ms of terminal transition
        );

        CREATE INDEX idx_shares_status_expires ON shares(status, expires_at);
        CREATE INDEX idx_shares_closed ON shares(closed_at);
        "#,
    )?;

    Ok(())
}

/// Migration v2: a content handle belongs to at most one live share.
///
/// Tombstones carry a NULL handle and fall outside the index.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE UNIQUE INDEX idx_shares_content_handle
            ON shares(content_handle)
            WHERE content_handle IS NOT NULL;
        "#,
    )?;

    Ok(())
}
