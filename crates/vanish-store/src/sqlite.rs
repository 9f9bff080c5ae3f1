//! SQLite implementation of the ShareStore trait.
//!
//! The durable storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Compare-and-transition runs
//! inside a `BEGIN IMMEDIATE` transaction so it stays atomic even when
//! several processes share the database file.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use vanish_core::{Clock, ContentHandle, SealedKey, ShareId, ShareRecord, ShareStatus, SystemClock};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, RemoveResult, ShareStore, Transition, TransitionResult};

const SELECT_COLUMNS: &str = "share_id, status, content_handle, sealed, created_at, expires_at,
     failed_attempts, lock_until, lock_cycles, closed_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // Overwrite freed pages so purged keys do not linger in the file.
        conn.pragma_update_and_check(None, "secure_delete", "ON", |row| row.get::<_, i64>(0))?;
        migration::migrate(&mut conn, SystemClock.now_millis())?;
        tracing::debug!(version = migration::CURRENT_VERSION, "sqlite share store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Raw column values, converted to a record outside the rusqlite closure.
struct ShareRow {
    share_id: Vec<u8>,
    status: u8,
    content_handle: Option<String>,
    sealed: Option<Vec<u8>>,
    created_at: i64,
    expires_at: i64,
    failed_attempts: u32,
    lock_until: Option<i64>,
    lock_cycles: u32,
    closed_at: Option<i64>,
}

impl ShareRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            share_id: row.get("share_id")?,
            status: row.get("status")?,
            content_handle: row.get("content_handle")?,
            sealed: row.get("sealed")?,
            created_at: row.get("created_at")?,
            expires_at: row.get("expires_at")?,
            failed_attempts: row.get("failed_attempts")?,
            lock_until: row.get("lock_until")?,
            lock_cycles: row.get("lock_cycles")?,
            closed_at: row.get("closed_at")?,
        })
    }

    fn into_record(self) -> Result<ShareRecord> {
        let share_id = ShareId::try_from(self.share_id.as_slice())
            .map_err(|_| StoreError::InvalidData("share_id is not 32 bytes".into()))?;

        let sealed = self.sealed.as_deref().map(decode_sealed).transpose()?;

        Ok(ShareRecord {
            share_id,
            status: ShareStatus::from_u8(self.status)?,
            content_handle: self.content_handle.map(ContentHandle),
            sealed,
            created_at: self.created_at,
            expires_at: self.expires_at,
            failed_attempts: self.failed_attempts,
            lock_until: self.lock_until,
            lock_cycles: self.lock_cycles,
            closed_at: self.closed_at,
        })
    }
}

fn encode_sealed(sealed: &SealedKey) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(sealed, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_sealed(bytes: &[u8]) -> Result<SealedKey> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn select_record(conn: &Connection, id: &ShareId) -> Result<Option<ShareRecord>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM shares WHERE share_id = ?1", SELECT_COLUMNS),
            params![id.as_bytes().as_slice()],
            ShareRow::from_row,
        )
        .optional()?;

    row.map(ShareRow::into_record).transpose()
}

fn update_record(conn: &Connection, record: &ShareRecord) -> Result<()> {
    let sealed = record.sealed.as_ref().map(encode_sealed).transpose()?;

    conn.execute(
        "UPDATE shares SET
            status = ?2, content_handle = ?3, sealed = ?4,
            failed_attempts = ?5, lock_until = ?6, lock_cycles = ?7, closed_at = ?8
         WHERE share_id = ?1",
        params![
            record.share_id.as_bytes().as_slice(),
            record.status.to_u8(),
            record.content_handle.as_ref().map(|h| h.as_str()),
            sealed,
            record.failed_attempts,
            record.lock_until,
            record.lock_cycles,
            record.closed_at,
        ],
    )?;

    Ok(())
}

#[async_trait]
impl ShareStore for SqliteStore {
    async fn insert(&self, record: &ShareRecord) -> Result<InsertResult> {
        let record = record.clone();

        self.run(move |conn| {
            let sealed = record.sealed.as_ref().map(encode_sealed).transpose()?;
            let handle = record.content_handle.as_ref().map(|h| h.as_str());
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let id_taken = tx
                .query_row(
                    "SELECT 1 FROM shares WHERE share_id = ?1",
                    params![record.share_id.as_bytes().as_slice()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if id_taken {
                return Ok(InsertResult::AlreadyExists);
            }

            if let Some(handle) = handle {
                let handle_taken = tx
                    .query_row(
                        "SELECT 1 FROM shares WHERE content_handle = ?1",
                        params![handle],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if handle_taken {
                    return Ok(InsertResult::ContentInUse);
                }
            }

            tx.execute(
                "INSERT INTO shares (
                    share_id, status, content_handle, sealed, created_at, expires_at,
                    failed_attempts, lock_until, lock_cycles, closed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.share_id.as_bytes().as_slice(),
                    record.status.to_u8(),
                    handle,
                    sealed,
                    record.created_at,
                    record.expires_at,
                    record.failed_attempts,
                    record.lock_until,
                    record.lock_cycles,
                    record.closed_at,
                ],
            )?;
            tx.commit()?;

            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get(&self, id: &ShareId) -> Result<Option<ShareRecord>> {
        let id = *id;
        self.run(move |conn| select_record(conn, &id)).await
    }

    async fn compare_and_transition(
        &self,
        id: &ShareId,
        transition: Transition,
    ) -> Result<TransitionResult> {
        let id = *id;

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(mut record) = select_record(&tx, &id)? else {
                return Ok(TransitionResult::NotFound);
            };

            if record.status != transition.expected {
                return Ok(TransitionResult::Conflict {
                    current: record.status,
                });
            }

            let released = transition.apply(&mut record);
            update_record(&tx, &record)?;
            tx.commit()?;

            Ok(TransitionResult::Applied { record, released })
        })
        .await
    }

    async fn remove(&self, id: &ShareId) -> Result<RemoveResult> {
        let id = *id;

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let handle: Option<Option<String>> = tx
                .query_row(
                    "SELECT content_handle FROM shares WHERE share_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(handle) = handle else {
                return Ok(RemoveResult::NotFound);
            };

            tx.execute(
                "DELETE FROM shares WHERE share_id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            tx.commit()?;

            Ok(RemoveResult::Removed {
                released: handle.map(ContentHandle),
            })
        })
        .await
    }

    async fn list_active(&self) -> Result<Vec<(ShareId, i64)>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT share_id, expires_at FROM shares WHERE status = ?1 ORDER BY expires_at",
            )?;

            let rows: Vec<(Vec<u8>, i64)> = stmt
                .query_map(params![ShareStatus::Active.to_u8()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(id, expires_at)| {
                    ShareId::try_from(id.as_slice())
                        .map(|id| (id, expires_at))
                        .map_err(|_| StoreError::InvalidData("share_id is not 32 bytes".into()))
                })
                .collect()
        })
        .await
    }

    async fn reap_tombstones(&self, closed_before: i64) -> Result<usize> {
        self.run(move |conn| {
            let reaped = conn.execute(
                "DELETE FROM shares WHERE closed_at IS NOT NULL AND closed_at < ?1",
                params![closed_before],
            )?;
            Ok(reaped)
        })
        .await
    }
}
