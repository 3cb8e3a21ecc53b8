//! SQLite ledger of pending (uncommitted) changes.
//!
//! One row per (project, user, path). A second write to the same key
//! replaces the first in a single `INSERT … ON CONFLICT DO UPDATE`, so two
//! writers racing on one path leave exactly one row behind.

use std::path::Path;
use std::time::SystemTime;

use folio_types::{PendingAction, PendingChange, ProjectId, UserId};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::blob::unix_millis;
use crate::error::{StorageError, StorageResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pending_changes (
    project_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    path TEXT NOT NULL,
    action TEXT NOT NULL,
    content TEXT,
    s3_key TEXT,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, user_id, path)
);
"#;

const COLUMNS: &str = "path, action, content, s3_key, updated_at";

/// Database handle for the pending-change overlay.
///
/// The connection sits behind a mutex; statements are short and never held
/// across an await.
pub struct PendingLedger {
    conn: Mutex<Connection>,
}

impl PendingLedger {
    /// Open or create a ledger at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory ledger (for testing).
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace the row for `path`.
    pub fn upsert(
        &self,
        project: ProjectId,
        user: UserId,
        path: &str,
        action: PendingAction,
        content: Option<&str>,
        s3_key: Option<&str>,
    ) -> StorageResult<()> {
        let now = unix_millis(SystemTime::now());
        self.conn.lock().execute(
            "INSERT INTO pending_changes
                (project_id, user_id, path, action, content, s3_key, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(project_id, user_id, path) DO UPDATE SET
                action = excluded.action,
                content = excluded.content,
                s3_key = excluded.s3_key,
                updated_at = excluded.updated_at",
            params![
                project.to_string(),
                user.to_string(),
                path,
                action.as_str(),
                content,
                s3_key,
                now
            ],
        )?;
        debug!(%project, %user, path, action = action.as_str(), "pending change recorded");
        Ok(())
    }

    pub fn get(
        &self,
        project: ProjectId,
        user: UserId,
        path: &str,
    ) -> StorageResult<Option<PendingChange>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM pending_changes
                     WHERE project_id = ?1 AND user_id = ?2 AND path = ?3"
                ),
                params![project.to_string(), user.to_string(), path],
                RawChange::from_row,
            )
            .optional()?;
        raw.map(RawChange::into_change).transpose()
    }

    /// Every row for the pair, ordered by path.
    pub fn list(&self, project: ProjectId, user: UserId) -> StorageResult<Vec<PendingChange>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM pending_changes
             WHERE project_id = ?1 AND user_id = ?2 ORDER BY path"
        ))?;
        let rows = stmt.query_map(
            params![project.to_string(), user.to_string()],
            RawChange::from_row,
        )?;

        let mut changes = Vec::new();
        for raw in rows {
            changes.push(raw?.into_change()?);
        }
        Ok(changes)
    }

    /// Drop one row. Returns whether it existed.
    pub fn remove(&self, project: ProjectId, user: UserId, path: &str) -> StorageResult<bool> {
        let removed = self.conn.lock().execute(
            "DELETE FROM pending_changes WHERE project_id = ?1 AND user_id = ?2 AND path = ?3",
            params![project.to_string(), user.to_string(), path],
        )?;
        if removed > 0 {
            debug!(%project, %user, path, "pending change removed");
        }
        Ok(removed > 0)
    }

    /// Drop every row for the pair in one transaction. Returns the row count.
    pub fn clear(&self, project: ProjectId, user: UserId) -> StorageResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM pending_changes WHERE project_id = ?1 AND user_id = ?2",
            params![project.to_string(), user.to_string()],
        )?;
        tx.commit()?;
        debug!(%project, %user, removed, "pending changes cleared");
        Ok(removed)
    }
}

/// A row before its action tag is validated.
struct RawChange {
    path: String,
    action: String,
    content: Option<String>,
    s3_key: Option<String>,
    updated_at: i64,
}

impl RawChange {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            action: row.get(1)?,
            content: row.get(2)?,
            s3_key: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn into_change(self) -> StorageResult<PendingChange> {
        let action = PendingAction::from_str(&self.action)
            .ok_or_else(|| StorageError::InvalidAction(self.action.clone()))?;
        Ok(PendingChange {
            path: self.path,
            action,
            content: self.content,
            s3_key: self.s3_key,
            updated_at: self.updated_at,
        })
    }
}
