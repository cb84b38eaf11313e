//! SQLite store backend.
//!
//! Durable backend over a sqlx pool. The `sessions` table carries the
//! `UNIQUE (document_id, user_id)` constraint that turns admission races into
//! deterministic unique-violation failures, and `component_mirror` is indexed
//! by session for bulk delete. All multi-row writes run inside a transaction;
//! a transaction dropped without commit rolls back.

use crate::error::StoreError;
use crate::mirror::ComponentMirrorEntry;
use crate::presence::{SessionRole, SessionRow};
use crate::store::CoordinatorStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagecraft_common::{ComponentId, DocumentId, SessionId, UserId, VersionId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool, Transaction};
use std::path::Path;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sessions (
        session_id    TEXT PRIMARY KEY,
        document_id   TEXT NOT NULL,
        version_id    TEXT NOT NULL,
        user_id       TEXT NOT NULL,
        role          TEXT NOT NULL,
        node_affinity TEXT NOT NULL,
        client_origin TEXT NOT NULL,
        opened_at     TEXT NOT NULL,
        last_action   TEXT NOT NULL,
        UNIQUE (document_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS component_mirror (
        session_id   TEXT NOT NULL,
        component_id TEXT NOT NULL,
        slot_path    TEXT NOT NULL,
        payload      TEXT NOT NULL,
        PRIMARY KEY (session_id, component_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_component_mirror_session
        ON component_mirror (session_id)",
];

const SESSION_COLUMNS: &str = "session_id, document_id, version_id, user_id, role, \
     node_affinity, client_origin, opened_at, last_action";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        // SQLite serializes writers anyway; a single pooled connection keeps
        // whole transactions serialized instead of failing halfway with BUSY.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        tracing::debug!(path = %path.display(), "opened session store");
        Ok(Self { pool })
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn decode_session(row: &SqliteRow) -> Result<SessionRow, StoreError> {
    let session_id: String = row.try_get("session_id")?;
    let document_id: String = row.try_get("document_id")?;
    let version_id: String = row.try_get("version_id")?;
    let user_id: String = row.try_get("user_id")?;
    let role: String = row.try_get("role")?;

    Ok(SessionRow {
        session_id: session_id.parse::<SessionId>()?,
        document_id: document_id.parse::<DocumentId>()?,
        version_id: version_id.parse::<VersionId>()?,
        user_id: UserId::new(user_id),
        role: role.parse::<SessionRole>()?,
        node_affinity: row.try_get("node_affinity")?,
        client_origin: row.try_get("client_origin")?,
        opened_at: row.try_get("opened_at")?,
        last_action: row.try_get("last_action")?,
    })
}

fn decode_entry(row: &SqliteRow) -> Result<ComponentMirrorEntry, StoreError> {
    let session_id: String = row.try_get("session_id")?;
    let component_id: String = row.try_get("component_id")?;
    let payload: String = row.try_get("payload")?;

    Ok(ComponentMirrorEntry {
        session_id: session_id.parse::<SessionId>()?,
        component_id: ComponentId::new(component_id),
        slot_path: row.try_get("slot_path")?,
        payload: serde_json::from_str(&payload).map_err(|e| StoreError::Corrupt(e.to_string()))?,
    })
}

async fn insert_session_row(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    row: &SessionRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sessions (session_id, document_id, version_id, user_id, role, \
         node_affinity, client_origin, opened_at, last_action) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(row.session_id.to_string())
    .bind(row.document_id.to_string())
    .bind(row.version_id.to_string())
    .bind(row.user_id.as_str())
    .bind(row.role.as_str())
    .bind(&row.node_affinity)
    .bind(&row.client_origin)
    .bind(row.opened_at)
    .bind(row.last_action)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_entries(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    entries: &[ComponentMirrorEntry],
) -> Result<(), StoreError> {
    for entry in entries {
        let payload =
            serde_json::to_string(&entry.payload).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        sqlx::query(
            "INSERT INTO component_mirror (session_id, component_id, slot_path, payload) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(entry.session_id.to_string())
        .bind(entry.component_id.as_str())
        .bind(&entry.slot_path)
        .bind(payload)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn delete_session_rows(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    session_id: SessionId,
) -> Result<bool, StoreError> {
    sqlx::query("DELETE FROM component_mirror WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(&mut **tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(&mut **tx)
        .await?;

    Ok(deleted.rows_affected() > 0)
}

#[async_trait]
impl CoordinatorStore for SqliteStore {
    async fn find_active(
        &self,
        document_id: DocumentId,
        user_id: &UserId,
    ) -> Result<Option<SessionRow>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE document_id = ? AND user_id = ?"
        ))
        .bind(document_id.to_string())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_session).transpose()
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<SessionRow>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?"
        ))
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_session).transpose()
    }

    async fn sessions_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SessionRow>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE document_id = ? ORDER BY opened_at"
        ))
        .bind(document_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_session).collect()
    }

    async fn components_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ComponentMirrorEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT session_id, component_id, slot_path, payload \
             FROM component_mirror WHERE session_id = ? ORDER BY component_id",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_entry).collect()
    }

    async fn insert_session(
        &self,
        row: SessionRow,
        entries: Vec<ComponentMirrorEntry>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Err(e) = insert_session_row(&mut tx, &row).await {
            if is_unique_violation(&e) {
                return Err(StoreError::DuplicateSession {
                    document_id: row.document_id,
                    user_id: row.user_id,
                });
            }
            return Err(e.into());
        }

        insert_entries(&mut tx, &entries).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn supersede_session(
        &self,
        previous: SessionId,
        row: SessionRow,
        entries: Vec<ComponentMirrorEntry>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // The delete doubles as the precondition check: zero rows means the
        // target is gone or no longer holds the key.
        let deleted = sqlx::query(
            "DELETE FROM sessions WHERE session_id = ? AND document_id = ? AND user_id = ?",
        )
        .bind(previous.to_string())
        .bind(row.document_id.to_string())
        .bind(row.user_id.as_str())
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::SessionVanished {
                session_id: previous,
            });
        }

        sqlx::query("DELETE FROM component_mirror WHERE session_id = ?")
            .bind(previous.to_string())
            .execute(&mut *tx)
            .await?;

        if let Err(e) = insert_session_row(&mut tx, &row).await {
            if is_unique_violation(&e) {
                return Err(StoreError::DuplicateSession {
                    document_id: row.document_id,
                    user_id: row.user_id,
                });
            }
            return Err(e.into());
        }

        insert_entries(&mut tx, &entries).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let existed = delete_session_rows(&mut tx, session_id).await?;
        tx.commit().await?;
        Ok(existed)
    }

    async fn touch(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let updated = sqlx::query("UPDATE sessions SET last_action = ? WHERE session_id = ?")
            .bind(now)
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn update_role(
        &self,
        session_id: SessionId,
        role: SessionRole,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query("UPDATE sessions SET role = ? WHERE session_id = ?")
            .bind(role.as_str())
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionRow>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE last_action < ?"
        ))
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        let stale: Vec<SessionRow> = rows
            .iter()
            .map(decode_session)
            .collect::<Result<_, _>>()?;

        for session in &stale {
            delete_session_rows(&mut tx, session.session_id).await?;
        }

        tx.commit().await?;
        Ok(stale)
    }
}
