//! libSQL backend: async `Store` implementation.
//!
//! Each table holds the record's JSON form keyed by id. Supports local file
//! and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{decode, encode};
use crate::error::DatabaseError;
use crate::model::{Approval, Message};
use crate::store::migrations;
use crate::store::traits::Store;

/// libSQL storage backend.
///
/// A single connection is shared by all operations. Writes are serialized
/// through `write_lock` so that a multi-statement transaction never has a
/// concurrent write interleaved into it.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Fetch the `data` column of one row, if present.
    async fn fetch_data(&self, sql: &str, id: &str) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("{sql}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let data: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(data))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{sql}: {e}"))),
        }
    }

    /// Fetch and decode every `data` column returned by `sql`.
    async fn fetch_all<T: serde::de::DeserializeOwned>(
        &self,
        entity: &str,
        sql: &str,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, ())
            .await
            .map_err(|e| DatabaseError::Query(format!("{sql}: {e}")))?;

        let mut out = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => {
                    let data: String = row
                        .get(0)
                        .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                    out.push(decode(entity, &data)?);
                }
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{sql}: {e}"))),
            }
        }
        Ok(out)
    }

    async fn upsert_reject(&self, message: &Message, data: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO rejected (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![message.id.as_str(), data, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("store_reject: {e}")))?;
        Ok(())
    }

    /// Statements of `resolve_approval`; caller owns the transaction.
    async fn resolve_in_tx(
        &self,
        approval_id: &str,
        message: &Message,
        data: &str,
        record_reject: bool,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let deleted = conn
            .execute("DELETE FROM approvals WHERE id = ?1", params![approval_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("resolve_approval delete: {e}")))?;
        if deleted == 0 {
            return Err(DatabaseError::not_found("approval", approval_id));
        }

        let now = Utc::now().to_rfc3339();
        let updated = conn
            .execute(
                "UPDATE messages SET data = ?1, updated_at = ?2 WHERE id = ?3",
                params![data, now, message.id.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("resolve_approval update: {e}")))?;
        if updated == 0 {
            return Err(DatabaseError::not_found("message", &message.id));
        }

        if record_reject {
            self.upsert_reject(message, data).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for LibSqlStore {
    // ── Approvals ───────────────────────────────────────────────────

    async fn store_approval(&self, approval: &Approval) -> Result<(), DatabaseError> {
        let data = encode("approval", approval)?;
        let now = Utc::now().to_rfc3339();
        let _guard = self.write_lock.lock().await;
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO approvals (id, message_id, data, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![approval.id.as_str(), approval.message_id.as_str(), data, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("store_approval: {e}")))?;

        if inserted == 0 {
            return Err(DatabaseError::duplicate("approval", &approval.id));
        }
        debug!(approval_id = %approval.id, message_id = %approval.message_id, "Approval inserted");
        Ok(())
    }

    async fn get_approval(&self, id: &str) -> Result<Approval, DatabaseError> {
        let data = self
            .fetch_data("SELECT data FROM approvals WHERE id = ?1", id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("approval", id))?;
        decode("approval", &data)
    }

    async fn get_all_approvals(&self) -> Result<Vec<Approval>, DatabaseError> {
        self.fetch_all("approval", "SELECT data FROM approvals ORDER BY rowid ASC")
            .await
    }

    async fn delete_approval(&self, id: &str) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let deleted = self
            .conn()
            .execute("DELETE FROM approvals WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_approval: {e}")))?;

        if deleted == 0 {
            return Err(DatabaseError::not_found("approval", id));
        }
        Ok(())
    }

    // ── Rejections ──────────────────────────────────────────────────

    async fn store_reject(&self, message: &Message) -> Result<(), DatabaseError> {
        let data = encode("rejected message", message)?;
        let _guard = self.write_lock.lock().await;
        self.upsert_reject(message, &data).await?;
        debug!(message_id = %message.id, "Rejection recorded");
        Ok(())
    }

    async fn get_all_rejected(&self) -> Result<Vec<Message>, DatabaseError> {
        self.fetch_all("rejected message", "SELECT data FROM rejected ORDER BY rowid ASC")
            .await
    }

    // ── Messages ────────────────────────────────────────────────────

    async fn store_message(&self, message: &Message) -> Result<(), DatabaseError> {
        let data = encode("message", message)?;
        let now = Utc::now().to_rfc3339();
        let _guard = self.write_lock.lock().await;
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO messages (id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![message.id.as_str(), data, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("store_message: {e}")))?;

        if inserted == 0 {
            return Err(DatabaseError::duplicate("message", &message.id));
        }
        debug!(message_id = %message.id, "Message inserted");
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Message, DatabaseError> {
        let data = self
            .fetch_data("SELECT data FROM messages WHERE id = ?1", id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("message", id))?;
        decode("message", &data)
    }

    async fn update_message(&self, message: &Message) -> Result<(), DatabaseError> {
        let data = encode("message", message)?;
        let now = Utc::now().to_rfc3339();
        let _guard = self.write_lock.lock().await;
        let updated = self
            .conn()
            .execute(
                "UPDATE messages SET data = ?1, updated_at = ?2 WHERE id = ?3",
                params![data, now, message.id.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_message: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::not_found("message", &message.id));
        }
        debug!(message_id = %message.id, status = ?message.status, "Message updated");
        Ok(())
    }

    async fn get_all_messages(&self) -> Result<Vec<Message>, DatabaseError> {
        self.fetch_all("message", "SELECT data FROM messages ORDER BY rowid ASC")
            .await
    }

    // ── Compound ────────────────────────────────────────────────────

    async fn resolve_approval(
        &self,
        approval_id: &str,
        message: &Message,
        record_reject: bool,
    ) -> Result<(), DatabaseError> {
        let data = encode("message", message)?;
        let _guard = self.write_lock.lock().await;
        let conn = self.conn();

        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("resolve_approval begin: {e}")))?;

        match self
            .resolve_in_tx(approval_id, message, &data, record_reject)
            .await
        {
            Ok(()) => {
                conn.execute("COMMIT", ())
                    .await
                    .map_err(|e| DatabaseError::Query(format!("resolve_approval commit: {e}")))?;
                debug!(approval_id = approval_id, message_id = %message.id, "Approval resolved");
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = conn.execute("ROLLBACK", ()).await {
                    tracing::error!(error = %rb, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}
