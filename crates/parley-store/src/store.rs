//! The embedded document store.
//!
//! Backed by an in-memory `SQLite` database behind a mutex (the engine is the
//! sole writer; rusqlite connections are not `Sync`). Durability comes from
//! re-exporting the whole database over the backing file on every mutation —
//! the mutation volume is human-edited content files, so full export is cheap
//! enough, but callers issuing high-frequency writes must batch or throttle.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use parley_core::{Document, DocumentStats, DocumentType, Mood};
use rusqlite::{Connection, DatabaseName, params};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{Result, StoreError};

/// Schema applied on every open (`IF NOT EXISTS`, so restores are safe).
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id            TEXT NOT NULL,
    type          TEXT NOT NULL CHECK (type IN ('persona', 'prompt_template', 'scenario')),
    name          TEXT NOT NULL,
    document      TEXT NOT NULL,
    file_path     TEXT NOT NULL,
    file_modified TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (id, type)
);
CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(type);
CREATE INDEX IF NOT EXISTS idx_documents_name ON documents(name);
CREATE INDEX IF NOT EXISTS idx_documents_type_name ON documents(type, name);
CREATE INDEX IF NOT EXISTS idx_documents_file_path ON documents(file_path);

CREATE TABLE IF NOT EXISTS moods (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    mood        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_moods_mood ON moods(mood);
";

/// Embedded, file-backed document store.
///
/// All operations are synchronous; open the store off the async runtime
/// (see `StoreHandle`) and share it behind an `Arc`.
#[derive(Debug)]
pub struct DocumentStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    fresh: bool,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl DocumentStore {
    /// Open the store, restoring from `db_path` when the file exists.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let mut conn = Connection::open_in_memory()?;

        let fresh = if db_path.exists() {
            conn.restore(
                DatabaseName::Main,
                &db_path,
                None::<fn(rusqlite::backup::Progress)>,
            )?;
            info!(path = %db_path.display(), "loaded existing document database");
            false
        } else {
            info!(path = %db_path.display(), "creating new document database");
            true
        };

        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            fresh,
        })
    }

    /// Whether this store was newly created (no backing file existed).
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Path of the backing database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Export the entire in-memory database over the backing file.
    ///
    /// Failures are logged, not propagated: the in-memory state stays
    /// authoritative and the next mutation retries the export.
    fn persist(&self, conn: &Connection) {
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(error = %e, path = %self.db_path.display(), "failed to create data directory");
            return;
        }
        if let Err(e) = conn.backup(DatabaseName::Main, &self.db_path, None) {
            warn!(error = %e, path = %self.db_path.display(), "failed to persist document database");
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Document operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert-or-replace a document by `(id, type)`, then persist.
    ///
    /// `created_at` is preserved across replacements; `updated_at` is always
    /// refreshed.
    pub fn upsert_document(
        &self,
        id: &str,
        doc_type: DocumentType,
        name: &str,
        payload: &Value,
        source_path: &str,
        source_modified: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let ts = now();
        let _ = conn.execute(
            "INSERT INTO documents (id, type, name, document, file_path, file_modified, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(id, type) DO UPDATE SET
                 name = excluded.name,
                 document = excluded.document,
                 file_path = excluded.file_path,
                 file_modified = excluded.file_modified,
                 updated_at = excluded.updated_at",
            params![id, doc_type.as_str(), name, payload, source_path, source_modified, ts],
        )?;
        self.persist(&conn);
        debug!(id, %doc_type, "upserted document");
        Ok(())
    }

    /// All documents of one type, ordered by display name.
    pub fn get_all(&self, doc_type: DocumentType) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type, name, document, file_path, file_modified, created_at, updated_at
             FROM documents WHERE type = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![doc_type.as_str()], row_to_document)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Look up a single document by `(id, type)`.
    pub fn get_by_id(&self, id: &str, doc_type: DocumentType) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type, name, document, file_path, file_modified, created_at, updated_at
             FROM documents WHERE id = ?1 AND type = ?2",
        )?;
        let mut rows = stmt.query_map(params![id, doc_type.as_str()], row_to_document)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Case-insensitive substring search over name or serialized payload.
    pub fn search(&self, doc_type: DocumentType, term: &str) -> Result<Vec<Document>> {
        let pattern = format!("%{term}%");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type, name, document, file_path, file_modified, created_at, updated_at
             FROM documents
             WHERE type = ?1
               AND (LOWER(name) LIKE LOWER(?2) OR LOWER(document) LIKE LOWER(?2))
             ORDER BY name",
        )?;
        let rows = stmt.query_map(params![doc_type.as_str(), pattern], row_to_document)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Delete a document. Returns `true` iff a row was removed.
    pub fn delete_document(&self, id: &str, doc_type: DocumentType) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "DELETE FROM documents WHERE id = ?1 AND type = ?2",
            params![id, doc_type.as_str()],
        )?;
        if changes > 0 {
            self.persist(&conn);
            debug!(id, %doc_type, "deleted document");
        }
        Ok(changes > 0)
    }

    /// Aggregate counts by type.
    pub fn stats(&self) -> Result<DocumentStats> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM documents GROUP BY type")?;
        let mut stats = DocumentStats::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
        })?;
        for row in rows {
            let (ty, count) = row?;
            match ty.as_str() {
                "persona" => stats.personas = count,
                "prompt_template" => stats.templates = count,
                "scenario" => stats.scenarios = count,
                _ => {}
            }
            stats.total += count;
        }
        Ok(stats)
    }

    /// All documents across all types, ordered by type then name.
    ///
    /// Admin/debugging surface.
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type, name, document, file_path, file_modified, created_at, updated_at
             FROM documents ORDER BY type, name",
        )?;
        let rows = stmt.query_map([], row_to_document)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Ids and display names of all stored templates.
    pub fn template_names(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name FROM documents WHERE type = 'prompt_template'")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mood operations
    // ─────────────────────────────────────────────────────────────────────

    /// All moods, in insertion order.
    pub fn list_moods(&self) -> Result<Vec<Mood>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT mood, description FROM moods ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Mood {
                mood: row.get(0)?,
                description: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Wholesale-replace the moods table: delete all, then bulk insert.
    pub fn replace_all_moods(&self, moods: &[Mood]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let _ = tx.execute("DELETE FROM moods", [])?;
        {
            let ts = now();
            let mut stmt = tx.prepare(
                "INSERT INTO moods (mood, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
            )?;
            for mood in moods {
                let _ = stmt.execute(params![mood.mood, mood.description, ts])?;
            }
        }
        tx.commit()?;
        self.persist(&conn);
        debug!(count = moods.len(), "replaced all moods");
        Ok(())
    }

    /// Look up a mood by name.
    pub fn get_mood(&self, mood: &str) -> Result<Option<Mood>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT mood, description FROM moods WHERE mood = ?1")?;
        let mut rows = stmt.query_map(params![mood], |row| {
            Ok(Mood {
                mood: row.get(0)?,
                description: row.get(1)?,
            })
        })?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Insert a new mood. Errors if a mood with the same name exists.
    pub fn create_mood(&self, mood: &Mood) -> Result<()> {
        let conn = self.conn.lock();
        let ts = now();
        let result = conn.execute(
            "INSERT INTO moods (mood, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![mood.mood, mood.description, ts],
        );
        match result {
            Ok(_) => {
                self.persist(&conn);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::MoodExists(mood.mood.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update an existing mood (rename and/or re-describe).
    ///
    /// Errors with [`StoreError::MoodNotFound`] if `mood` is absent.
    pub fn update_mood(&self, mood: &str, update: &Mood) -> Result<()> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "UPDATE moods SET mood = ?1, description = ?2, updated_at = ?3 WHERE mood = ?4",
            params![update.mood, update.description, now(), mood],
        )?;
        if changes == 0 {
            return Err(StoreError::MoodNotFound(mood.to_string()));
        }
        self.persist(&conn);
        Ok(())
    }

    /// Delete a mood. Errors with [`StoreError::MoodNotFound`] if absent.
    pub fn delete_mood(&self, mood: &str) -> Result<()> {
        let conn = self.conn.lock();
        let changes = conn.execute("DELETE FROM moods WHERE mood = ?1", params![mood])?;
        if changes == 0 {
            return Err(StoreError::MoodNotFound(mood.to_string()));
        }
        self.persist(&conn);
        Ok(())
    }

    /// Final export of the in-memory database to the backing file.
    pub fn close(&self) {
        let conn = self.conn.lock();
        self.persist(&conn);
        info!(path = %self.db_path.display(), "document store closed");
    }
}

/// Map a full `documents` row to a [`Document`].
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let type_str: String = row.get(1)?;
    let doc_type = type_str.parse::<DocumentType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;
    Ok(Document {
        id: row.get(0)?,
        doc_type,
        name: row.get(2)?,
        payload: row.get(3)?,
        source_path: row.get(4)?,
        source_modified: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
