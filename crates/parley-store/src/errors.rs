//! Document store error types.

use parley_core::DocumentType;
use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has not finished its asynchronous startup yet.
    ///
    /// Distinct from [`StoreError::DocumentNotFound`] — callers must await
    /// readiness before issuing operations.
    #[error("document store is not initialized yet")]
    NotReady,

    /// The store did not become ready within the configured timeout.
    #[error("document store failed to initialize within {timeout_ms} ms")]
    ReadyTimeout {
        /// The timeout that was exceeded.
        timeout_ms: u64,
    },

    /// Underlying `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Document payload could not be serialized or deserialized.
    #[error("payload JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while persisting or restoring the backing file.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No document with the given id and type.
    #[error("{doc_type} '{id}' not found")]
    DocumentNotFound {
        /// Requested document id.
        id: String,
        /// Requested document type.
        doc_type: DocumentType,
    },

    /// No mood with the given name.
    #[error("mood '{0}' not found")]
    MoodNotFound(String),

    /// A mood with the given name already exists.
    #[error("mood '{0}' already exists")]
    MoodExists(String),

    /// A document failed validation before a write.
    #[error("invalid document: {0}")]
    Validation(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
