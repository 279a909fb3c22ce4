//! Sync engine error types.

use thiserror::Error;

/// Errors that can occur while syncing content files into the store.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Filesystem error while enumerating or reading content files.
    #[error("content I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying document store rejected an operation.
    #[error(transparent)]
    Store(#[from] parley_store::StoreError),

    /// A filesystem watcher could not be created or attached.
    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Startup orchestration failed outside the store itself.
    #[error("sync startup failed: {0}")]
    Startup(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
