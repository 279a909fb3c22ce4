//! Shared store handle with an explicit readiness gate.
//!
//! The store opens (and first-syncs) asynchronously at startup. Callers hold
//! a cheap cloneable [`StoreHandle`]; operations before installation fail
//! fast with [`StoreError::NotReady`], and [`StoreHandle::wait_ready`] blocks
//! on a one-shot readiness signal instead of polling.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::errors::{Result, StoreError};
use crate::store::DocumentStore;

/// Cloneable handle to the (possibly not-yet-installed) document store.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<OnceLock<Arc<DocumentStore>>>,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreHandle {
    /// Create an empty handle. No store is installed yet.
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            inner: Arc::new(OnceLock::new()),
            ready_tx,
            ready_rx,
        }
    }

    /// Install the opened store and signal readiness to all waiters.
    ///
    /// Installing twice is a no-op; the first store wins.
    pub fn install(&self, store: Arc<DocumentStore>) {
        if self.inner.set(store).is_ok() {
            let _ = self.ready_tx.send(true);
            debug!("document store installed");
        }
    }

    /// The installed store, or [`StoreError::NotReady`] before installation.
    pub fn get(&self) -> Result<Arc<DocumentStore>> {
        self.inner.get().cloned().ok_or(StoreError::NotReady)
    }

    /// Whether the store has been installed.
    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Wait for the store to be installed, up to `timeout`.
    ///
    /// Returns the store immediately if already installed. On expiry,
    /// [`StoreError::ReadyTimeout`] carries the budget that was exceeded.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<Arc<DocumentStore>> {
        if let Some(store) = self.inner.get() {
            return Ok(store.clone());
        }
        let mut rx = self.ready_rx.clone();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await;
        match waited {
            Ok(Ok(_)) => self.get(),
            // Sender dropped: readiness can never arrive.
            Ok(Err(_)) | Err(_) => Err(StoreError::ReadyTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Arc<DocumentStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path().join("docs.db")).unwrap());
        (dir, store)
    }

    #[test]
    fn get_before_install_is_not_ready() {
        let handle = StoreHandle::new();
        assert!(!handle.is_ready());
        assert!(matches!(handle.get().unwrap_err(), StoreError::NotReady));
    }

    #[test]
    fn install_makes_store_available() {
        let (_dir, store) = temp_store();
        let handle = StoreHandle::new();
        handle.install(store);
        assert!(handle.is_ready());
        assert!(handle.get().is_ok());
    }

    #[test]
    fn second_install_is_ignored() {
        let (_dir1, first) = temp_store();
        let (_dir2, second) = temp_store();
        let handle = StoreHandle::new();
        handle.install(first.clone());
        handle.install(second);
        let got = handle.get().unwrap();
        assert!(Arc::ptr_eq(&got, &first));
    }

    #[tokio::test]
    async fn wait_ready_returns_once_installed() {
        let handle = StoreHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move {
            waiter.wait_ready(Duration::from_secs(5)).await
        });

        let (_dir, store) = temp_store();
        handle.install(store);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_ready_times_out() {
        let handle = StoreHandle::new();
        let err = handle
            .wait_ready(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ReadyTimeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn wait_ready_is_immediate_when_already_installed() {
        let (_dir, store) = temp_store();
        let handle = StoreHandle::new();
        handle.install(store);
        let result = handle.wait_ready(Duration::from_millis(1)).await;
        assert!(result.is_ok());
    }
}
