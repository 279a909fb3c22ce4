//! Process-level content service.
//!
//! Owns the store handle and the sync engine and is constructor-injected
//! into whatever needs content access, so no global singleton exists. The
//! store opens on the blocking pool, bounded by the configured ready
//! timeout; waiters block on the handle's readiness signal in the meantime.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parley_settings::ParleySettings;
use parley_store::{DocumentService, DocumentStore, StoreError, StoreHandle};
use tracing::{info, warn};

use crate::engine::{FileSyncEngine, SyncPaths};
use crate::errors::{Result, SyncError};

/// Startup/shutdown orchestration for the store and sync engine.
pub struct ContentService {
    settings: ParleySettings,
    handle: StoreHandle,
    engine: Mutex<Option<Arc<FileSyncEngine>>>,
}

impl ContentService {
    /// Create an uninitialized service. The handle is usable immediately
    /// (operations fail with `NotReady` until [`Self::initialize`] runs).
    pub fn new(settings: ParleySettings) -> Self {
        Self {
            settings,
            handle: StoreHandle::new(),
            engine: Mutex::new(None),
        }
    }

    /// The readiness-gated store handle.
    pub fn handle(&self) -> StoreHandle {
        self.handle.clone()
    }

    /// The loaded settings.
    pub fn settings(&self) -> &ParleySettings {
        &self.settings
    }

    /// A CRUD facade over the store, once ready.
    pub fn documents(&self) -> parley_store::Result<DocumentService> {
        Ok(DocumentService::new(self.handle.get()?))
    }

    /// Open the store, run the initial sync, and start watchers.
    ///
    /// Exceeding the ready timeout while opening the store is fatal.
    pub async fn initialize(&self) -> Result<()> {
        let db_path = self.settings.store.db_path.clone();
        let timeout_ms = self.settings.store.ready_timeout_ms;

        let open = tokio::task::spawn_blocking(move || DocumentStore::open(db_path));
        let store = tokio::time::timeout(Duration::from_millis(timeout_ms), open)
            .await
            .map_err(|_| StoreError::ReadyTimeout { timeout_ms })?
            .map_err(|e| SyncError::Startup(format!("store open task failed: {e}")))??;
        self.handle.install(Arc::new(store));
        let store = self.handle.get()?;

        let engine = Arc::new(FileSyncEngine::new(
            store,
            SyncPaths::from_settings(&self.settings),
            Duration::from_millis(self.settings.sync.settle_ms),
        ));
        if self.settings.sync.sync_on_startup {
            engine.initial_sync()?;
        }
        if self.settings.sync.watch {
            engine.start_watchers()?;
        } else {
            info!("file watching disabled");
        }
        *self.engine.lock() = Some(engine);
        info!("content service initialized");
        Ok(())
    }

    /// The running sync engine, if initialized. Exposes force-sync.
    pub fn engine(&self) -> Option<Arc<FileSyncEngine>> {
        self.engine.lock().clone()
    }

    /// Close the engine (which flushes and closes the store).
    pub async fn shutdown(&self) {
        let engine = self.engine.lock().take();
        if let Some(engine) = engine {
            engine.close().await;
        } else if let Ok(store) = self.handle.get() {
            // Initialized store without an engine (watch-less early exit).
            store.close();
        } else {
            warn!("shutdown before the store was ready");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::DocumentType;

    fn settings_for(root: &std::path::Path) -> ParleySettings {
        let mut settings = ParleySettings::default();
        settings.content.personas_dir = root.join("personas").display().to_string();
        settings.content.prompts_dir = root.join("prompts").display().to_string();
        settings.content.scenarios_dir = root.join("scenarios").display().to_string();
        settings.content.moods_file = root.join("moods.json").display().to_string();
        settings.store.db_path = root.join("data/docs.db").display().to_string();
        settings.sync.watch = false;
        settings
    }

    #[tokio::test]
    async fn initialize_syncs_and_installs_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("personas")).unwrap();
        std::fs::write(
            dir.path().join("personas/jordan.json"),
            r#"{"name": "Jordan"}"#,
        )
        .unwrap();

        let service = ContentService::new(settings_for(dir.path()));
        assert!(service.handle().get().is_err());

        service.initialize().await.unwrap();
        let store = service.handle().get().unwrap();
        assert_eq!(store.stats().unwrap().personas, 1);
        assert!(
            store
                .get_by_id("jordan", DocumentType::Persona)
                .unwrap()
                .is_some()
        );

        service.shutdown().await;
    }

    #[tokio::test]
    async fn documents_facade_requires_readiness() {
        let dir = tempfile::tempdir().unwrap();
        let service = ContentService::new(settings_for(dir.path()));
        assert!(matches!(
            service.documents().unwrap_err(),
            StoreError::NotReady
        ));
    }
}
