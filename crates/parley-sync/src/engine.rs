//! The file sync engine.
//!
//! Owns the document store for its lifetime: it is the sole writer for
//! file-derived content. Startup runs one reconciliation pass per source in
//! a fixed order (personas, templates, scenarios, moods — keeps logs
//! deterministic), then attaches one non-recursive watcher per source whose
//! debounced events feed a single reconciliation loop.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use parley_core::DocumentType;
use parley_settings::ParleySettings;
use parley_store::DocumentStore;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::debounce;
use crate::errors::Result;
use crate::events::{SyncEvent, SyncEventKind, SyncSource};
use crate::parsers::{self, Parsed};

/// Filesystem locations of the watched sources.
#[derive(Clone, Debug)]
pub struct SyncPaths {
    /// Directory of `*.json` persona files.
    pub personas_dir: PathBuf,
    /// Directory of `*.prompty` template files.
    pub templates_dir: PathBuf,
    /// Directory of `*.json` scenario files.
    pub scenarios_dir: PathBuf,
    /// The single moods JSON file.
    pub moods_file: PathBuf,
}

impl SyncPaths {
    /// Resolve source locations from loaded settings.
    pub fn from_settings(settings: &ParleySettings) -> Self {
        Self {
            personas_dir: PathBuf::from(&settings.content.personas_dir),
            templates_dir: PathBuf::from(&settings.content.prompts_dir),
            scenarios_dir: PathBuf::from(&settings.content.scenarios_dir),
            moods_file: PathBuf::from(&settings.content.moods_file),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    Idle,
    InitialSync,
    Watching,
    Closed,
}

/// Keeps the document store aligned with the content directories.
pub struct FileSyncEngine {
    store: Arc<DocumentStore>,
    paths: SyncPaths,
    settle_window: Duration,
    state: Mutex<EngineState>,
    // Scenario ids may differ from file base names; unlink events carry
    // only the path, so deletions consult this map.
    scenario_ids: Mutex<HashMap<String, String>>,
    watchers: Mutex<Vec<RecommendedWatcher>>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl FileSyncEngine {
    /// Create an idle engine over an opened store.
    pub fn new(store: Arc<DocumentStore>, paths: SyncPaths, settle_window: Duration) -> Self {
        Self {
            store,
            paths,
            settle_window,
            state: Mutex::new(EngineState::Idle),
            scenario_ids: Mutex::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
        }
    }

    /// The store this engine writes to.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────
    // Initial sync and force-sync
    // ─────────────────────────────────────────────────────────────────────

    /// Run one full reconciliation pass over every source, in order.
    pub fn initial_sync(&self) -> Result<()> {
        *self.state.lock() = EngineState::InitialSync;
        info!("starting initial content sync");
        self.sync_personas()?;
        self.sync_templates()?;
        self.sync_scenarios()?;
        self.sync_moods()?;
        let stats = self.store.stats()?;
        info!(
            personas = stats.personas,
            templates = stats.templates,
            scenarios = stats.scenarios,
            "initial content sync complete"
        );
        Ok(())
    }

    /// Re-run the persona reconciliation pass on demand.
    pub fn force_sync_personas(&self) -> Result<()> {
        self.sync_personas()
    }

    /// Re-run the template reconciliation pass on demand.
    pub fn force_sync_templates(&self) -> Result<()> {
        self.sync_templates()
    }

    /// Re-run every source's reconciliation pass on demand.
    pub fn force_sync_all(&self) -> Result<()> {
        self.sync_personas()?;
        self.sync_templates()?;
        self.sync_scenarios()?;
        self.sync_moods()
    }

    fn sync_personas(&self) -> Result<()> {
        let Some(files) = self.list_source(SyncSource::Personas, &self.paths.personas_dir, "json")?
        else {
            return Ok(());
        };
        let mut seen = HashSet::new();
        for path in files {
            let Some(base) = base_name(&path) else { continue };
            match read_and_parse(&path, parsers::parse_persona) {
                Some(Parsed::Valid(persona)) => {
                    self.upsert_file(&base, DocumentType::Persona, &persona.name, &persona.payload, &path)?;
                    let _ = seen.insert(base);
                }
                Some(Parsed::Invalid(reason)) => {
                    warn!(path = %path.display(), reason, "skipping invalid persona file");
                }
                None => {}
            }
        }
        self.reconcile_deletions(DocumentType::Persona, &seen)?;
        debug!(count = seen.len(), "persona sync pass done");
        Ok(())
    }

    fn sync_templates(&self) -> Result<()> {
        let Some(files) =
            self.list_source(SyncSource::Templates, &self.paths.templates_dir, "prompty")?
        else {
            return Ok(());
        };
        let mut seen = HashSet::new();
        for path in files {
            let Some(base) = base_name(&path) else { continue };
            match read_and_parse(&path, parsers::parse_template) {
                Some(Parsed::Valid(template)) => {
                    self.upsert_file(
                        &base,
                        DocumentType::PromptTemplate,
                        &template.name,
                        &template.payload,
                        &path,
                    )?;
                    let _ = seen.insert(base);
                }
                Some(Parsed::Invalid(reason)) => {
                    warn!(path = %path.display(), reason, "skipping invalid template file");
                }
                None => {}
            }
        }
        self.reconcile_deletions(DocumentType::PromptTemplate, &seen)?;
        debug!(count = seen.len(), "template sync pass done");
        Ok(())
    }

    /// Scenarios are clear-then-reloaded: stronger and simpler than the
    /// incremental reconciliation personas get, at the cost of a brief
    /// window with no scenario documents. Rows without a backing file
    /// (empty `source_path`) are API-created and survive the clear.
    fn sync_scenarios(&self) -> Result<()> {
        for doc in self.store.get_all(DocumentType::Scenario)? {
            if !doc.source_path.is_empty() {
                let _ = self.store.delete_document(&doc.id, DocumentType::Scenario)?;
            }
        }
        let mut ids = HashMap::new();
        if let Some(files) =
            self.list_source(SyncSource::Scenarios, &self.paths.scenarios_dir, "json")?
        {
            for path in files {
                let Some(base) = base_name(&path) else { continue };
                match read_and_parse(&path, |content| parsers::parse_scenario(content, &base)) {
                    Some(Parsed::Valid(scenario)) => {
                        self.upsert_file(
                            &scenario.id,
                            DocumentType::Scenario,
                            &scenario.name,
                            &scenario.payload,
                            &path,
                        )?;
                        let _ = ids.insert(base, scenario.id);
                    }
                    Some(Parsed::Invalid(reason)) => {
                        warn!(path = %path.display(), reason, "skipping invalid scenario file");
                    }
                    None => {}
                }
            }
        }
        debug!(count = ids.len(), "scenario sync pass done");
        *self.scenario_ids.lock() = ids;
        Ok(())
    }

    /// Moods are wholesale-replaced. A missing file clears the table.
    fn sync_moods(&self) -> Result<()> {
        if !self.paths.moods_file.exists() {
            self.store.replace_all_moods(&[])?;
            debug!(path = %self.paths.moods_file.display(), "moods file absent, cleared moods");
            return Ok(());
        }
        match read_and_parse(&self.paths.moods_file, parsers::parse_moods) {
            Some(Parsed::Valid(moods)) => {
                self.store.replace_all_moods(&moods)?;
                debug!(count = moods.len(), "moods sync pass done");
            }
            Some(Parsed::Invalid(reason)) => {
                warn!(path = %self.paths.moods_file.display(), reason, "skipping invalid moods file");
            }
            None => {}
        }
        Ok(())
    }

    /// Enumerate `dir` for files with `ext`, sorted. `None` if the
    /// directory does not exist (the source is skipped, not an error).
    fn list_source(
        &self,
        source: SyncSource,
        dir: &Path,
        ext: &str,
    ) -> Result<Option<Vec<PathBuf>>> {
        if !dir.is_dir() {
            warn!(source = source.label(), path = %dir.display(), "content directory missing, skipping");
            return Ok(None);
        }
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_extension(path, ext))
            .collect();
        files.sort();
        Ok(Some(files))
    }

    /// Delete file-derived documents whose id is absent from the fresh
    /// listing. API-created rows (empty `source_path`) are immune.
    fn reconcile_deletions(&self, doc_type: DocumentType, seen: &HashSet<String>) -> Result<()> {
        for doc in self.store.get_all(doc_type)? {
            if !doc.source_path.is_empty() && !seen.contains(&doc.id) {
                let _ = self.store.delete_document(&doc.id, doc_type)?;
                info!(id = %doc.id, %doc_type, "removed document with no backing file");
            }
        }
        Ok(())
    }

    fn upsert_file(
        &self,
        id: &str,
        doc_type: DocumentType,
        name: &str,
        payload: &Value,
        path: &Path,
    ) -> Result<()> {
        self.store.upsert_document(
            id,
            doc_type,
            name,
            payload,
            &absolute(path),
            &modified_rfc3339(path),
        )?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Watching
    // ─────────────────────────────────────────────────────────────────────

    /// Attach watchers and spawn the reconciliation loop.
    ///
    /// Watcher callback errors are logged and never fatal; a missing
    /// source directory simply goes unwatched.
    pub fn start_watchers(self: &Arc<Self>) -> Result<()> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let mut watchers = Vec::new();
        let dirs = [
            (SyncSource::Personas, &self.paths.personas_dir, "json"),
            (SyncSource::Templates, &self.paths.templates_dir, "prompty"),
            (SyncSource::Scenarios, &self.paths.scenarios_dir, "json"),
        ];
        for (source, dir, ext) in dirs {
            if !dir.is_dir() {
                warn!(source = source.label(), path = %dir.display(), "not watching missing directory");
                continue;
            }
            watchers.push(watch_dir(source, dir, ext, raw_tx.clone())?);
            debug!(source = source.label(), path = %dir.display(), "watching");
        }
        if let Some(parent) = self.paths.moods_file.parent().filter(|p| p.is_dir()) {
            watchers.push(watch_moods(parent, &self.paths.moods_file, raw_tx.clone())?);
            debug!(path = %self.paths.moods_file.display(), "watching moods file");
        } else {
            warn!(path = %self.paths.moods_file.display(), "not watching moods file in missing directory");
        }
        drop(raw_tx);
        *self.watchers.lock() = watchers;

        let mut events = debounce::settle(raw_rx, self.settle_window);
        let engine = Arc::clone(self);
        let handler = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                engine.handle_event(&event);
            }
        });
        *self.handler.lock() = Some(handler);
        *self.state.lock() = EngineState::Watching;
        info!(settle_ms = self.settle_window.as_millis() as u64, "file watchers started");
        Ok(())
    }

    /// Apply one settled event. Errors are reported by the caller's loop;
    /// they never stop watching.
    pub fn handle_event(&self, event: &SyncEvent) {
        if *self.state.lock() == EngineState::Closed {
            return;
        }
        let result = match event.source {
            SyncSource::Personas => self.apply_persona_event(event),
            SyncSource::Templates => self.apply_template_event(event),
            SyncSource::Scenarios => self.apply_scenario_event(event),
            SyncSource::Moods => self.sync_moods(),
        };
        if let Err(e) = result {
            warn!(
                source = event.source.label(),
                path = %event.path.display(),
                error = %e,
                "failed to apply sync event"
            );
        }
    }

    fn apply_persona_event(&self, event: &SyncEvent) -> Result<()> {
        let Some(base) = base_name(&event.path) else {
            return Ok(());
        };
        if is_removal(event) {
            if self.store.delete_document(&base, DocumentType::Persona)? {
                info!(id = %base, "persona file removed");
            }
            return Ok(());
        }
        match read_and_parse(&event.path, parsers::parse_persona) {
            Some(Parsed::Valid(persona)) => {
                self.upsert_file(&base, DocumentType::Persona, &persona.name, &persona.payload, &event.path)?;
                info!(id = %base, "persona synced");
            }
            Some(Parsed::Invalid(reason)) => {
                warn!(path = %event.path.display(), reason, "skipping invalid persona file");
            }
            None => {}
        }
        Ok(())
    }

    fn apply_template_event(&self, event: &SyncEvent) -> Result<()> {
        let Some(base) = base_name(&event.path) else {
            return Ok(());
        };
        if is_removal(event) {
            if self.store.delete_document(&base, DocumentType::PromptTemplate)? {
                info!(id = %base, "template file removed");
            }
            return Ok(());
        }
        match read_and_parse(&event.path, parsers::parse_template) {
            Some(Parsed::Valid(template)) => {
                self.upsert_file(
                    &base,
                    DocumentType::PromptTemplate,
                    &template.name,
                    &template.payload,
                    &event.path,
                )?;
                info!(id = %base, "template synced");
            }
            Some(Parsed::Invalid(reason)) => {
                warn!(path = %event.path.display(), reason, "skipping invalid template file");
            }
            None => {}
        }
        Ok(())
    }

    fn apply_scenario_event(&self, event: &SyncEvent) -> Result<()> {
        let Some(base) = base_name(&event.path) else {
            return Ok(());
        };
        if is_removal(event) {
            let id = self
                .scenario_ids
                .lock()
                .remove(&base)
                .unwrap_or_else(|| base.clone());
            if self.store.delete_document(&id, DocumentType::Scenario)? {
                info!(%id, "scenario file removed");
            }
            return Ok(());
        }
        match read_and_parse(&event.path, |content| parsers::parse_scenario(content, &base)) {
            Some(Parsed::Valid(scenario)) => {
                let previous = self
                    .scenario_ids
                    .lock()
                    .insert(base.clone(), scenario.id.clone());
                // A file that changed its declared id leaves a stale row
                // under the old id.
                if let Some(old_id) = previous
                    && old_id != scenario.id
                {
                    let _ = self.store.delete_document(&old_id, DocumentType::Scenario)?;
                }
                self.upsert_file(
                    &scenario.id,
                    DocumentType::Scenario,
                    &scenario.name,
                    &scenario.payload,
                    &event.path,
                )?;
                info!(id = %scenario.id, "scenario synced");
            }
            Some(Parsed::Invalid(reason)) => {
                warn!(path = %event.path.display(), reason, "skipping invalid scenario file");
            }
            None => {}
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────

    /// Stop watchers, await the reconciliation loop, flush the store.
    ///
    /// Idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock();
            if *state == EngineState::Closed {
                return;
            }
            *state = EngineState::Closed;
        }
        // Dropping the watchers closes the raw channel, which drains the
        // debouncer and ends the handler loop.
        self.watchers.lock().clear();
        let handler = self.handler.lock().take();
        if let Some(handler) = handler
            && handler.await.is_err()
        {
            warn!("sync handler task ended abnormally");
        }
        self.store.close();
        info!("file sync engine closed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn is_removal(event: &SyncEvent) -> bool {
    // A rename-away arrives as Changed but the path is gone.
    event.kind == SyncEventKind::Removed || !event.path.exists()
}

fn base_name(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

fn absolute(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn modified_rfc3339(path: &Path) -> String {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(|time| chrono::DateTime::<chrono::Utc>::from(time).to_rfc3339())
        .unwrap_or_default()
}

/// Read and parse one file; `None` if the file vanished or is unreadable.
fn read_and_parse<T>(path: &Path, parse: impl FnOnce(&str) -> Parsed<T>) -> Option<Parsed<T>> {
    match fs::read_to_string(path) {
        Ok(content) => Some(parse(&content)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read content file");
            None
        }
    }
}

fn watch_dir(
    source: SyncSource,
    dir: &Path,
    ext: &str,
    tx: mpsc::UnboundedSender<SyncEvent>,
) -> Result<RecommendedWatcher> {
    let ext = ext.to_string();
    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<notify::Event>| match result {
            Ok(event) => {
                let Some(kind) = map_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    if has_extension(&path, &ext) {
                        let _ = tx.send(SyncEvent { source, kind, path });
                    }
                }
            }
            Err(e) => warn!(source = source.label(), error = %e, "watcher error"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// The moods source is a single file, so its parent directory is watched
/// and events are filtered by file name.
fn watch_moods(
    parent: &Path,
    moods_file: &Path,
    tx: mpsc::UnboundedSender<SyncEvent>,
) -> Result<RecommendedWatcher> {
    let target = moods_file.file_name().map(std::ffi::OsStr::to_os_string);
    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<notify::Event>| match result {
            Ok(event) => {
                let Some(kind) = map_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    if path.file_name().map(std::ffi::OsStr::to_os_string) == target {
                        let _ = tx.send(SyncEvent {
                            source: SyncSource::Moods,
                            kind,
                            path,
                        });
                    }
                }
            }
            Err(e) => warn!(source = "moods", error = %e, "watcher error"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(parent, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn map_kind(kind: &notify::EventKind) -> Option<SyncEventKind> {
    match kind {
        notify::EventKind::Create(_) => Some(SyncEventKind::Added),
        notify::EventKind::Modify(_) => Some(SyncEventKind::Changed),
        notify::EventKind::Remove(_) => Some(SyncEventKind::Removed),
        _ => None,
    }
}
