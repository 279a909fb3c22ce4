//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so partial JSON files work — missing fields get production defaults.

use serde::{Deserialize, Serialize};

/// Root settings type for the Parley content engine.
///
/// Loaded from `~/.parley/settings.json` with defaults applied for missing
/// fields. `PARLEY_*` environment variables can override specific values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Content directory layout.
    pub content: ContentSettings,
    /// Document store settings.
    pub store: StoreSettings,
    /// File sync engine settings.
    pub sync: SyncSettings,
    /// Template engine and selector settings.
    pub prompts: PromptSettings,
    /// Minimum log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ParleySettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "parley".to_string(),
            content: ContentSettings::default(),
            store: StoreSettings::default(),
            sync: SyncSettings::default(),
            prompts: PromptSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Watched content roots.
///
/// File base names (sans extension) are the canonical document ids, except
/// scenarios, which may declare their own `id` field.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentSettings {
    /// Directory of `*.json` persona files.
    pub personas_dir: String,
    /// Directory of `*.prompty` template files.
    pub prompts_dir: String,
    /// Directory of `*.json` scenario files.
    pub scenarios_dir: String,
    /// Path to the single `moods.json` file.
    pub moods_file: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            personas_dir: "content/personas".to_string(),
            prompts_dir: "content/prompts".to_string(),
            scenarios_dir: "content/scenarios".to_string(),
            moods_file: "content/moods.json".to_string(),
        }
    }
}

/// Document store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Path of the backing database file (rewritten fully on each mutation).
    pub db_path: String,
    /// How long dependents wait for store readiness before failing startup.
    pub ready_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: "data/parley-documents.db".to_string(),
            ready_timeout_ms: 10_000,
        }
    }
}

/// File sync engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Run a full reconciliation pass at startup.
    pub sync_on_startup: bool,
    /// Attach filesystem watchers after the initial sync.
    pub watch: bool,
    /// Quiet period after a filesystem event before acting on it, so
    /// partially-written files are not parsed.
    pub settle_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_on_startup: true,
            watch: true,
            settle_ms: 300,
        }
    }
}

/// Template engine and contextual selector settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptSettings {
    /// Deployed template directory, tried first by the loader.
    pub template_dir: String,
    /// Source-checkout template directory, tried when the deployed
    /// directory misses.
    pub fallback_dir: String,
    /// Default template id when no heuristic matches.
    pub default_template: String,
    /// Number of trailing messages included in the rendered transcript.
    /// Values below 20 are raised to 20.
    pub message_window: usize,
}

/// Floor applied to [`PromptSettings::message_window`].
pub const MESSAGE_WINDOW_FLOOR: usize = 20;

impl PromptSettings {
    /// The message window with the floor applied.
    pub fn effective_message_window(&self) -> usize {
        self.message_window.max(MESSAGE_WINDOW_FLOOR)
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            template_dir: "content/prompts".to_string(),
            fallback_dir: "src/prompts".to_string(),
            default_template: "training-agent".to_string(),
            message_window: MESSAGE_WINDOW_FLOOR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
