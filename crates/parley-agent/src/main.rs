//! # parley-agent
//!
//! Parley content engine binary — loads settings, opens the document
//! store, syncs the content directories, and keeps watching until
//! interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parley_prompts::PromptSelector;
use parley_settings::{ParleySettings, load_settings, load_settings_from_path};
use parley_sync::ContentService;
use tracing::{info, warn};

/// Parley content engine.
#[derive(Parser, Debug)]
#[command(name = "parley-agent", about = "Parley content engine")]
struct Cli {
    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Root directory holding `personas/`, `prompts/`, `scenarios/`, and
    /// `moods.json` (overrides the configured content paths).
    #[arg(long)]
    content_root: Option<PathBuf>,

    /// Path to the document database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Log level filter (error, warn, info, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Disable file watching (initial sync only).
    #[arg(long)]
    no_watch: bool,
}

impl Cli {
    fn apply_to(&self, settings: &mut ParleySettings) {
        if let Some(root) = &self.content_root {
            settings.content.personas_dir = root.join("personas").display().to_string();
            settings.content.prompts_dir = root.join("prompts").display().to_string();
            settings.content.scenarios_dir = root.join("scenarios").display().to_string();
            settings.content.moods_file = root.join("moods.json").display().to_string();
            settings.prompts.template_dir = settings.content.prompts_dir.clone();
        }
        if let Some(db_path) = &self.db_path {
            settings.store.db_path = db_path.display().to_string();
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        if self.no_watch {
            settings.sync.watch = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match &args.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => load_settings().context("failed to load settings")?,
    };
    args.apply_to(&mut settings);

    parley_core::logging::init_subscriber(&settings.log_level);
    info!(version = %settings.version, "starting parley-agent");

    let service = ContentService::new(settings.clone());
    service
        .initialize()
        .await
        .context("content service failed to initialize")?;

    let store = service
        .handle()
        .wait_ready(Duration::from_millis(settings.store.ready_timeout_ms))
        .await
        .context("document store never became ready")?;
    let stats = store.stats().context("failed to read store stats")?;
    info!(
        personas = stats.personas,
        templates = stats.templates,
        scenarios = stats.scenarios,
        moods = store.list_moods().map(|m| m.len()).unwrap_or(0),
        "content loaded"
    );

    // Startup check: a render with no context must succeed, otherwise every
    // chat request would be falling back.
    let selector = PromptSelector::new(service.handle(), settings.prompts.clone());
    match selector.contextual_prompt(&[], None, None) {
        Ok(prompt) => info!(
            chars = prompt.system_message.len(),
            "default template renders"
        ),
        Err(e) => warn!(error = %e, "default template failed to render"),
    }
    drop(selector);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    service.shutdown().await;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["parley-agent"]);
        assert!(cli.settings.is_none());
        assert!(cli.content_root.is_none());
        assert!(!cli.no_watch);
    }

    #[test]
    fn cli_content_root_rewires_paths() {
        let cli = Cli::parse_from(["parley-agent", "--content-root", "/srv/content"]);
        let mut settings = ParleySettings::default();
        cli.apply_to(&mut settings);
        assert_eq!(settings.content.personas_dir, "/srv/content/personas");
        assert_eq!(settings.content.moods_file, "/srv/content/moods.json");
        assert_eq!(settings.prompts.template_dir, "/srv/content/prompts");
    }

    #[test]
    fn cli_no_watch_disables_watching() {
        let cli = Cli::parse_from(["parley-agent", "--no-watch"]);
        let mut settings = ParleySettings::default();
        assert!(settings.sync.watch);
        cli.apply_to(&mut settings);
        assert!(!settings.sync.watch);
    }

    #[test]
    fn cli_db_path_and_log_level_override() {
        let cli = Cli::parse_from([
            "parley-agent",
            "--db-path",
            "/tmp/parley.db",
            "--log-level",
            "debug",
        ]);
        let mut settings = ParleySettings::default();
        cli.apply_to(&mut settings);
        assert_eq!(settings.store.db_path, "/tmp/parley.db");
        assert_eq!(settings.log_level, "debug");
    }
}
