//! Template file loading.
//!
//! Templates resolve against a primary (synced content) directory first,
//! then a fallback directory shipped with the source tree, so a fresh
//! checkout renders before any content sync has run.

use std::path::{Path, PathBuf};

use parley_core::frontmatter;
use parley_settings::PromptSettings;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, TemplateError};
use crate::types::{PromptTemplate, TemplateMetadata};

/// Resolves template names to parsed `.prompty` files.
#[derive(Clone, Debug)]
pub struct TemplateLoader {
    template_dir: PathBuf,
    fallback_dir: PathBuf,
}

impl TemplateLoader {
    /// Loader over an explicit primary and fallback directory.
    pub fn new(template_dir: impl Into<PathBuf>, fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            fallback_dir: fallback_dir.into(),
        }
    }

    /// Loader using the configured directories.
    pub fn from_settings(settings: &PromptSettings) -> Self {
        Self::new(&settings.template_dir, &settings.fallback_dir)
    }

    /// Load `<name>.prompty`, primary directory first.
    pub fn load(&self, name: &str) -> Result<PromptTemplate> {
        let file = format!("{name}.prompty");
        let primary = self.template_dir.join(&file);
        let path = if primary.is_file() {
            primary
        } else {
            let fallback = self.fallback_dir.join(&file);
            if fallback.is_file() {
                debug!(template = name, path = %fallback.display(), "using fallback template dir");
                fallback
            } else {
                return Err(TemplateError::NotFound(name.to_string()));
            }
        };
        parse_template_file(name, &path)
    }
}

fn parse_template_file(name: &str, path: &Path) -> Result<PromptTemplate> {
    let content = std::fs::read_to_string(path)?;
    let (yaml, body) = frontmatter::split(&content);
    let Some(yaml) = yaml else {
        return Err(TemplateError::Invalid {
            name: name.to_string(),
            reason: "missing frontmatter".to_string(),
        });
    };
    let body = body.trim().to_string();
    if body.is_empty() {
        return Err(TemplateError::Invalid {
            name: name.to_string(),
            reason: "empty body".to_string(),
        });
    }
    let fields = frontmatter::parse_mapping(&yaml);
    let metadata: TemplateMetadata =
        serde_json::from_value(Value::Object(fields)).map_err(|e| TemplateError::Invalid {
            name: name.to_string(),
            reason: format!("bad frontmatter: {e}"),
        })?;
    Ok(PromptTemplate {
        metadata,
        content: body,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "---\nname: Training Agent\ndescription: role-play partner\nmodel:\n  api: chat\n  configuration:\n    type: azure_openai\n    max_tokens: 800\n---\nYou are {{persona}}. Stay in character.";

    fn write(dir: &Path, file: &str, content: &str) {
        std::fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn loads_from_primary_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "training-agent.prompty", TEMPLATE);
        let loader = TemplateLoader::new(dir.path(), dir.path().join("absent"));
        let template = loader.load("training-agent").unwrap();
        assert_eq!(template.metadata.name, "Training Agent");
        assert_eq!(template.metadata.model.configuration.max_tokens, Some(800));
        assert!(template.content.starts_with("You are"));
    }

    #[test]
    fn falls_back_to_secondary_dir() {
        let primary = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        write(fallback.path(), "training-agent.prompty", TEMPLATE);
        let loader = TemplateLoader::new(primary.path(), fallback.path());
        assert!(loader.load("training-agent").is_ok());
    }

    #[test]
    fn primary_shadows_fallback() {
        let primary = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        write(
            primary.path(),
            "t.prompty",
            "---\nname: Primary\n---\nprimary body",
        );
        write(
            fallback.path(),
            "t.prompty",
            "---\nname: Fallback\n---\nfallback body",
        );
        let loader = TemplateLoader::new(primary.path(), fallback.path());
        assert_eq!(loader.load("t").unwrap().metadata.name, "Primary");
    }

    #[test]
    fn missing_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TemplateLoader::new(dir.path(), dir.path());
        assert!(matches!(
            loader.load("ghost").unwrap_err(),
            TemplateError::NotFound(_)
        ));
    }

    #[test]
    fn template_without_frontmatter_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bare.prompty", "just a body");
        let loader = TemplateLoader::new(dir.path(), dir.path());
        assert!(matches!(
            loader.load("bare").unwrap_err(),
            TemplateError::Invalid { .. }
        ));
    }

    #[test]
    fn template_with_empty_body_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.prompty", "---\nname: Empty\n---\n\n");
        let loader = TemplateLoader::new(dir.path(), dir.path());
        assert!(matches!(
            loader.load("empty").unwrap_err(),
            TemplateError::Invalid { .. }
        ));
    }
}
