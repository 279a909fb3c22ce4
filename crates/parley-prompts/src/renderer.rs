//! Template body rendering and configuration env-resolution.
//!
//! Rendering is a fixed three-step pipeline: per-parameter `{% if %}`
//! blocks, then `{{key}}` substitution, then a cleanup pass that strips
//! every leftover tag and placeholder. The output is always
//! placeholder-free, even for templates referencing keys the caller never
//! supplied.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::types::ModelConfiguration;

static LEFTOVER_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*if\s+\w+\s*%\}|\{%\s*endif\s*%\}").unwrap());
static LEFTOVER_VARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*\w+\s*\}\}").unwrap());

/// Render a template body against a parameter map.
pub fn render_content(content: &str, params: &Map<String, Value>) -> String {
    let mut rendered = content.to_string();

    // 1. Conditional blocks, per supplied parameter.
    for (key, value) in params {
        let Ok(block) = Regex::new(&format!(
            r"(?s)\{{%\s*if\s+{}\s*%\}}(.*?)\{{%\s*endif\s*%\}}",
            regex::escape(key)
        )) else {
            continue;
        };
        rendered = if is_truthy(value) {
            block.replace_all(&rendered, "$1").into_owned()
        } else {
            block.replace_all(&rendered, "").into_owned()
        };
    }

    // 2. Placeholder substitution.
    for (key, value) in params {
        let Ok(placeholder) = Regex::new(&format!(
            r"\{{\{{\s*{}\s*\}}\}}",
            regex::escape(key)
        )) else {
            continue;
        };
        let text = if is_truthy(value) {
            value_text(value)
        } else {
            String::new()
        };
        rendered = placeholder
            .replace_all(&rendered, regex::NoExpand(&text))
            .into_owned();
    }

    // 3. Cleanup: anything the caller did not supply renders as empty.
    let rendered = LEFTOVER_TAGS.replace_all(&rendered, "");
    let rendered = LEFTOVER_VARS.replace_all(&rendered, "");
    rendered.trim().to_string()
}

/// Falsy: null, false, zero, and empty string. Everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form of a parameter value for substitution.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve `${env:VAR}` references in string-typed configuration values.
///
/// Unset variables leave the literal reference in place. Numeric fields
/// pass through untouched.
pub fn resolve_env(configuration: &ModelConfiguration) -> ModelConfiguration {
    let mut resolved = configuration.clone();
    resolve_field(&mut resolved.kind);
    resolve_field(&mut resolved.azure_endpoint);
    resolve_field(&mut resolved.azure_deployment);
    resolve_field(&mut resolved.api_version);
    for value in resolved.extra.values_mut() {
        if let Value::String(s) = value
            && let Some(substituted) = env_reference(s)
        {
            *value = Value::String(substituted);
        }
    }
    resolved
}

fn resolve_field(field: &mut Option<String>) {
    if let Some(value) = field.as_deref()
        && let Some(substituted) = env_reference(value)
    {
        *field = Some(substituted);
    }
}

/// `Some(resolved)` iff `value` is a `${env:VAR}` reference with VAR set.
fn env_reference(value: &str) -> Option<String> {
    let var = value.strip_prefix("${env:")?.strip_suffix('}')?;
    std::env::var(var).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
