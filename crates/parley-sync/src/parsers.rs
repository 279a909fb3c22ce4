//! Content file parsers.
//!
//! Parsers never panic past their boundary: malformed input yields
//! [`Parsed::Invalid`] with a reason, and the caller logs and skips the file.

use parley_core::{Mood, frontmatter};
use serde_json::Value;

/// Outcome of parsing one content file.
#[derive(Clone, Debug, PartialEq)]
pub enum Parsed<T> {
    /// The file is valid content.
    Valid(T),
    /// The file is malformed; the reason is suitable for a warning log.
    Invalid(String),
}

/// A parsed persona file.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonaFile {
    /// Display name (`name` field).
    pub name: String,
    /// The full JSON object.
    pub payload: Value,
}

/// A parsed `.prompty` template file.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateFile {
    /// Display name, from top-level `name` or `metadata.name`.
    pub name: String,
    /// Frontmatter fields plus the body under `content`.
    pub payload: Value,
}

/// A parsed scenario file.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioFile {
    /// Canonical id: the JSON's own `id` field, else the file base name.
    pub id: String,
    /// Display name: `title`, falling back to the id.
    pub name: String,
    /// The full JSON object.
    pub payload: Value,
}

/// Parse a persona file: a JSON object with a non-empty string `name`.
pub fn parse_persona(content: &str) -> Parsed<PersonaFile> {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => return Parsed::Invalid(format!("not valid JSON: {e}")),
    };
    if !value.is_object() {
        return Parsed::Invalid("persona must be a JSON object".to_string());
    }
    match value.get("name").and_then(Value::as_str).map(str::trim) {
        Some(name) if !name.is_empty() => Parsed::Valid(PersonaFile {
            name: name.to_string(),
            payload: value,
        }),
        _ => Parsed::Invalid("persona is missing a non-empty 'name'".to_string()),
    }
}

/// Parse a `.prompty` template file: `---` frontmatter plus a body.
///
/// Valid iff the body is non-empty and a non-empty `name` is present
/// top-level in the frontmatter or under `metadata`.
pub fn parse_template(content: &str) -> Parsed<TemplateFile> {
    let (frontmatter, body) = frontmatter::split(content);
    if body.trim().is_empty() {
        return Parsed::Invalid("template body is empty".to_string());
    }
    let mut fields = match frontmatter {
        Some(yaml) => frontmatter::parse_mapping(&yaml),
        None => serde_json::Map::new(),
    };
    let name = template_name(&fields);
    let Some(name) = name else {
        return Parsed::Invalid("template is missing a non-empty 'name'".to_string());
    };
    let _ = fields.insert("content".to_string(), Value::String(body));
    Parsed::Valid(TemplateFile {
        name,
        payload: Value::Object(fields),
    })
}

fn template_name(fields: &serde_json::Map<String, Value>) -> Option<String> {
    let top = fields.get("name").and_then(Value::as_str);
    let nested = fields
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str);
    top.or(nested)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Parse a scenario file: a JSON object whose id defaults to `base_name`.
pub fn parse_scenario(content: &str, base_name: &str) -> Parsed<ScenarioFile> {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => return Parsed::Invalid(format!("not valid JSON: {e}")),
    };
    if !value.is_object() {
        return Parsed::Invalid("scenario must be a JSON object".to_string());
    }
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(base_name)
        .to_string();
    let name = value
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&id)
        .to_string();
    Parsed::Valid(ScenarioFile {
        id,
        name,
        payload: value,
    })
}

/// Parse the moods file: a JSON array of `{mood, description}` objects.
///
/// Entries without a non-empty string `mood` are dropped.
pub fn parse_moods(content: &str) -> Parsed<Vec<Mood>> {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => return Parsed::Invalid(format!("not valid JSON: {e}")),
    };
    let Some(entries) = value.as_array() else {
        return Parsed::Invalid("moods file must be a JSON array".to_string());
    };
    let moods = entries
        .iter()
        .filter_map(|entry| {
            let mood = entry.get("mood").and_then(Value::as_str)?.trim();
            if mood.is_empty() {
                return None;
            }
            let description = entry
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(Mood {
                mood: mood.to_string(),
                description: description.to_string(),
            })
        })
        .collect();
    Parsed::Valid(moods)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
