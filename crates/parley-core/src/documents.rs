//! Document model shared by the store and the sync engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of a stored document.
///
/// Moods are a distinct, simpler entity ([`Mood`]) and do not appear here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// A chat persona (`personas/*.json`).
    Persona,
    /// A prompt template (`prompts/*.prompty`).
    PromptTemplate,
    /// A conversation scenario (`scenarios/*.json`).
    Scenario,
}

impl DocumentType {
    /// All document types, in the fixed sync order.
    pub const ALL: [DocumentType; 3] = [
        DocumentType::Persona,
        DocumentType::PromptTemplate,
        DocumentType::Scenario,
    ];

    /// The canonical string stored in the `type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Persona => "persona",
            DocumentType::PromptTemplate => "prompt_template",
            DocumentType::Scenario => "scenario",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "persona" => Ok(DocumentType::Persona),
            "prompt_template" => Ok(DocumentType::PromptTemplate),
            "scenario" => Ok(DocumentType::Scenario),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// The persisted unit: one row in the `documents` table.
///
/// At most one document exists per `(id, doc_type)` pair. A document whose
/// `source_path` is empty was created through the API (not file-backed) and
/// is immune to deletion-by-reconciliation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Unique within `doc_type`. For file-backed documents this is the file
    /// base name (scenarios may declare their own `id` instead).
    pub id: String,
    /// Document kind.
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    /// Display name, used for search and sort ordering.
    pub name: String,
    /// Opaque structured content (the parsed file).
    pub payload: Value,
    /// Absolute path of the source file; empty for API-created documents.
    pub source_path: String,
    /// RFC 3339 modification time of the source file at sync time.
    pub source_modified: String,
    /// Store-assigned creation timestamp (RFC 3339).
    pub created_at: String,
    /// Store-assigned last-update timestamp (RFC 3339).
    pub updated_at: String,
}

/// Aggregate counts by document type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Number of stored personas.
    pub personas: usize,
    /// Number of stored prompt templates.
    pub templates: usize,
    /// Number of stored scenarios.
    pub scenarios: usize,
    /// Total across all types.
    pub total: usize,
}

/// A mood entry, unique on `mood`.
///
/// The moods table is wholesale-replaced (delete-all-then-insert) on every
/// change to the moods file, not merged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mood {
    /// Mood name (primary identity).
    pub mood: String,
    /// Human-readable description.
    pub description: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
