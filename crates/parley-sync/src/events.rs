//! Typed sync events bridging watcher callbacks to the reconciliation loop.

use std::path::PathBuf;

use parley_core::DocumentType;

/// Which watched source an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncSource {
    /// The personas directory (`*.json`).
    Personas,
    /// The prompt templates directory (`*.prompty`).
    Templates,
    /// The scenarios directory (`*.json`).
    Scenarios,
    /// The single moods file.
    Moods,
}

impl SyncSource {
    /// The document type this source feeds, if any (moods have none).
    pub fn doc_type(self) -> Option<DocumentType> {
        match self {
            SyncSource::Personas => Some(DocumentType::Persona),
            SyncSource::Templates => Some(DocumentType::PromptTemplate),
            SyncSource::Scenarios => Some(DocumentType::Scenario),
            SyncSource::Moods => None,
        }
    }

    /// Short label for log lines.
    pub fn label(self) -> &'static str {
        match self {
            SyncSource::Personas => "personas",
            SyncSource::Templates => "templates",
            SyncSource::Scenarios => "scenarios",
            SyncSource::Moods => "moods",
        }
    }
}

/// What happened to the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncEventKind {
    /// File appeared.
    Added,
    /// File contents changed.
    Changed,
    /// File disappeared.
    Removed,
}

/// One settled filesystem change, ready for reconciliation.
#[derive(Clone, Debug)]
pub struct SyncEvent {
    /// Source the path belongs to.
    pub source: SyncSource,
    /// Change kind, post-coalescing.
    pub kind: SyncEventKind,
    /// The affected file.
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moods_source_has_no_doc_type() {
        assert!(SyncSource::Moods.doc_type().is_none());
        assert_eq!(
            SyncSource::Personas.doc_type(),
            Some(DocumentType::Persona)
        );
    }
}
