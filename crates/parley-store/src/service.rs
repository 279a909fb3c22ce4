//! CRUD facade over the document store for API-created documents.
//!
//! File-backed documents are written by the sync engine; documents created
//! here carry an empty `source_path`, which exempts them from
//! deletion-by-reconciliation when the content directories are re-scanned.

use std::sync::Arc;

use parley_core::{Document, DocumentStats, DocumentType};
use serde_json::Value;
use tracing::info;

use crate::errors::{Result, StoreError};
use crate::store::DocumentStore;

/// Maximum length of the slug portion of a generated id.
const SLUG_MAX_LEN: usize = 50;

/// Document CRUD over an opened store.
#[derive(Clone, Debug)]
pub struct DocumentService {
    store: Arc<DocumentStore>,
}

impl DocumentService {
    /// Wrap an opened store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a document with a generated id. Returns the stored document.
    ///
    /// The payload is stored with `id` and `name` folded in, so readers of
    /// the raw payload see the same identity the store does.
    pub fn create(&self, doc_type: DocumentType, name: &str, payload: &Value) -> Result<Document> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("document name is empty".to_string()));
        }
        let id = generate_id(name);
        let payload = fold_identity(payload, &id, name);
        let now = chrono::Utc::now().to_rfc3339();
        self.store
            .upsert_document(&id, doc_type, name, &payload, "", &now)?;
        info!(%id, %doc_type, "created document");
        self.require(&id, doc_type)
    }

    /// Shallow-merge `changes` into an existing document's payload.
    ///
    /// Top-level keys in `changes` replace the stored ones; `id` is never
    /// overwritten. A `name` key also renames the document.
    pub fn update(&self, id: &str, doc_type: DocumentType, changes: &Value) -> Result<Document> {
        let existing = self.require(id, doc_type)?;

        let mut payload = existing.payload.clone();
        if let (Some(target), Some(source)) = (payload.as_object_mut(), changes.as_object()) {
            for (key, value) in source {
                if key == "id" {
                    continue;
                }
                let _ = target.insert(key.clone(), value.clone());
            }
        }

        let name = changes
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&existing.name);

        self.store.upsert_document(
            id,
            doc_type,
            name,
            &payload,
            &existing.source_path,
            &existing.source_modified,
        )?;
        info!(%id, %doc_type, "updated document");
        self.require(id, doc_type)
    }

    /// Delete a document, erroring if it does not exist.
    pub fn delete(&self, id: &str, doc_type: DocumentType) -> Result<()> {
        if !self.store.delete_document(id, doc_type)? {
            return Err(StoreError::DocumentNotFound {
                id: id.to_string(),
                doc_type,
            });
        }
        info!(%id, %doc_type, "deleted document");
        Ok(())
    }

    /// A single document, erroring if absent.
    pub fn get(&self, id: &str, doc_type: DocumentType) -> Result<Document> {
        self.require(id, doc_type)
    }

    /// All documents of one type, name-ordered.
    pub fn list(&self, doc_type: DocumentType) -> Result<Vec<Document>> {
        self.store.get_all(doc_type)
    }

    /// Case-insensitive search within one type.
    pub fn search(&self, doc_type: DocumentType, term: &str) -> Result<Vec<Document>> {
        self.store.search(doc_type, term)
    }

    /// Counts by type.
    pub fn stats(&self) -> Result<DocumentStats> {
        self.store.stats()
    }

    fn require(&self, id: &str, doc_type: DocumentType) -> Result<Document> {
        self.store
            .get_by_id(id, doc_type)?
            .ok_or_else(|| StoreError::DocumentNotFound {
                id: id.to_string(),
                doc_type,
            })
    }
}

/// Slugified name plus a base-36 millisecond suffix for uniqueness.
fn generate_id(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_matches('-');
    let slug: String = slug.chars().take(SLUG_MAX_LEN).collect();
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    format!("{slug}_{}", to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Return `payload` with `id` and `name` set at the top level.
fn fold_identity(payload: &Value, id: &str, name: &str) -> Value {
    let mut map = payload.as_object().cloned().unwrap_or_default();
    let _ = map.insert("id".to_string(), Value::String(id.to_string()));
    let _ = map.insert("name".to_string(), Value::String(name.to_string()));
    Value::Object(map)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (tempfile::TempDir, DocumentService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path().join("docs.db")).unwrap());
        (dir, DocumentService::new(store))
    }

    #[test]
    fn create_generates_slug_id() {
        let (_dir, svc) = service();
        let doc = svc
            .create(
                DocumentType::Persona,
                "Impatient Shopper!",
                &serde_json::json!({"behavior": "hurried"}),
            )
            .unwrap();
        assert!(doc.id.starts_with("impatient-shopper_"), "id = {}", doc.id);
        assert_eq!(doc.name, "Impatient Shopper!");
        assert_eq!(doc.payload["id"], doc.id);
        assert_eq!(doc.payload["behavior"], "hurried");
        // API-created: no source file.
        assert!(doc.source_path.is_empty());
    }

    #[test]
    fn create_rejects_empty_name() {
        let (_dir, svc) = service();
        let err = svc
            .create(DocumentType::Persona, "   ", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn slug_is_truncated() {
        let long = "x".repeat(200);
        let id = generate_id(&long);
        let slug = id.split('_').next().unwrap();
        assert_eq!(slug.len(), SLUG_MAX_LEN);
    }

    #[test]
    fn update_is_shallow_merge_and_keeps_id() {
        let (_dir, svc) = service();
        let doc = svc
            .create(
                DocumentType::Scenario,
                "Checkout",
                &serde_json::json!({"difficulty": "easy", "steps": ["greet"]}),
            )
            .unwrap();

        let updated = svc
            .update(
                &doc.id,
                DocumentType::Scenario,
                &serde_json::json!({"id": "hijacked", "difficulty": "hard", "name": "Checkout v2"}),
            )
            .unwrap();

        assert_eq!(updated.id, doc.id);
        assert_eq!(updated.payload["id"], doc.id);
        assert_eq!(updated.payload["difficulty"], "hard");
        assert_eq!(updated.payload["steps"][0], "greet");
        assert_eq!(updated.name, "Checkout v2");
    }

    #[test]
    fn update_missing_document_errors() {
        let (_dir, svc) = service();
        let err = svc
            .update("ghost", DocumentType::Persona, &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));
    }

    #[test]
    fn delete_missing_document_errors() {
        let (_dir, svc) = service();
        let err = svc.delete("ghost", DocumentType::Persona).unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));
    }

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_000), "rs");
    }
}
