//! Template engine error types.

use thiserror::Error;

/// Errors from loading or rendering prompt templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No `.prompty` file for this name in either search directory.
    #[error("prompt template not found: {0}")]
    NotFound(String),

    /// The template file exists but is malformed.
    #[error("invalid prompt template '{name}': {reason}")]
    Invalid {
        /// Template id (file base name).
        name: String,
        /// What made it unusable.
        reason: String,
    },

    /// Filesystem error while reading a template file.
    #[error("template I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document store rejected a lookup during enrichment.
    #[error(transparent)]
    Store(#[from] parley_store::StoreError),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_template() {
        let err = TemplateError::NotFound("training-agent".to_string());
        assert!(err.to_string().contains("training-agent"));
    }
}
