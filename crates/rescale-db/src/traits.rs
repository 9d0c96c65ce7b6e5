//! Document store abstraction trait

use crate::DocumentBackend;
use async_trait::async_trait;
use thiserror::Error;

/// Field name → value map written to a document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Document store errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for document store operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Document store abstraction trait
///
/// `update` merges `fields` into an existing document; other fields are left
/// untouched. Updating a document that does not exist is an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn update(&self, document_path: &str, fields: Fields) -> DocumentResult<()>;

    fn backend_type(&self) -> DocumentBackend;
}

/// Normalize and validate a document path.
///
/// Leading and trailing slashes are trimmed. The remaining path must consist of an
/// even number of non-empty segments (collection/document pairs).
pub fn validate_document_path(path: &str) -> DocumentResult<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(DocumentError::InvalidPath("Document path is empty".to_string()));
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == "..")
    {
        return Err(DocumentError::InvalidPath(format!(
            "Document path contains empty or relative segments: {}",
            path
        )));
    }
    if segments.len() % 2 != 0 {
        return Err(DocumentError::InvalidPath(format!(
            "Document path must alternate collection/document ids: {}",
            path
        )));
    }

    Ok(trimmed.to_string())
}
