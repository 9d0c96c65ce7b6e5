use crate::traits::{validate_document_path, DocumentError, DocumentResult, DocumentStore, Fields};
use crate::DocumentBackend;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local document store
///
/// Each document is a JSON object stored at `{root}/{document_path}.json`.
/// Meant for development and tests where no Firestore project is available.
#[derive(Clone, Debug)]
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub async fn new(root: impl Into<PathBuf>) -> DocumentResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            DocumentError::ConfigError(format!(
                "Failed to create documents directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    fn document_file(&self, document_path: &str) -> DocumentResult<(String, PathBuf)> {
        let path = validate_document_path(document_path)?;
        let file = self.root.join(format!("{}.json", path));
        Ok((path, file))
    }

    /// Create or replace a whole document.
    pub async fn put(&self, document_path: &str, fields: Fields) -> DocumentResult<()> {
        let (_, file) = self.document_file(document_path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        write_atomically(&file, &Value::Object(fields)).await
    }

    /// Read a document, `None` if it does not exist.
    pub async fn get(&self, document_path: &str) -> DocumentResult<Option<Fields>> {
        let (_, file) = self.document_file(document_path)?;
        match fs::read(&file).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(map) => Ok(Some(map)),
                _ => Err(DocumentError::UpdateFailed(format!(
                    "Document {} is not a JSON object",
                    file.display()
                ))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_atomically(file: &Path, value: &Value) -> DocumentResult<()> {
    let tmp = file.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?).await?;
    fs::rename(&tmp, file).await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn update(&self, document_path: &str, fields: Fields) -> DocumentResult<()> {
        let (path, file) = self.document_file(document_path)?;

        let mut document = self
            .get(&path)
            .await?
            .ok_or_else(|| DocumentError::NotFound(path.clone()))?;

        let count = fields.len();
        document.extend(fields);
        write_atomically(&file, &Value::Object(document)).await?;

        tracing::info!(
            document = %path,
            file = %file.display(),
            fields = count,
            "Local document update successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> DocumentBackend {
        DocumentBackend::Local
    }
}
