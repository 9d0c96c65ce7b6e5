#[cfg(feature = "firestore")]
use crate::{FirestoreAuth, FirestoreDocumentStore};
#[cfg(feature = "local")]
use crate::LocalDocumentStore;
use crate::{DocumentBackend, DocumentError, DocumentResult, DocumentStore};
use rescale_core::Config;
use std::sync::Arc;

/// Create a document store backend based on configuration
pub async fn create_document_store(config: &Config) -> DocumentResult<Arc<dyn DocumentStore>> {
    match config.document_backend {
        #[cfg(feature = "firestore")]
        DocumentBackend::Firestore => {
            let project_id = config.firestore_project_id.clone().ok_or_else(|| {
                DocumentError::ConfigError("FIRESTORE_PROJECT_ID not configured".to_string())
            })?;
            let store = FirestoreDocumentStore::new(
                config.firestore_base_url.clone(),
                project_id,
                config.firestore_database.clone(),
                firestore_auth(config)?,
            )?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "firestore"))]
        DocumentBackend::Firestore => Err(DocumentError::ConfigError(
            "Firestore backend not available (firestore feature not enabled)".to_string(),
        )),

        #[cfg(feature = "local")]
        DocumentBackend::Local => {
            let root = config.local_documents_path.clone().ok_or_else(|| {
                DocumentError::ConfigError("LOCAL_DOCUMENTS_PATH not configured".to_string())
            })?;
            Ok(Arc::new(LocalDocumentStore::new(root).await?))
        }

        #[cfg(not(feature = "local"))]
        DocumentBackend::Local => Err(DocumentError::ConfigError(
            "Local document backend not available (local feature not enabled)".to_string(),
        )),
    }
}

/// The emulator takes the static token, or nothing. Against the real service,
/// tokens come from the service account file when one is configured, otherwise
/// from application default credentials.
#[cfg(feature = "firestore")]
fn firestore_auth(config: &Config) -> DocumentResult<FirestoreAuth> {
    if config.uses_firestore_emulator() {
        return Ok(match config.firestore_access_token.clone() {
            Some(token) => FirestoreAuth::Static(token),
            None => FirestoreAuth::Anonymous,
        });
    }

    match config.gcs_service_account_path {
        Some(ref path) => {
            let account = gcp_auth::CustomServiceAccount::from_file(path).map_err(|e| {
                DocumentError::ConfigError(format!(
                    "Failed to load service account {}: {}",
                    path, e
                ))
            })?;
            Ok(FirestoreAuth::Provider(Arc::new(account)))
        }
        None => Ok(FirestoreAuth::ApplicationDefault),
    }
}
