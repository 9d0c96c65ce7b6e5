//! Publishing the scaled artifact and cleaning up after it.
//!
//! The steps here run strictly in order. Deleting the original needs a
//! `PublishedArtifact`, which only exists once the scaled object is uploaded and a
//! read URL has been issued for it.

use crate::error::PipelineError;
use crate::scratch::ScratchArea;
use rescale_core::constants::RESOURCE_FIELD;
use rescale_core::{OriginUpdate, RunStage, UploadEvent};
use rescale_db::{DocumentStore, Fields};
use rescale_storage::{BlobStore, ObjectHandle};
use serde_json::Value;
use std::time::Duration;
use tokio::fs;

/// A scaled object that is stored and readable through `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub handle: ObjectHandle,
    pub url: String,
}

/// Upload the scaled scratch file to `bucket`/`key`.
pub async fn upload_scaled(
    blob_store: &dyn BlobStore,
    area: &ScratchArea,
    bucket: &str,
    key: &str,
    content_type: &str,
) -> Result<ObjectHandle, PipelineError> {
    let data = fs::read(area.scaled_path())
        .await
        .map_err(|source| PipelineError::Scratch {
            stage: RunStage::Transformed,
            source,
        })?;

    blob_store
        .upload(bucket, key, data, content_type)
        .await
        .map_err(PipelineError::Upload)
}

/// Issue a read URL for the uploaded object.
pub async fn grant_url(
    blob_store: &dyn BlobStore,
    handle: ObjectHandle,
    expires_in: Duration,
) -> Result<PublishedArtifact, PipelineError> {
    let url = blob_store
        .signed_read_url(&handle, expires_in)
        .await
        .map_err(PipelineError::SignUrl)?;

    tracing::info!(
        bucket = %handle.bucket,
        key = %handle.key,
        expires_in_secs = expires_in.as_secs(),
        "Read URL issued"
    );

    Ok(PublishedArtifact { handle, url })
}

/// Delete the original upload. Only callable once the replacement is published.
pub async fn delete_original(
    blob_store: &dyn BlobStore,
    event: &UploadEvent,
    artifact: &PublishedArtifact,
) -> Result<(), PipelineError> {
    blob_store
        .delete(&event.bucket, &event.name)
        .await
        .map_err(PipelineError::DeleteOriginal)?;

    tracing::info!(
        bucket = %event.bucket,
        key = %event.name,
        replaced_by = %artifact.handle.key,
        "Original deleted"
    );

    Ok(())
}

/// Write the artifact URL into the document named by the event's `messageOrigin`.
///
/// Never fails the run: the artifact is already published, so a missing reference
/// or a document store error is logged and reported on the returned value.
pub async fn notify_origin(
    document_store: &dyn DocumentStore,
    event: &UploadEvent,
    artifact: &PublishedArtifact,
) -> OriginUpdate {
    let Some(document) = event.message_origin() else {
        tracing::warn!(
            bucket = %event.bucket,
            key = %event.name,
            "Upload has no messageOrigin metadata, origin not updated"
        );
        return OriginUpdate::MissingReference;
    };

    let mut fields = Fields::new();
    fields.insert(
        RESOURCE_FIELD.to_string(),
        Value::String(artifact.url.clone()),
    );

    match document_store.update(document, fields).await {
        Ok(()) => {
            tracing::info!(document = %document, "Origin document updated");
            OriginUpdate::Updated {
                document: document.to_string(),
            }
        }
        Err(e) => {
            tracing::error!(
                document = %document,
                error = %e,
                url = %artifact.url,
                "Failed to update origin document"
            );
            OriginUpdate::Failed {
                document: document.to_string(),
                error: e.to_string(),
            }
        }
    }
}
