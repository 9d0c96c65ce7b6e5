//! Pipeline error taxonomy
//!
//! Every variant is fatal for the run and is raised before the original object is
//! deleted. Skips are not errors, and a failed origin document update is reported on
//! the result rather than here since the artifact is already published by then.

use rescale_core::RunStage;
use rescale_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid object key: {0}")]
    InvalidKey(#[source] StorageError),

    #[error("Scratch area error after {stage}: {source}")]
    Scratch {
        stage: RunStage,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download original: {0}")]
    Download(#[source] StorageError),

    #[error("Failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Resize failed: {0}")]
    Resize(#[source] anyhow::Error),

    #[error("Failed to upload scaled image: {0}")]
    Upload(#[source] StorageError),

    #[error("Failed to issue read URL: {0}")]
    SignUrl(#[source] StorageError),

    #[error("Failed to delete original: {0}")]
    DeleteOriginal(#[source] StorageError),
}

impl PipelineError {
    /// Last stage the run completed before failing.
    pub fn stage(&self) -> RunStage {
        match self {
            PipelineError::InvalidKey(_) => RunStage::Filtered,
            PipelineError::Scratch { stage, .. } => *stage,
            PipelineError::Download(_) => RunStage::Filtered,
            PipelineError::Decode { .. } | PipelineError::Resize(_) => RunStage::Downloaded,
            PipelineError::Upload(_) => RunStage::Transformed,
            PipelineError::SignUrl(_) => RunStage::Uploaded,
            PipelineError::DeleteOriginal(_) => RunStage::UrlGranted,
        }
    }

    /// Whether redelivering the same event may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::InvalidKey(_)
            | PipelineError::Decode { .. }
            | PipelineError::Resize(_) => false,
            PipelineError::Scratch { .. } => true,
            PipelineError::Download(e)
            | PipelineError::Upload(e)
            | PipelineError::SignUrl(e)
            | PipelineError::DeleteOriginal(e) => e.is_transient(),
        }
    }
}
