//! Local scratch space for one run.
//!
//! The original and the scaled rendition each get a file under the scratch root,
//! mirroring their object keys. `release` removes both; if a run fails before
//! that, dropping the area removes whatever was written.

use crate::error::PipelineError;
use rescale_core::{RunStage, UploadEvent};
use rescale_storage::{validate_key, BlobStore};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug)]
pub struct ScratchArea {
    original: PathBuf,
    scaled: PathBuf,
    released: bool,
}

impl ScratchArea {
    /// Reserve scratch paths for `original_key` and `scaled_key` below `root`,
    /// creating parent directories.
    pub async fn prepare(root: &Path, original_key: &str, scaled_key: &str) -> io::Result<Self> {
        let original = scratch_path(root, original_key)?;
        let scaled = scratch_path(root, scaled_key)?;

        for path in [&original, &scaled] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
        }

        Ok(Self {
            original,
            scaled,
            released: false,
        })
    }

    pub fn original_path(&self) -> &Path {
        &self.original
    }

    pub fn scaled_path(&self) -> &Path {
        &self.scaled
    }

    /// Remove both scratch files. Files that were never written are ignored.
    ///
    /// Both removals are attempted and the first error is returned. On error the
    /// area stays armed, so the drop at the end of this call tries once more.
    pub async fn release(mut self) -> io::Result<()> {
        let mut first_error = None;
        for path in [&self.original, &self.scaled] {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            None => {
                self.released = true;
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for path in [&self.original, &self.scaled] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to remove scratch file"
                    );
                }
            }
        }
    }
}

fn scratch_path(root: &Path, key: &str) -> io::Result<PathBuf> {
    validate_key(key).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    Ok(root.join(key))
}

/// Download the original object into the scratch area, replacing any stale file.
///
/// Returns the number of bytes written.
pub async fn materialize(
    blob_store: &dyn BlobStore,
    event: &UploadEvent,
    area: &ScratchArea,
) -> Result<u64, PipelineError> {
    let data = blob_store
        .download(&event.bucket, &event.name)
        .await
        .map_err(PipelineError::Download)?;
    let size = data.len() as u64;

    fs::write(area.original_path(), &data)
        .await
        .map_err(|source| PipelineError::Scratch {
            stage: RunStage::Filtered,
            source,
        })?;

    tracing::debug!(
        path = %area.original_path().display(),
        size_bytes = size,
        "Original materialized"
    );

    Ok(size)
}
