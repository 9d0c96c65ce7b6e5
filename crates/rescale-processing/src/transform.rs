//! Size normalization of the materialized original.

use crate::error::PipelineError;
use crate::image::{ImageMetrics, Resizer};
use crate::scratch::ScratchArea;
use rescale_core::{Dimensions, RunStage};
use tokio::fs;

/// What the transform step produced in the scratch area's scaled slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transformed {
    /// Measurements of the original.
    pub original: Dimensions,
    /// Whether the original was resized or copied verbatim.
    pub resized: bool,
}

/// Resize the original to `target_height` when it is wider than `max_width`,
/// otherwise copy it byte for byte.
pub async fn transform(
    area: &ScratchArea,
    metrics: &dyn ImageMetrics,
    resizer: &dyn Resizer,
    max_width: u32,
    target_height: u32,
) -> Result<Transformed, PipelineError> {
    let input = area.original_path();
    let output = area.scaled_path();

    let (width, height) = metrics
        .dimensions(input)
        .await
        .map_err(|source| PipelineError::Decode {
            path: input.to_path_buf(),
            source,
        })?;
    let size_bytes = metrics
        .file_size(input)
        .await
        .map_err(|source| PipelineError::Scratch {
            stage: RunStage::Downloaded,
            source,
        })?;

    let original = Dimensions {
        width,
        height,
        size_bytes,
    };

    let resized = width > max_width;
    if resized {
        tracing::info!(
            width = width,
            height = height,
            size_bytes = size_bytes,
            target_height = target_height,
            resizer = resizer.name(),
            "Resizing oversized image"
        );
        resizer
            .resize(input, output, target_height)
            .await
            .map_err(PipelineError::Resize)?;
    } else {
        tracing::info!(
            width = width,
            height = height,
            size_bytes = size_bytes,
            "Image within bounds, copying"
        );
        fs::copy(input, output)
            .await
            .map_err(|source| PipelineError::Scratch {
                stage: RunStage::Downloaded,
                source,
            })?;
    }

    Ok(Transformed { original, resized })
}
