use crate::pipeline::PipelineSettings;
use rescale_core::constants::IMAGE_CONTENT_TYPE_PREFIX;
use rescale_core::{SkipReason, UploadEvent};

/// Outcome of the event filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip(SkipReason),
}

/// Decide whether an event is a fresh image upload.
///
/// Only objects with an `image/*` content type whose immediate parent directory is
/// the staging directory are processed. Output written by the pipeline itself lives
/// in the output directory, so it is never picked up again.
pub fn classify(event: &UploadEvent, settings: &PipelineSettings) -> Decision {
    let is_image = event
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with(IMAGE_CONTENT_TYPE_PREFIX));
    if !is_image {
        return Decision::Skip(SkipReason::NotImage);
    }

    let in_staging = event
        .directory()
        .rsplit('/')
        .next()
        .is_some_and(|last| last == settings.staging_dir);
    if !in_staging {
        return Decision::Skip(SkipReason::AlreadyProcessed);
    }

    Decision::Proceed
}
