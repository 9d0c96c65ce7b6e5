//! Per-event orchestration.
//!
//! A run walks `Received -> Filtered -> Downloaded -> Transformed -> Uploaded ->
//! UrlGranted -> OriginalDeleted -> OriginUpdated -> Done`. Any error before
//! `OriginalDeleted` aborts the run with the original still in place; scratch files
//! are removed on every path.

use crate::error::PipelineError;
use crate::filter::{classify, Decision};
use crate::image::{ConvertResizer, ImageMetrics, NativeImageMetrics, NativeResizer, Resizer};
use crate::publish::{delete_original, grant_url, notify_origin, upload_scaled};
use crate::scratch::{materialize, ScratchArea};
use crate::transform::transform;
use chrono::{DateTime, Utc};
use rescale_core::{constants, Config, ResizeBackend, RunOutcome, RunResult, RunStage, UploadEvent};
use rescale_db::{create_document_store, DocumentStore};
use rescale_storage::{create_blob_store, scaled_object_key, BlobStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Source of the current time, used for output key prefixes and URL expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// External collaborators of a run.
#[derive(Clone)]
pub struct PipelineDeps {
    pub blob_store: Arc<dyn BlobStore>,
    pub document_store: Arc<dyn DocumentStore>,
    pub resizer: Arc<dyn Resizer>,
    pub metrics: Arc<dyn ImageMetrics>,
    pub clock: Arc<dyn Clock>,
}

impl PipelineDeps {
    /// Build collaborators for the configured backends.
    pub async fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let blob_store = create_blob_store(config).await?;
        let document_store = create_document_store(config).await?;
        let resizer: Arc<dyn Resizer> = match config.resize_backend {
            ResizeBackend::Native => Arc::new(NativeResizer),
            ResizeBackend::Convert => Arc::new(ConvertResizer::new(config.convert_path.clone())),
        };

        tracing::info!(
            storage = %blob_store.backend_type(),
            documents = %document_store.backend_type(),
            resizer = resizer.name(),
            "Pipeline collaborators ready"
        );

        Ok(Self {
            blob_store,
            document_store,
            resizer,
            metrics: Arc::new(NativeImageMetrics),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Tunables of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub scratch_dir: PathBuf,
    pub max_image_width: u32,
    pub target_height: u32,
    pub staging_dir: String,
    pub output_dir: String,
    pub signed_url_expires_at: DateTime<Utc>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scratch_dir: config.scratch_dir.clone(),
            max_image_width: config.max_image_width,
            target_height: config.target_height,
            staging_dir: config.staging_dir.clone(),
            output_dir: config.output_dir.clone(),
            signed_url_expires_at: config.signed_url_expires_at,
        }
    }

    /// Validity to request for a URL issued at `now`.
    pub fn url_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.signed_url_expires_at - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            max_image_width: constants::MAX_IMAGE_WIDTH,
            target_height: constants::TARGET_HEIGHT,
            staging_dir: constants::STAGING_DIR.to_string(),
            output_dir: constants::OUTPUT_DIR.to_string(),
            signed_url_expires_at: DateTime::parse_from_rfc3339(constants::SIGNED_URL_EXPIRES_AT)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// A configured pipeline, shareable across concurrent runs.
#[derive(Clone)]
pub struct Pipeline {
    deps: PipelineDeps,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, settings: PipelineSettings) -> Self {
        Self { deps, settings }
    }

    pub async fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let deps = PipelineDeps::from_config(config).await?;
        Ok(Self::new(deps, PipelineSettings::from_config(config)))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn process_event(&self, event: &UploadEvent) -> Result<RunOutcome, PipelineError> {
        process_event(event, &self.deps, &self.settings).await
    }
}

/// Handle one storage finalize event.
pub async fn process_event(
    event: &UploadEvent,
    deps: &PipelineDeps,
    settings: &PipelineSettings,
) -> Result<RunOutcome, PipelineError> {
    let span = tracing::info_span!(
        "process_event",
        bucket = %event.bucket,
        object = %event.name,
        content_type = event.content_type.as_deref().unwrap_or(""),
    );

    async move {
        let start = Instant::now();
        let result = run(event, deps, settings).await;

        match &result {
            Ok(RunOutcome::Skipped(reason)) => {
                tracing::debug!(reason = %reason, "Event skipped");
            }
            Ok(RunOutcome::Published(published)) => {
                tracing::info!(
                    url = %published.url,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Run complete"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    stage = %e.stage(),
                    retryable = e.is_retryable(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Run failed, original left in place"
                );
            }
        }

        result
    }
    .instrument(span)
    .await
}

async fn run(
    event: &UploadEvent,
    deps: &PipelineDeps,
    settings: &PipelineSettings,
) -> Result<RunOutcome, PipelineError> {
    if let Decision::Skip(reason) = classify(event, settings) {
        return Ok(RunOutcome::Skipped(reason));
    }
    stage(RunStage::Filtered);

    let now = deps.clock.now();
    let scaled_key = scaled_object_key(&event.name, &settings.staging_dir, &settings.output_dir, now)
        .map_err(PipelineError::InvalidKey)?;

    let area = ScratchArea::prepare(&settings.scratch_dir, &event.name, &scaled_key)
        .await
        .map_err(|source| PipelineError::Scratch {
            stage: RunStage::Filtered,
            source,
        })?;

    materialize(deps.blob_store.as_ref(), event, &area).await?;
    stage(RunStage::Downloaded);

    transform(
        &area,
        deps.metrics.as_ref(),
        deps.resizer.as_ref(),
        settings.max_image_width,
        settings.target_height,
    )
    .await?;
    stage(RunStage::Transformed);

    let content_type = event
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    let handle = upload_scaled(
        deps.blob_store.as_ref(),
        &area,
        &event.bucket,
        &scaled_key,
        content_type,
    )
    .await?;
    stage(RunStage::Uploaded);

    let artifact = grant_url(deps.blob_store.as_ref(), handle, settings.url_ttl(now)).await?;
    stage(RunStage::UrlGranted);

    if let Err(e) = area.release().await {
        tracing::warn!(error = %e, "Failed to release scratch area");
    }

    delete_original(deps.blob_store.as_ref(), event, &artifact).await?;
    stage(RunStage::OriginalDeleted);

    let origin = notify_origin(deps.document_store.as_ref(), event, &artifact).await;
    stage(RunStage::OriginUpdated);

    Ok(RunOutcome::Published(RunResult {
        original_metadata: event.metadata.clone(),
        url: artifact.url,
        origin,
    }))
}

fn stage(stage: RunStage) {
    tracing::debug!(stage = %stage, "Stage reached");
}
