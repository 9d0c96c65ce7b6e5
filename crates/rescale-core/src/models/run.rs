use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Why an event was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Content type missing or not an image.
    NotImage,
    /// Object lives outside the staging directory, e.g. our own output.
    AlreadyProcessed,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SkipReason::NotImage => write!(f, "not_image"),
            SkipReason::AlreadyProcessed => write!(f, "already_processed"),
        }
    }
}

/// Per-run state machine position. Each transition is fatal on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Received,
    Filtered,
    Downloaded,
    Transformed,
    Uploaded,
    UrlGranted,
    OriginalDeleted,
    OriginUpdated,
    Done,
}

impl Display for RunStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            RunStage::Received => "received",
            RunStage::Filtered => "filtered",
            RunStage::Downloaded => "downloaded",
            RunStage::Transformed => "transformed",
            RunStage::Uploaded => "uploaded",
            RunStage::UrlGranted => "url_granted",
            RunStage::OriginalDeleted => "original_deleted",
            RunStage::OriginUpdated => "origin_updated",
            RunStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Original image measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

/// Result of notifying the origin document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OriginUpdate {
    Updated {
        document: String,
    },
    /// The event carried no `messageOrigin`; nothing to notify.
    #[default]
    MissingReference,
    /// The artifact is published but the document could not be updated.
    Failed {
        document: String,
        error: String,
    },
}

/// Audit record of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub original_metadata: HashMap<String, String>,
    /// Signed read URL of the published artifact.
    pub url: String,
    #[serde(skip)]
    pub origin: OriginUpdate,
}

/// What a single pipeline invocation ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Skipped(SkipReason),
    Published(RunResult),
}

impl RunOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped(_))
    }

    pub fn published(&self) -> Option<&RunResult> {
        match self {
            RunOutcome::Published(result) => Some(result),
            RunOutcome::Skipped(_) => None,
        }
    }
}
