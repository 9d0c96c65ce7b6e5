//! Entry points for the Rescale pipeline: a one-shot command and an HTTP push
//! endpoint, both driving `rescale_processing::Pipeline`.

pub mod error;
pub mod server;

use anyhow::Context;
use rescale_core::{RunOutcome, UploadEvent};
use serde_json::{json, Value};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Read one event as JSON from `path`, or from stdin when no path is given.
pub async fn read_event(path: Option<&Path>) -> anyhow::Result<UploadEvent> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read event from stdin")?;
            raw
        }
    };

    serde_json::from_str(&raw).context("Invalid event JSON")
}

/// JSON body reported for a finished run.
///
/// A published run reports `{originalMetadata, url}` plus `originUpdate`, so a
/// document that could not be notified is visible to the caller.
pub fn outcome_body(outcome: &RunOutcome) -> anyhow::Result<Value> {
    match outcome {
        RunOutcome::Skipped(reason) => Ok(json!({ "skipped": reason })),
        RunOutcome::Published(result) => {
            let mut body = serde_json::to_value(result).context("Serialize run result")?;
            if let Value::Object(ref mut fields) = body {
                fields.insert(
                    "originUpdate".to_string(),
                    serde_json::to_value(&result.origin).context("Serialize origin update")?,
                );
            }
            Ok(body)
        }
    }
}
