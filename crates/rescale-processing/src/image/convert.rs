//! Resizer that shells out to ImageMagick.

use crate::image::resize::Resizer;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Runs `convert <input> -resize x<height> <output>`.
///
/// ImageMagick keeps the aspect ratio for a height-only geometry and picks the
/// output encoding from the output file name, which mirrors the input's.
#[derive(Debug, Clone)]
pub struct ConvertResizer {
    convert_path: String,
}

impl ConvertResizer {
    pub fn new(convert_path: impl Into<String>) -> Self {
        Self {
            convert_path: convert_path.into(),
        }
    }

    fn args(input: &Path, output: &Path, target_height: u32) -> Vec<String> {
        vec![
            input.to_string_lossy().to_string(),
            "-resize".to_string(),
            format!("x{}", target_height),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Resizer for ConvertResizer {
    async fn resize(&self, input: &Path, output: &Path, target_height: u32) -> Result<()> {
        if target_height == 0 {
            return Err(anyhow!("Target height must be positive"));
        }

        let output_result = Command::new(&self.convert_path)
            .args(Self::args(input, output, target_height))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.convert_path))?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(anyhow!(
                "convert failed ({}): {}",
                output_result.status,
                stderr.trim()
            ));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "convert"
    }
}
