use async_trait::async_trait;
use image::imageops::FilterType;
use image::{GenericImageView, ImageReader};
use std::path::Path;

/// Produces a copy of an image scaled to a fixed height.
#[async_trait]
pub trait Resizer: Send + Sync {
    /// Write `input` scaled to `target_height` (width proportional) to `output`,
    /// keeping the input's encoding.
    async fn resize(
        &self,
        input: &Path,
        output: &Path,
        target_height: u32,
    ) -> Result<(), anyhow::Error>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Width that keeps the aspect ratio at `target_height`.
pub fn proportional_width(orig_width: u32, orig_height: u32, target_height: u32) -> u32 {
    let aspect_ratio = orig_width as f64 / orig_height as f64;
    let w = (target_height as f64 * aspect_ratio).round() as u32;
    w.max(1)
}

/// Select appropriate filter type based on resize ratio
pub fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

/// In-process resizer using the `image` crate. Decoding and encoding run on the
/// blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeResizer;

#[async_trait]
impl Resizer for NativeResizer {
    async fn resize(
        &self,
        input: &Path,
        output: &Path,
        target_height: u32,
    ) -> Result<(), anyhow::Error> {
        if target_height == 0 {
            anyhow::bail!("Target height must be positive");
        }

        let input = input.to_path_buf();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let reader = ImageReader::open(&input)?.with_guessed_format()?;
            let format = reader
                .format()
                .ok_or_else(|| anyhow::anyhow!("Unrecognized image format"))?;
            let img = reader.decode()?;

            let (orig_width, orig_height) = img.dimensions();
            let new_width = proportional_width(orig_width, orig_height, target_height);
            let filter = select_filter(orig_width, orig_height, new_width, target_height);

            let resized = img.resize_exact(new_width, target_height, filter);
            resized.save_with_format(&output, format)?;

            tracing::debug!(
                from_width = orig_width,
                from_height = orig_height,
                to_width = new_width,
                to_height = target_height,
                format = ?format,
                "Image resized"
            );
            Ok(())
        })
        .await?
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
